use std::collections::HashSet;

use logos::Logos;

/// Read-only, line-indexed view of a document. Implemented for `str` and by
/// host document stores; the completion engine never sees more of the host
/// than this.
pub trait DocumentLines {
	/// The text of line `index` without its trailing newline, or `None`
	/// past the end of the document.
	fn line(&self, index: usize) -> Option<&str>;
	fn line_count(&self) -> usize;
}

impl DocumentLines for str {
	fn line(&self, index: usize) -> Option<&str> {
		self.lines().nth(index)
	}

	fn line_count(&self) -> usize {
		self.lines().count()
	}
}

// `&str → &dyn DocumentLines` is not a legal coercion (`str` is unsized),
// so borrowed strings get their own delegating impl.
impl DocumentLines for &str {
	fn line(&self, index: usize) -> Option<&str> {
		(**self).line(index)
	}

	fn line_count(&self) -> usize {
		(**self).line_count()
	}
}

/// A cursor location. `column` counts characters from the start of the
/// line, not bytes; hosts convert their own encoding before calling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
	pub line: usize,
	pub column: usize,
}

impl CursorPosition {
	pub fn new(line: usize, column: usize) -> Self {
		Self { line, column }
	}
}

/// A component block located in a document: `::name` on the open line, a
/// bare colon run of the same length on the close line. `close_line` is
/// `None` while the block is still open (it then extends to the end of the
/// document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
	pub name: String,
	/// Number of colons in the open marker. Close markers match only at
	/// the same depth.
	pub depth: usize,
	pub open_line: usize,
	pub close_line: Option<usize>,
}

/// The block-structure collaborator interface consumed by prop-completion:
/// matched open/close pairs, and the innermost block enclosing a cursor.
pub trait BlockResolver {
	fn block_spans(&self, doc: &dyn DocumentLines) -> Vec<BlockSpan>;
	fn enclosing_block(&self, doc: &dyn DocumentLines, pos: CursorPosition) -> Option<BlockSpan>;
}

/// The shipped line-based resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagScanner;

impl BlockResolver for TagScanner {
	fn block_spans(&self, doc: &dyn DocumentLines) -> Vec<BlockSpan> {
		scan_blocks(doc)
	}

	fn enclosing_block(&self, doc: &dyn DocumentLines, pos: CursorPosition) -> Option<BlockSpan> {
		enclosing_block(doc, pos)
	}
}

// ---- Tag line lexing ----

/// Raw tokens for a single line that might be a block marker.
#[derive(Logos, Debug, PartialEq)]
enum TagToken {
	#[regex(r":{2,}")]
	Colons,
	#[token(":")]
	Colon,
	#[regex(r"[A-Za-z_][A-Za-z0-9_-]*")]
	Ident,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token("=")]
	Equals,
	#[token(".")]
	Dot,
	#[token("#")]
	Hash,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r"[0-9]+(\.[0-9]+)?")]
	Number,
	#[regex(r"[ \t]+")]
	Whitespace,
}

/// An open marker: `::name` optionally followed by inline `{…}` attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTag {
	pub depth: usize,
	pub name: String,
	/// Character column just past the tag name; positions beyond it on the
	/// open line count as inside the block's prop region.
	pub name_end_column: usize,
	/// Prop names already written inline in `{…}` on the open line.
	pub inline_props: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagLine {
	Open(OpenTag),
	Close { depth: usize },
}

/// Classify a single line as an open marker, a close marker, or neither.
pub fn parse_tag_line(line: &str) -> Option<TagLine> {
	let mut lexer = TagToken::lexer(line);

	let mut first = lexer.next()?;
	if matches!(first, Ok(TagToken::Whitespace)) {
		first = lexer.next()?;
	}

	let Ok(TagToken::Colons) = first else {
		return None;
	};
	let depth = lexer.slice().len();

	match lexer.next() {
		None => Some(TagLine::Close { depth }),
		Some(Ok(TagToken::Whitespace)) => match lexer.next() {
			None => Some(TagLine::Close { depth }),
			_ => None,
		},
		Some(Ok(TagToken::Ident)) => {
			let name = lexer.slice().to_string();
			let name_end_column = line[..lexer.span().end].chars().count();
			let inline_props = collect_inline_props(&mut lexer);

			Some(TagLine::Open(OpenTag {
				depth,
				name,
				name_end_column,
				inline_props,
			}))
		}
		_ => None,
	}
}

/// Walk the rest of an open-tag line collecting prop names from inline
/// `{key="value"}` attributes. Value tokens, `.class`, and `#id` shorthands
/// are skipped; a bare ident inside the braces counts as a boolean
/// shorthand prop.
fn collect_inline_props(lexer: &mut logos::Lexer<'_, TagToken>) -> Vec<String> {
	let mut props = vec![];
	let mut pending: Option<String> = None;
	let mut in_braces = false;
	let mut expect_value = false;
	let mut after_marker = false;

	while let Some(result) = lexer.next() {
		let Ok(token) = result else {
			continue;
		};

		let mut next_marker = false;
		match token {
			TagToken::BraceOpen => in_braces = true,
			TagToken::BraceClose => {
				if let Some(name) = pending.take() {
					props.push(name);
				}
				in_braces = false;
			}
			TagToken::Dot | TagToken::Hash => next_marker = true,
			TagToken::Ident if in_braces => {
				if expect_value {
					expect_value = false;
				} else if !after_marker {
					if let Some(name) = pending.take() {
						props.push(name);
					}
					pending = Some(lexer.slice().to_string());
				}
			}
			TagToken::Equals if in_braces => {
				if let Some(name) = pending.take() {
					props.push(name);
				}
				expect_value = true;
			}
			TagToken::DoubleQuotedString | TagToken::SingleQuotedString | TagToken::Number => {
				expect_value = false;
			}
			_ => {}
		}
		after_marker = next_marker;
	}

	if let Some(name) = pending.take() {
		props.push(name);
	}

	props
}

/// A `::` tag start detected in the text before the cursor, used to decide
/// that name-completion applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStart {
	pub depth: usize,
	/// The partially typed component name, possibly empty.
	pub partial: String,
}

/// Check whether the text before the cursor is the start of a component
/// tag: optional indent, a colon run of two or more, then a partial name
/// with the cursor right behind it.
pub fn tag_start(prefix: &str) -> Option<TagStart> {
	let trimmed = prefix.trim_start();
	let depth = trimmed.chars().take_while(|ch| *ch == ':').count();

	if depth < 2 {
		return None;
	}

	let partial = &trimmed[depth..];
	let valid = partial.chars().enumerate().all(|(index, ch)| {
		if index == 0 {
			ch.is_ascii_alphabetic() || ch == '_'
		} else {
			ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
		}
	});

	if !valid {
		return None;
	}

	Some(TagStart {
		depth,
		partial: partial.to_string(),
	})
}

// ---- Block scanning ----

struct PendingBlock {
	depth: usize,
	name: String,
	open_line: usize,
}

fn is_fence_line(line: &str) -> bool {
	let trimmed = line.trim_start();
	trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Scan a whole document into block spans. Open markers push onto a
/// pending stack; a close marker closes the nearest pending block of the
/// same colon depth, along with anything opened inside it. Lines inside
/// fenced code blocks are ignored. Blocks still pending at the end of the
/// document stay open (`close_line = None`).
pub fn scan_blocks(doc: &dyn DocumentLines) -> Vec<BlockSpan> {
	let mut spans: Vec<BlockSpan> = vec![];
	let mut pending: Vec<PendingBlock> = vec![];
	let mut in_fence = false;

	for index in 0..doc.line_count() {
		let Some(line) = doc.line(index) else {
			break;
		};

		if is_fence_line(line) {
			in_fence = !in_fence;
			continue;
		}
		if in_fence {
			continue;
		}

		match parse_tag_line(line) {
			Some(TagLine::Open(tag)) => {
				pending.push(PendingBlock {
					depth: tag.depth,
					name: tag.name,
					open_line: index,
				});
			}
			Some(TagLine::Close { depth }) => {
				let Some(found) = pending.iter().rposition(|block| block.depth == depth) else {
					continue;
				};

				// Anything left open inside the closed block cannot extend
				// past it.
				for block in pending.drain(found..).rev() {
					spans.push(BlockSpan {
						name: block.name,
						depth: block.depth,
						open_line: block.open_line,
						close_line: Some(index),
					});
				}
			}
			None => {}
		}
	}

	for block in pending {
		spans.push(BlockSpan {
			name: block.name,
			depth: block.depth,
			open_line: block.open_line,
			close_line: None,
		});
	}

	spans.sort_by_key(|span| span.open_line);
	spans
}

fn span_contains(doc: &dyn DocumentLines, span: &BlockSpan, pos: CursorPosition) -> bool {
	if pos.line == span.open_line {
		// On the open line only positions past the tag name are inside
		// (the inline attribute region).
		let Some(line) = doc.line(span.open_line) else {
			return false;
		};
		let Some(TagLine::Open(tag)) = parse_tag_line(line) else {
			return false;
		};
		return pos.column > tag.name_end_column;
	}

	if pos.line < span.open_line {
		return false;
	}

	match span.close_line {
		Some(close) => pos.line < close,
		None => true,
	}
}

/// The innermost block whose prop region contains the cursor.
pub fn enclosing_block(doc: &dyn DocumentLines, pos: CursorPosition) -> Option<BlockSpan> {
	let mut best: Option<BlockSpan> = None;

	for span in scan_blocks(doc) {
		if span_contains(doc, &span, pos)
			&& best
				.as_ref()
				.is_none_or(|current| span.open_line >= current.open_line)
		{
			best = Some(span);
		}
	}

	best
}

/// Leading `name:` or `name=` on a block body line.
fn leading_prop_name(line: &str) -> Option<&str> {
	let trimmed = line.trim_start();
	let first = trimmed.chars().next()?;

	if !first.is_ascii_alphabetic() && first != '_' {
		return None;
	}

	let end = trimmed
		.char_indices()
		.find(|(_, ch)| !ch.is_ascii_alphanumeric() && *ch != '_' && *ch != '-')
		.map_or(trimmed.len(), |(index, _)| index);
	let rest = trimmed[end..].trim_start();

	if rest.starts_with(':') || rest.starts_with('=') {
		Some(&trimmed[..end])
	} else {
		None
	}
}

/// Prop names already written inside a block's prop region: inline `{…}`
/// attributes on the open line plus `name:` / `name=` lines in the body up
/// to the close marker (or end of document while unclosed). Body lines
/// inside fenced code blocks are ignored, as in [`scan_blocks`].
pub fn present_props(doc: &dyn DocumentLines, span: &BlockSpan) -> HashSet<String> {
	let mut present = HashSet::new();

	if let Some(line) = doc.line(span.open_line) {
		if let Some(TagLine::Open(tag)) = parse_tag_line(line) {
			present.extend(tag.inline_props);
		}
	}

	let body_end = span.close_line.unwrap_or(doc.line_count());
	let mut in_fence = false;
	for index in (span.open_line + 1)..body_end {
		let Some(line) = doc.line(index) else {
			break;
		};
		if is_fence_line(line) {
			in_fence = !in_fence;
			continue;
		}
		if in_fence {
			continue;
		}
		if let Some(name) = leading_prop_name(line) {
			present.insert(name.to_string());
		}
	}

	present
}
