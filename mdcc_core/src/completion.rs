use crate::blocks::BlockResolver;
use crate::blocks::CursorPosition;
use crate::blocks::DocumentLines;
use crate::blocks::present_props;
use crate::blocks::tag_start;
use crate::catalog::MetadataSnapshot;
use crate::catalog::PropDescriptor;
use crate::catalog::PropType;

/// What a [`CompletionCandidate`] completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
	Component,
	Prop,
}

/// A transport-agnostic completion candidate. Hosts map these onto their
/// own item types (the LSP server turns them into `CompletionItem`s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
	pub label: String,
	pub kind: CandidateKind,
	/// Short hint rendered next to the label, e.g. `enum (required)`.
	pub detail: Option<String>,
	pub documentation: Option<String>,
	/// Replacement text when inserting the label verbatim is not enough
	/// (pre-filled defaults).
	pub insert_text: Option<String>,
	/// Preserves catalog/declaration order in clients that re-sort.
	pub sort_text: String,
}

/// Name-completion: one candidate per component, in catalog order, when the
/// text before the cursor is a `::` tag start. Missing snapshot, empty
/// catalog, or a cursor outside a tag start all degrade to an empty list.
///
/// Pure in (snapshot, document, cursor); performs no I/O and never fails.
pub fn component_candidates(
	snapshot: Option<&MetadataSnapshot>,
	doc: &dyn DocumentLines,
	pos: CursorPosition,
) -> Vec<CompletionCandidate> {
	let Some(snapshot) = snapshot else {
		return vec![];
	};
	let Some(line) = doc.line(pos.line) else {
		return vec![];
	};

	if tag_start(prefix_of(line, pos.column)).is_none() {
		return vec![];
	}

	snapshot
		.components
		.iter()
		.enumerate()
		.map(|(index, component)| CompletionCandidate {
			label: component.name.clone(),
			kind: CandidateKind::Component,
			detail: None,
			documentation: component.description.clone(),
			insert_text: None,
			sort_text: format!("{index:02}"),
		})
		.collect()
}

/// Prop-completion: one candidate per prop of the component enclosing the
/// cursor, in declaration order, with type hints and pre-filled defaults.
/// Props already present in the block's prop region are excluded. No
/// enclosing block, an unknown component, or a missing snapshot all degrade
/// to an empty list.
///
/// Pure in (snapshot, document, cursor); performs no I/O and never fails.
pub fn prop_candidates(
	snapshot: Option<&MetadataSnapshot>,
	doc: &dyn DocumentLines,
	pos: CursorPosition,
	resolver: &impl BlockResolver,
) -> Vec<CompletionCandidate> {
	let Some(snapshot) = snapshot else {
		return vec![];
	};
	let Some(block) = resolver.enclosing_block(doc, pos) else {
		return vec![];
	};
	let Some(component) = snapshot.component(&block.name) else {
		return vec![];
	};

	let present = present_props(doc, &block);
	let inline = pos.line == block.open_line;

	component
		.props
		.iter()
		.enumerate()
		.filter(|(_, prop)| !present.contains(&prop.name))
		.map(|(index, prop)| CompletionCandidate {
			label: prop.name.clone(),
			kind: CandidateKind::Prop,
			detail: Some(prop.type_hint()),
			documentation: prop.description.clone(),
			insert_text: Some(render_insert_text(prop, inline)),
			sort_text: format!("{index:02}"),
		})
		.collect()
}

/// Route a cursor position to the matching handler: a `::` tag start means
/// name-completion, anything else is tried as prop-completion.
pub fn completions(
	snapshot: Option<&MetadataSnapshot>,
	doc: &dyn DocumentLines,
	pos: CursorPosition,
	resolver: &impl BlockResolver,
) -> Vec<CompletionCandidate> {
	let at_tag_start = doc
		.line(pos.line)
		.is_some_and(|line| tag_start(prefix_of(line, pos.column)).is_some());

	if at_tag_start {
		component_candidates(snapshot, doc, pos)
	} else {
		prop_candidates(snapshot, doc, pos, resolver)
	}
}

/// Render the text inserted for a prop, pre-filling its default value.
/// Inside the open tag's `{…}` attributes props use `name="value"`; in the
/// block body they use the `name: value` form.
fn render_insert_text(prop: &PropDescriptor, inline: bool) -> String {
	let name = &prop.name;

	match (prop.default_literal(), inline) {
		(Some(value), true) => format!("{name}=\"{value}\""),
		(Some(value), false) => format!("{name}: {value}"),
		(None, true) => {
			// Boolean shorthand: a bare attribute name means `true`.
			if prop.prop_type == PropType::Boolean {
				name.clone()
			} else {
				format!("{name}=")
			}
		}
		(None, false) => format!("{name}: "),
	}
}

/// The slice of `line` before the cursor, with `column` counted in
/// characters.
fn prefix_of(line: &str, column: usize) -> &str {
	let end = line
		.char_indices()
		.nth(column)
		.map_or(line.len(), |(index, _)| index);
	&line[..end]
}
