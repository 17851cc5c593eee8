use std::path::Path;

use mdcc_core::ComponentDescriptor;
use mdcc_core::McResult;
use mdcc_core::MetadataSource;
use mdcc_core::PropDescriptor;
use mdcc_core::PropType;
use rstest::rstest;
use serde_json::json;
use similar_asserts::assert_eq;
#[allow(unused_imports)]
use tower_lsp_server::ls_types::*;

use super::*;

fn sample_components() -> Vec<ComponentDescriptor> {
	vec![
		ComponentDescriptor {
			name: "callout".to_string(),
			description: Some("A stylized box for notes and warnings.".to_string()),
			props: vec![
				PropDescriptor {
					name: "type".to_string(),
					prop_type: PropType::Enum,
					default: Some(json!("note")),
					required: true,
					description: Some("Visual style of the box.".to_string()),
				},
				PropDescriptor {
					name: "icon".to_string(),
					prop_type: PropType::String,
					default: None,
					required: false,
					description: None,
				},
			],
		},
		ComponentDescriptor {
			name: "card".to_string(),
			description: None,
			props: vec![
				PropDescriptor {
					name: "title".to_string(),
					prop_type: PropType::String,
					default: None,
					required: true,
					description: None,
				},
				PropDescriptor {
					name: "flat".to_string(),
					prop_type: PropType::Boolean,
					default: None,
					required: false,
					description: None,
				},
			],
		},
	]
}

fn sample_snapshot() -> MetadataSnapshot {
	MetadataSnapshot {
		components: sample_components(),
		generation: 1,
		fingerprint: Origin::none(Path::new("/tmp/ws")).fingerprint(),
		fetched_at_unix_ms: 0,
	}
}

fn open_doc(content: &str) -> DocumentState {
	DocumentState {
		content: content.to_string(),
	}
}

fn lsp_range(start_line: u32, start_character: u32, end_line: u32, end_character: u32) -> Range {
	Range {
		start: Position {
			line: start_line,
			character: start_character,
		},
		end: Position {
			line: end_line,
			character: end_character,
		},
	}
}

fn change(range: Option<Range>, text: &str) -> TextDocumentContentChangeEvent {
	TextDocumentContentChangeEvent {
		range,
		range_length: None,
		text: text.to_string(),
	}
}

// ---- Position conversion tests ----

#[rstest]
#[case::document_start(0, 0, Some(0))]
#[case::end_of_first_line(0, 2, Some(2))]
#[case::second_line(1, 1, Some(4))]
#[case::end_of_document(1, 2, Some(5))]
#[case::line_out_of_bounds(2, 0, None)]
#[case::character_out_of_bounds(0, 9, None)]
fn position_to_offset_ascii(
	#[case] line: u32,
	#[case] character: u32,
	#[case] expected: Option<usize>,
) {
	let position = Position { line, character };
	assert_eq!(lsp_position_to_offset("ab\ncd", position), expected);
}

#[rstest]
#[case::before_emoji(1, Some(1))]
#[case::after_emoji(3, Some(5))]
#[case::end_of_line(4, Some(6))]
#[case::inside_surrogate_pair(2, None)]
fn position_to_offset_counts_utf16_units(#[case] character: u32, #[case] expected: Option<usize>) {
	let position = Position { line: 0, character };
	assert_eq!(lsp_position_to_offset("a😀b", position), expected);
}

#[test]
fn position_to_offset_after_trailing_newline() {
	let position = Position {
		line: 1,
		character: 0,
	};
	assert_eq!(lsp_position_to_offset("ab\n", position), Some(3));
}

#[test]
fn position_to_cursor_passes_ascii_through() {
	let doc = open_doc("::callout");
	let position = Position {
		line: 0,
		character: 4,
	};
	assert_eq!(
		lsp_position_to_cursor(&doc.content, position),
		Some(CursorPosition::new(0, 4))
	);
}

#[test]
fn position_to_cursor_clamps_past_end_of_line() {
	let doc = open_doc("::callout");
	let position = Position {
		line: 0,
		character: 99,
	};
	assert_eq!(
		lsp_position_to_cursor(&doc.content, position),
		Some(CursorPosition::new(0, 9))
	);
}

#[test]
fn position_to_cursor_counts_characters_not_utf16_units() {
	let doc = open_doc("::a😀b");
	// Character 5 sits after the emoji, which occupies two UTF-16 units
	// but is a single character column.
	let position = Position {
		line: 0,
		character: 5,
	};
	assert_eq!(
		lsp_position_to_cursor(&doc.content, position),
		Some(CursorPosition::new(0, 4))
	);
}

#[test]
fn position_to_cursor_addresses_the_line_after_a_trailing_newline() {
	let doc = open_doc("::callout\n");
	let position = Position {
		line: 1,
		character: 0,
	};
	assert_eq!(
		lsp_position_to_cursor(&doc.content, position),
		Some(CursorPosition::new(1, 0))
	);
}

#[test]
fn position_to_cursor_rejects_missing_line() {
	let doc = open_doc("::callout");
	let position = Position {
		line: 3,
		character: 0,
	};
	assert_eq!(lsp_position_to_cursor(&doc.content, position), None);

	// Without a trailing newline there is no line past the last one.
	let position = Position {
		line: 1,
		character: 0,
	};
	assert_eq!(lsp_position_to_cursor(&doc.content, position), None);
}

// ---- Content change tests ----

#[test]
fn content_change_without_range_replaces_document() {
	let mut content = "old text".to_string();
	apply_content_change(&mut content, &change(None, "::callout"));
	assert_eq!(content, "::callout");
}

#[test]
fn content_change_inserts_at_cursor() {
	let mut content = "::ca".to_string();
	apply_content_change(&mut content, &change(Some(lsp_range(0, 4, 0, 4)), "llout"));
	assert_eq!(content, "::callout");
}

#[test]
fn content_change_replaces_range() {
	let mut content = "::callout".to_string();
	apply_content_change(&mut content, &change(Some(lsp_range(0, 2, 0, 9)), "card"));
	assert_eq!(content, "::card");
}

#[test]
fn content_change_deletes_range() {
	let mut content = "::callout".to_string();
	apply_content_change(&mut content, &change(Some(lsp_range(0, 2, 0, 9)), ""));
	assert_eq!(content, "::");
}

#[test]
fn content_change_replaces_across_line() {
	let mut content = "::callout\ntype: note\n::".to_string();
	apply_content_change(
		&mut content,
		&change(Some(lsp_range(1, 0, 1, 10)), "icon: sparkles"),
	);
	assert_eq!(content, "::callout\nicon: sparkles\n::");
}

#[test]
fn content_change_with_invalid_range_is_ignored() {
	let mut content = "ab".to_string();
	apply_content_change(&mut content, &change(Some(lsp_range(5, 0, 5, 1)), "x"));
	assert_eq!(content, "ab");
}

#[test]
fn content_changes_apply_in_order() {
	let mut content = "::".to_string();
	let changes = vec![
		change(Some(lsp_range(0, 2, 0, 2)), "ca"),
		change(Some(lsp_range(0, 4, 0, 4)), "llout"),
	];
	for event in &changes {
		apply_content_change(&mut content, event);
	}
	assert_eq!(content, "::callout");
}

// ---- Completion item tests ----

#[test]
fn completion_items_for_component_names() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::");
	let items = compute_completion_items(Some(&snapshot), &doc, CursorPosition::new(0, 2));

	assert_eq!(items.len(), 2);
	assert_eq!(items[0].label, "callout");
	assert_eq!(items[0].kind, Some(CompletionItemKind::CLASS));
	assert_eq!(items[0].sort_text.as_deref(), Some("00"));
	assert_eq!(items[0].insert_text, None);
	assert_eq!(items[1].label, "card");
	assert_eq!(items[1].sort_text.as_deref(), Some("01"));
}

#[test]
fn completion_items_carry_markdown_documentation() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::");
	let items = compute_completion_items(Some(&snapshot), &doc, CursorPosition::new(0, 2));

	let Some(Documentation::MarkupContent(markup)) = &items[0].documentation else {
		panic!("expected markdown documentation");
	};
	assert_eq!(markup.kind, MarkupKind::Markdown);
	assert_eq!(markup.value, "A stylized box for notes and warnings.");
	assert_eq!(items[1].documentation, None);
}

#[test]
fn completion_items_for_props_in_block_body() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::callout\n\n::");
	let items = compute_completion_items(Some(&snapshot), &doc, CursorPosition::new(1, 0));

	assert_eq!(items.len(), 2);
	assert_eq!(items[0].label, "type");
	assert_eq!(items[0].kind, Some(CompletionItemKind::FIELD));
	assert_eq!(items[0].detail.as_deref(), Some("enum (required)"));
	assert_eq!(items[0].insert_text.as_deref(), Some("type: note"));
	assert_eq!(items[1].label, "icon");
	assert_eq!(items[1].insert_text.as_deref(), Some("icon: "));
}

#[test]
fn completion_items_for_props_on_the_line_after_a_trailing_newline() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::callout\n");
	let position = Position {
		line: 1,
		character: 0,
	};

	// The position an editor sends after pressing Enter on an unclosed
	// open tag at the end of the document.
	let pos = lsp_position_to_cursor(&doc.content, position)
		.unwrap_or_else(|| panic!("expected the trailing line to be addressable"));
	let items = compute_completion_items(Some(&snapshot), &doc, pos);

	let labels: Vec<_> = items.iter().map(|item| item.label.as_str()).collect();
	assert_eq!(labels, vec!["type", "icon"]);
}

#[test]
fn completion_items_use_attribute_form_inside_braces() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::callout{}");
	let items = compute_completion_items(Some(&snapshot), &doc, CursorPosition::new(0, 10));

	assert_eq!(items.len(), 2);
	assert_eq!(items[0].insert_text.as_deref(), Some("type=\"note\""));
}

#[test]
fn completion_items_exclude_present_props() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::callout\ntype: note\n\n::");
	let items = compute_completion_items(Some(&snapshot), &doc, CursorPosition::new(2, 0));

	assert_eq!(items.len(), 1);
	assert_eq!(items[0].label, "icon");
}

#[test]
fn completion_items_empty_without_snapshot() {
	let doc = open_doc("::");
	let items = compute_completion_items(None, &doc, CursorPosition::new(0, 2));
	assert!(items.is_empty());
}

#[test]
fn completion_items_empty_outside_any_block() {
	let snapshot = sample_snapshot();
	let doc = open_doc("plain prose");
	let items = compute_completion_items(Some(&snapshot), &doc, CursorPosition::new(0, 5));
	assert!(items.is_empty());
}

// ---- Hover tests ----

#[test]
fn hover_on_open_tag_shows_description_and_props() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::callout\n::");
	let hover = compute_hover(Some(&snapshot), &doc, CursorPosition::new(0, 4))
		.unwrap_or_else(|| panic!("expected hover on the open marker"));

	let HoverContents::Markup(markup) = &hover.contents else {
		panic!("expected markup hover contents");
	};
	assert_eq!(markup.kind, MarkupKind::Markdown);
	assert!(markup.value.starts_with("**::callout**"));
	assert!(
		markup
			.value
			.contains("A stylized box for notes and warnings.")
	);
	assert!(markup.value.contains("| `type` | enum (required) | `note` |"));
	assert!(markup.value.contains("| `icon` | string |  |"));
	assert_eq!(hover.range, Some(lsp_range(0, 0, 0, 9)));
}

#[test]
fn hover_without_description_renders_prop_table_only() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::card");
	let hover = compute_hover(Some(&snapshot), &doc, CursorPosition::new(0, 3))
		.unwrap_or_else(|| panic!("expected hover on the open marker"));

	let HoverContents::Markup(markup) = &hover.contents else {
		panic!("expected markup hover contents");
	};
	let expected = concat!(
		"**::card**\n\n",
		"| Prop | Type | Default |\n",
		"| --- | --- | --- |\n",
		"| `title` | string (required) |  |\n",
		"| `flat` | boolean |  |"
	);
	assert_eq!(markup.value, expected);
}

#[test]
fn hover_covers_marker_end_column() {
	let snapshot = sample_snapshot();
	let doc = open_doc("::callout{type=\"note\"}");
	assert!(compute_hover(Some(&snapshot), &doc, CursorPosition::new(0, 9)).is_some());
	assert!(compute_hover(Some(&snapshot), &doc, CursorPosition::new(0, 10)).is_none());
}

#[rstest]
#[case::unknown_component("::mystery", 0, 2)]
#[case::close_marker("::callout\n::", 1, 1)]
#[case::body_text("::callout\ntext\n::", 1, 2)]
#[case::plain_prose("just prose", 0, 4)]
fn hover_degrades_to_none(#[case] content: &str, #[case] line: usize, #[case] column: usize) {
	let snapshot = sample_snapshot();
	let doc = open_doc(content);
	assert!(compute_hover(Some(&snapshot), &doc, CursorPosition::new(line, column)).is_none());
}

#[test]
fn hover_degrades_without_snapshot() {
	let doc = open_doc("::callout");
	assert!(compute_hover(None, &doc, CursorPosition::new(0, 4)).is_none());
}

// ---- Folding tests ----

#[test]
fn folding_ranges_for_nested_blocks() {
	let doc = open_doc("::outer\n:::inner\n:::\n::");
	let expected = vec![
		FoldingRange {
			start_line: 0,
			end_line: 3,
			kind: Some(FoldingRangeKind::Region),
			..Default::default()
		},
		FoldingRange {
			start_line: 1,
			end_line: 2,
			kind: Some(FoldingRangeKind::Region),
			..Default::default()
		},
	];
	assert_eq!(compute_folding_ranges(&doc), expected);
}

#[test]
fn folding_range_for_unclosed_block_extends_to_end() {
	let doc = open_doc("::callout\nsome text");
	let ranges = compute_folding_ranges(&doc);
	assert_eq!(ranges.len(), 1);
	assert_eq!(ranges[0].start_line, 0);
	assert_eq!(ranges[0].end_line, 1);
}

#[test]
fn folding_skips_block_opened_on_last_line() {
	let doc = open_doc("some text\n::callout");
	assert!(compute_folding_ranges(&doc).is_empty());
}

#[test]
fn folding_ignores_markers_inside_code_fences() {
	let doc = open_doc("```\n::callout\n::\n```");
	assert!(compute_folding_ranges(&doc).is_empty());
}

#[test]
fn folding_empty_for_plain_document() {
	let doc = open_doc("# Heading\n\nprose");
	assert!(compute_folding_ranges(&doc).is_empty());
}

// ---- File watcher tests ----

#[test]
fn watcher_glob_anchors_pattern_at_root() {
	assert_eq!(
		watcher_glob(Path::new("/ws"), "components/**/*.meta.json"),
		"/ws/components/**/*.meta.json"
	);
}

// ---- Cache glue tests ----

struct StaticSource(Vec<ComponentDescriptor>);

impl MetadataSource for StaticSource {
	async fn fetch(&self, _origin: &Origin) -> McResult<Vec<ComponentDescriptor>> {
		Ok(self.0.clone())
	}
}

#[tokio::test]
async fn cache_snapshot_feeds_completion_items() {
	let cache = MetadataCache::new(
		StaticSource(sample_components()),
		Origin::none(Path::new("/tmp/ws")),
	);
	let snapshot = cache.get(true).await;

	let doc = open_doc("::");
	let items = compute_completion_items(snapshot.as_deref(), &doc, CursorPosition::new(0, 2));

	assert_eq!(items.len(), 2);
	assert_eq!(items[0].label, "callout");
	assert_eq!(items[1].label, "card");
}
