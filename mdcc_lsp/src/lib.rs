use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use mdcc_core::CandidateKind;
use mdcc_core::CompletionCandidate;
use mdcc_core::CursorPosition;
use mdcc_core::DocumentLines;
use mdcc_core::MetadataCache;
use mdcc_core::MetadataSnapshot;
use mdcc_core::Origin;
use mdcc_core::OriginSource;
use mdcc_core::RefreshCoordinator;
use mdcc_core::Settings;
use mdcc_core::TagLine;
use mdcc_core::TagScanner;
use mdcc_core::completions;
use mdcc_core::parse_tag_line;
use mdcc_core::scan_blocks;
use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp_server::Client;
use tower_lsp_server::LanguageServer;
use tower_lsp_server::jsonrpc::Result as LspResult;
use tower_lsp_server::ls_types::*;
use tracing::warn;

/// Command identifier clients invoke to force a metadata refresh.
pub const REFRESH_COMMAND: &str = "mdcc.refreshComponentMetadata";

const WATCHER_ID: &str = "mdcc-metadata-files";
const WATCHER_METHOD: &str = "workspace/didChangeWatchedFiles";

/// State for a single open document.
#[derive(Clone)]
struct DocumentState {
	/// The full text content of the document.
	content: String,
}

impl DocumentLines for DocumentState {
	fn line(&self, index: usize) -> Option<&str> {
		self.content.as_str().line(index)
	}

	fn line_count(&self) -> usize {
		self.content.as_str().line_count()
	}
}

/// The metadata engine behind the server: one cache plus the coordinator
/// routing refresh signals into it. Built on `initialize` once the workspace
/// root is known.
struct Engine {
	cache: MetadataCache<OriginSource>,
	coordinator: Arc<RefreshCoordinator<OriginSource>>,
}

/// Workspace-level state shared across all LSP requests.
#[derive(Default)]
struct WorkspaceState {
	/// The workspace root path.
	root: PathBuf,
	/// Open documents keyed by URI.
	documents: HashMap<Uri, DocumentState>,
	/// Active settings from `initializationOptions` and configuration pushes.
	settings: Settings,
	/// Cache and coordinator, present after `initialize`.
	engine: Option<Engine>,
	/// Whether a dynamic file watcher registration is currently held.
	watcher_active: bool,
}

/// Convert an LSP `Position` (0-indexed line, character in UTF-16 code units)
/// to a byte offset within `content`. Returns `None` if the position is out of
/// bounds.
fn lsp_position_to_offset(content: &str, position: Position) -> Option<usize> {
	let mut offset = 0;
	for (i, line) in content.split('\n').enumerate() {
		if i == position.line as usize {
			// LSP character offsets are in UTF-16 code units, so walk the
			// line converting from UTF-16 units to byte indices.
			let mut utf16_offset = 0u32;
			for (byte_idx, c) in line.char_indices() {
				if utf16_offset == position.character {
					return Some(offset + byte_idx);
				}
				utf16_offset += c.len_utf16() as u32;
			}
			// Position at end of line (past last character).
			if utf16_offset == position.character {
				return Some(offset + line.len());
			}
			return None;
		}
		offset += line.len() + 1; // +1 for '\n'
	}
	None
}

/// Convert an LSP `Position` to an engine cursor, whose columns count
/// characters rather than UTF-16 code units. Positions past the end of the
/// line clamp to its character count, the way editors treat them. Lines are
/// the same `split('\n')` view as [`lsp_position_to_offset`]: the empty line
/// after a trailing newline is addressable.
fn lsp_position_to_cursor(content: &str, position: Position) -> Option<CursorPosition> {
	let line = content.split('\n').nth(position.line as usize)?;

	let mut utf16_offset = 0u32;
	let mut column = 0usize;
	for c in line.chars() {
		if utf16_offset >= position.character {
			break;
		}
		utf16_offset += c.len_utf16() as u32;
		column += 1;
	}

	Some(CursorPosition::new(position.line as usize, column))
}

/// Apply a single LSP content change to a document: replace the given range,
/// or the whole text when no range is present.
fn apply_content_change(content: &mut String, change: &TextDocumentContentChangeEvent) {
	match change.range {
		Some(range) => {
			let start = lsp_position_to_offset(content, range.start);
			let end = lsp_position_to_offset(content, range.end);
			if let (Some(start), Some(end)) = (start, end) {
				content.replace_range(start..end, &change.text);
			}
		}
		None => content.clone_from(&change.text),
	}
}

/// The mdcc language server.
pub struct MdccLanguageServer {
	client: Client,
	state: RwLock<WorkspaceState>,
}

impl MdccLanguageServer {
	pub fn new(client: Client) -> Self {
		Self {
			client,
			state: RwLock::new(WorkspaceState::default()),
		}
	}

	/// Cache handle plus document for a read request, or `None` when the
	/// engine is disabled, not yet initialized, or the document is unknown.
	async fn query_context(
		&self,
		uri: &Uri,
	) -> Option<(MetadataCache<OriginSource>, DocumentState)> {
		let state = self.state.read().await;
		if !state.settings.enable_component_metadata_completions {
			return None;
		}
		let engine = state.engine.as_ref()?;
		let doc = state.documents.get(uri)?;
		Some((engine.cache.clone(), doc.clone()))
	}

	async fn coordinator(&self) -> Option<Arc<RefreshCoordinator<OriginSource>>> {
		let state = self.state.read().await;
		state
			.engine
			.as_ref()
			.map(|engine| Arc::clone(&engine.coordinator))
	}

	/// Register a dynamic `workspace/didChangeWatchedFiles` watcher for the
	/// active local metadata pattern, replacing whatever registration is
	/// currently held. No watcher is held while the origin is remote-only
	/// or unconfigured.
	async fn sync_file_watcher(&self) {
		let (root, coordinator, was_active) = {
			let state = self.state.read().await;
			let Some(engine) = &state.engine else {
				return;
			};
			(
				state.root.clone(),
				Arc::clone(&engine.coordinator),
				state.watcher_active,
			)
		};

		if was_active {
			let unregistered = self
				.client
				.unregister_capability(vec![Unregistration {
					id: WATCHER_ID.to_string(),
					method: WATCHER_METHOD.to_string(),
				}])
				.await;
			if let Err(error) = unregistered {
				warn!(%error, "failed to unregister metadata file watcher");
			}
		}

		let Some(pattern) = coordinator.active_pattern().await else {
			let mut state = self.state.write().await;
			state.watcher_active = false;
			return;
		};

		let options = DidChangeWatchedFilesRegistrationOptions {
			watchers: vec![FileSystemWatcher {
				glob_pattern: GlobPattern::String(watcher_glob(&root, &pattern)),
				kind: None,
			}],
		};
		let registered = self
			.client
			.register_capability(vec![Registration {
				id: WATCHER_ID.to_string(),
				method: WATCHER_METHOD.to_string(),
				register_options: serde_json::to_value(options).ok(),
			}])
			.await;

		let active = match registered {
			Ok(()) => true,
			Err(error) => {
				warn!(%error, "failed to register metadata file watcher");
				false
			}
		};

		let mut state = self.state.write().await;
		state.watcher_active = active;
	}
}

impl LanguageServer for MdccLanguageServer {
	async fn initialize(&self, params: InitializeParams) -> LspResult<InitializeResult> {
		// Determine the workspace root: prefer `workspace_folders` (modern
		// LSP), fall back to the deprecated `root_uri` for older clients,
		// then to the process working directory.
		let root = params
			.workspace_folders
			.as_ref()
			.and_then(|folders| folders.first())
			.and_then(|folder| folder.uri.to_file_path().map(std::borrow::Cow::into_owned))
			.or_else(|| {
				#[allow(deprecated)]
				params
					.root_uri
					.as_ref()
					.and_then(|uri| uri.to_file_path().map(std::borrow::Cow::into_owned))
			})
			.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

		let settings = match &params.initialization_options {
			Some(options) => match Settings::from_json(options) {
				Ok(settings) => settings,
				Err(error) => {
					warn!(%error, "invalid initialization options, using defaults");
					Settings::default()
				}
			},
			None => Settings::default(),
		};

		// One cache per server, configured through the coordinator so the
		// origin and the file watcher pattern stay in lockstep.
		let cache = MetadataCache::new(OriginSource::new(), Origin::none(&root));
		let coordinator = Arc::new(RefreshCoordinator::new(cache.clone(), &root));
		coordinator.apply_settings(&settings).await;

		{
			let mut state = self.state.write().await;
			state.root = root;
			state.settings = settings;
			state.engine = Some(Engine { cache, coordinator });
		}

		Ok(InitializeResult {
			capabilities: ServerCapabilities {
				text_document_sync: Some(TextDocumentSyncCapability::Kind(
					TextDocumentSyncKind::INCREMENTAL,
				)),
				hover_provider: Some(HoverProviderCapability::Simple(true)),
				completion_provider: Some(CompletionOptions {
					trigger_characters: Some(vec![
						":".to_string(),
						"\n".to_string(),
						" ".to_string(),
					]),
					..Default::default()
				}),
				folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
				execute_command_provider: Some(ExecuteCommandOptions {
					commands: vec![REFRESH_COMMAND.to_string()],
					..Default::default()
				}),
				..Default::default()
			},
			server_info: Some(ServerInfo {
				name: "mdcc-lsp".to_string(),
				version: Some(env!("CARGO_PKG_VERSION").to_string()),
			}),
			offset_encoding: None,
		})
	}

	async fn initialized(&self, _: InitializedParams) {
		self.sync_file_watcher().await;
		self.client
			.log_message(MessageType::INFO, "mdcc language server initialized")
			.await;
	}

	async fn shutdown(&self) -> LspResult<()> {
		Ok(())
	}

	async fn did_open(&self, params: DidOpenTextDocumentParams) {
		let mut state = self.state.write().await;
		state.documents.insert(
			params.text_document.uri,
			DocumentState {
				content: params.text_document.text,
			},
		);
	}

	async fn did_change(&self, params: DidChangeTextDocumentParams) {
		let uri = params.text_document.uri;

		let current = {
			let state = self.state.read().await;
			state.documents.get(&uri).map(|doc| doc.content.clone())
		};

		let content = match current {
			Some(mut content) => {
				// With INCREMENTAL sync each change carries a `range` for
				// the region to replace; a missing range means full text.
				for change in &params.content_changes {
					apply_content_change(&mut content, change);
				}
				content
			}
			// Untracked document: keep the last change as the full text.
			None => match params.content_changes.into_iter().next_back() {
				Some(change) => change.text,
				None => return,
			},
		};

		let mut state = self.state.write().await;
		state.documents.insert(uri, DocumentState { content });
	}

	async fn did_close(&self, params: DidCloseTextDocumentParams) {
		let mut state = self.state.write().await;
		state.documents.remove(&params.text_document.uri);
	}

	async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
		let settings = match Settings::from_json(&params.settings) {
			Ok(settings) => settings,
			Err(error) => {
				warn!(%error, "ignoring invalid configuration push");
				return;
			}
		};

		let coordinator = {
			let mut state = self.state.write().await;
			state.settings = settings.clone();
			state
				.engine
				.as_ref()
				.map(|engine| Arc::clone(&engine.coordinator))
		};
		let Some(coordinator) = coordinator else {
			return;
		};

		if coordinator.apply_settings(&settings).await {
			self.sync_file_watcher().await;
		}
	}

	async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
		let Some(coordinator) = self.coordinator().await else {
			return;
		};

		for event in params.changes {
			if let Some(path) = event.uri.to_file_path().map(std::borrow::Cow::into_owned) {
				coordinator.handle_file_event(&path).await;
			}
		}
	}

	async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
		let uri = &params.text_document_position.text_document.uri;
		let position = params.text_document_position.position;

		let Some((cache, doc)) = self.query_context(uri).await else {
			return Ok(None);
		};
		let Some(pos) = lsp_position_to_cursor(&doc.content, position) else {
			return Ok(None);
		};

		// Never blocks on the network: the published snapshot (if any) is
		// used as-is and a refetch is kicked off in the background.
		let snapshot = cache.latest_or_refresh().await;
		let items = compute_completion_items(snapshot.as_deref(), &doc, pos);

		if items.is_empty() {
			Ok(None)
		} else {
			Ok(Some(CompletionResponse::Array(items)))
		}
	}

	async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
		let uri = &params.text_document_position_params.text_document.uri;
		let position = params.text_document_position_params.position;

		let Some((cache, doc)) = self.query_context(uri).await else {
			return Ok(None);
		};
		let Some(pos) = lsp_position_to_cursor(&doc.content, position) else {
			return Ok(None);
		};

		let snapshot = cache.latest_or_refresh().await;
		Ok(compute_hover(snapshot.as_deref(), &doc, pos))
	}

	async fn folding_range(
		&self,
		params: FoldingRangeParams,
	) -> LspResult<Option<Vec<FoldingRange>>> {
		let uri = &params.text_document.uri;

		let doc = {
			let state = self.state.read().await;
			state.documents.get(uri).cloned()
		};
		let Some(doc) = doc else {
			return Ok(None);
		};

		let ranges = compute_folding_ranges(&doc);
		if ranges.is_empty() {
			Ok(None)
		} else {
			Ok(Some(ranges))
		}
	}

	async fn execute_command(&self, params: ExecuteCommandParams) -> LspResult<Option<Value>> {
		if params.command != REFRESH_COMMAND {
			self.client
				.log_message(
					MessageType::WARNING,
					format!("unknown command `{}`", params.command),
				)
				.await;
			return Ok(None);
		}

		let Some(coordinator) = self.coordinator().await else {
			return Ok(None);
		};

		match coordinator.force_refresh().await {
			Ok(snapshot) => {
				let components = snapshot.map_or(0, |snapshot| snapshot.len());
				self.client
					.log_message(
						MessageType::INFO,
						format!("component metadata refreshed: {components} component(s)"),
					)
					.await;
			}
			Err(error) => {
				self.client
					.show_message(
						MessageType::ERROR,
						format!("component metadata refresh failed: {error}"),
					)
					.await;
			}
		}

		Ok(None)
	}
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Compute completion items at a cursor: component names after a `::` tag
/// start, props of the enclosing block otherwise.
fn compute_completion_items(
	snapshot: Option<&MetadataSnapshot>,
	doc: &DocumentState,
	pos: CursorPosition,
) -> Vec<CompletionItem> {
	completions(snapshot, doc, pos, &TagScanner)
		.into_iter()
		.map(to_completion_item)
		.collect()
}

fn to_completion_item(candidate: CompletionCandidate) -> CompletionItem {
	let kind = match candidate.kind {
		CandidateKind::Component => CompletionItemKind::CLASS,
		CandidateKind::Prop => CompletionItemKind::FIELD,
	};

	CompletionItem {
		label: candidate.label,
		kind: Some(kind),
		detail: candidate.detail,
		documentation: candidate.documentation.map(|value| {
			Documentation::MarkupContent(MarkupContent {
				kind: MarkupKind::Markdown,
				value,
			})
		}),
		insert_text: candidate.insert_text,
		sort_text: Some(candidate.sort_text),
		..Default::default()
	}
}

// ---------------------------------------------------------------------------
// Hover
// ---------------------------------------------------------------------------

/// Compute hover information for an open-tag marker: the component's
/// description followed by a table of its props.
fn compute_hover(
	snapshot: Option<&MetadataSnapshot>,
	doc: &DocumentState,
	pos: CursorPosition,
) -> Option<Hover> {
	let snapshot = snapshot?;
	let line = doc.line(pos.line)?;
	let Some(TagLine::Open(tag)) = parse_tag_line(line) else {
		return None;
	};
	// Only the `::name` marker itself hovers; positions past it are inside
	// the block's prop region.
	if pos.column > tag.name_end_column {
		return None;
	}
	let component = snapshot.component(&tag.name)?;

	let mut value = format!("**::{}**", component.name);
	if let Some(description) = &component.description {
		value.push_str("\n\n");
		value.push_str(description);
	}
	if !component.props.is_empty() {
		value.push_str("\n\n| Prop | Type | Default |\n| --- | --- | --- |");
		for prop in &component.props {
			let default = prop
				.default_literal()
				.map_or_else(String::new, |literal| format!("`{literal}`"));
			value.push_str(&format!(
				"\n| `{}` | {} | {} |",
				prop.name,
				prop.type_hint(),
				default
			));
		}
	}

	Some(Hover {
		contents: HoverContents::Markup(MarkupContent {
			kind: MarkupKind::Markdown,
			value,
		}),
		range: Some(Range {
			start: Position {
				line: pos.line as u32,
				character: 0,
			},
			end: Position {
				line: pos.line as u32,
				character: tag.name_end_column as u32,
			},
		}),
	})
}

// ---------------------------------------------------------------------------
// Folding
// ---------------------------------------------------------------------------

/// Every scanned block span becomes a foldable region from its open marker
/// to its close marker, or to the end of the document while unclosed.
fn compute_folding_ranges(doc: &DocumentState) -> Vec<FoldingRange> {
	let last_line = doc.line_count().saturating_sub(1);

	scan_blocks(doc)
		.into_iter()
		.filter_map(|span| {
			let end_line = span.close_line.unwrap_or(last_line);
			if end_line <= span.open_line {
				return None;
			}
			Some(FoldingRange {
				start_line: span.open_line as u32,
				end_line: end_line as u32,
				kind: Some(FoldingRangeKind::Region),
				..Default::default()
			})
		})
		.collect()
}

// ---------------------------------------------------------------------------
// File watcher
// ---------------------------------------------------------------------------

/// Absolute glob handed to the client-side file watcher. String glob
/// patterns are matched against absolute paths, so the workspace-relative
/// pattern is anchored at the root.
fn watcher_glob(root: &Path, pattern: &str) -> String {
	root.join(pattern).to_string_lossy().replace('\\', "/")
}

/// Start the LSP server on stdin/stdout. This is used by both the standalone
/// `mdcc-lsp` binary and the `mdcc lsp` CLI subcommand.
pub async fn run_server() {
	let stdin = tokio::io::stdin();
	let stdout = tokio::io::stdout();

	let (service, socket) = tower_lsp_server::LspService::new(MdccLanguageServer::new);
	tower_lsp_server::Server::new(stdin, stdout, socket)
		.serve(service)
		.await;
}

#[cfg(test)]
mod __tests;
