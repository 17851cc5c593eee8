use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::WalkBuilder;
use reqwest::Client;
use tracing::debug;

use crate::McError;
use crate::McResult;
use crate::catalog::CatalogBuilder;
use crate::catalog::ComponentDescriptor;
use crate::catalog::parse_catalog_into;
use crate::config::DEFAULT_FETCH_TIMEOUT;
use crate::config::Origin;

/// Stateless supplier of component metadata for a configured origin. The
/// cache is generic over this trait so tests can count or fail fetches
/// without touching the network.
pub trait MetadataSource: Send + Sync + 'static {
	fn fetch(
		&self,
		origin: &Origin,
	) -> impl Future<Output = McResult<Vec<ComponentDescriptor>>> + Send;
}

/// Production source: reads local files matching the configured glob
/// pattern, or fetches the configured URL when the pattern resolves to
/// nothing. Both origins configured and files present means the URL is
/// never consulted. Nothing configured or resolvable yields an empty
/// catalog. Holds no cache of its own.
#[derive(Debug, Clone)]
pub struct OriginSource {
	client: Client,
	timeout: Duration,
}

impl Default for OriginSource {
	fn default() -> Self {
		Self::new()
	}
}

impl OriginSource {
	pub fn new() -> Self {
		Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Self {
		Self {
			client: Client::new(),
			timeout,
		}
	}

	async fn fetch_remote(&self, url: &str) -> McResult<Vec<ComponentDescriptor>> {
		debug!(url, "fetching component metadata");

		let response = self
			.client
			.get(url)
			.timeout(self.timeout)
			.send()
			.await
			.map_err(|error| self.classify_transport_error(url, &error))?;

		let status = response.status();
		if !status.is_success() {
			return Err(McError::Fetch {
				origin: url.to_string(),
				reason: format!("unexpected status {status}"),
			});
		}

		let payload = response
			.text()
			.await
			.map_err(|error| self.classify_transport_error(url, &error))?;

		let mut builder = CatalogBuilder::new();
		parse_catalog_into(&mut builder, url, &payload)?;
		Ok(builder.finish())
	}

	fn classify_transport_error(&self, url: &str, error: &reqwest::Error) -> McError {
		if error.is_timeout() {
			McError::Timeout {
				origin: url.to_string(),
				timeout_ms: self.timeout.as_millis().try_into().unwrap_or(u64::MAX),
			}
		} else {
			McError::Fetch {
				origin: url.to_string(),
				reason: error.to_string(),
			}
		}
	}
}

impl MetadataSource for OriginSource {
	async fn fetch(&self, origin: &Origin) -> McResult<Vec<ComponentDescriptor>> {
		if let Some(pattern) = origin.pattern.as_deref() {
			let files = resolve_pattern(&origin.root, pattern)?;

			if !files.is_empty() {
				debug!(
					pattern,
					count = files.len(),
					"reading component metadata from local files"
				);
				return read_local_catalog(&origin.root, &files);
			}

			debug!(pattern, "local metadata pattern matched no files");
		}

		if let Some(url) = origin.url.as_deref() {
			return self.fetch_remote(url).await;
		}

		debug!("no metadata origin configured, serving an empty catalog");
		Ok(vec![])
	}
}

/// Build a single-pattern `GlobSet`. Unlike scan-time include sets, a
/// malformed pattern here is a hard error so the user learns their setting
/// is broken instead of silently getting an empty catalog.
pub(crate) fn build_pattern_set(pattern: &str) -> McResult<GlobSet> {
	let glob = Glob::new(pattern).map_err(|error| McError::InvalidPattern {
		pattern: pattern.to_string(),
		reason: error.to_string(),
	})?;

	let mut builder = GlobSetBuilder::new();
	builder.add(glob);
	builder.build().map_err(|error| McError::InvalidPattern {
		pattern: pattern.to_string(),
		reason: error.to_string(),
	})
}

/// Resolve the configured glob against the workspace root. Standard ignore
/// filters are disabled: the pattern is explicit user intent and routinely
/// points into hidden or ignored build output.
fn resolve_pattern(root: &Path, pattern: &str) -> McResult<Vec<PathBuf>> {
	let glob_set = build_pattern_set(pattern)?;
	let mut files = vec![];

	for entry in WalkBuilder::new(root).standard_filters(false).build() {
		let Ok(entry) = entry else {
			continue;
		};
		if !entry.file_type().is_some_and(|kind| kind.is_file()) {
			continue;
		}

		let path = entry.path();
		let relative = path.strip_prefix(root).unwrap_or(path);
		if glob_set.is_match(relative) {
			files.push(path.to_path_buf());
		}
	}

	// Sort for deterministic catalog order across files.
	files.sort();
	Ok(files)
}

fn read_local_catalog(root: &Path, files: &[PathBuf]) -> McResult<Vec<ComponentDescriptor>> {
	let mut builder = CatalogBuilder::new();

	for file in files {
		let label = file
			.strip_prefix(root)
			.unwrap_or(file)
			.display()
			.to_string();
		let payload = std::fs::read_to_string(file).map_err(|error| McError::Fetch {
			origin: label.clone(),
			reason: error.to_string(),
		})?;
		parse_catalog_into(&mut builder, &label, &payload)?;
	}

	Ok(builder.finish())
}
