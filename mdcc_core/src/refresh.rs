use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use globset::GlobSet;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::McResult;
use crate::cache::MetadataCache;
use crate::catalog::MetadataSnapshot;
use crate::config::Origin;
use crate::config::Settings;
use crate::source::MetadataSource;
use crate::source::build_pattern_set;

struct CoordinatorState {
	origin: Origin,
	/// Matcher for the active local pattern; `None` while the origin is
	/// remote-only or the pattern does not compile.
	pattern_set: Option<GlobSet>,
}

/// Routes external refresh signals into the cache: the user-invoked forced
/// refresh, configuration-origin changes, and file-system changes to local
/// metadata files. Host layers call in explicitly; the coordinator owns no
/// ambient subscriptions of its own.
pub struct RefreshCoordinator<S> {
	cache: MetadataCache<S>,
	root: PathBuf,
	state: Mutex<CoordinatorState>,
}

impl<S: MetadataSource> RefreshCoordinator<S> {
	pub fn new(cache: MetadataCache<S>, root: &Path) -> Self {
		Self {
			cache,
			root: root.to_path_buf(),
			state: Mutex::new(CoordinatorState {
				origin: Origin::none(root),
				pattern_set: None,
			}),
		}
	}

	/// The forced-refresh command. Failures are returned for the host to
	/// surface to the user; background reads never see them.
	pub async fn force_refresh(&self) -> McResult<Option<Arc<MetadataSnapshot>>> {
		info!("forced component metadata refresh requested");
		let result = self.cache.force_refresh().await;

		match &result {
			Ok(snapshot) => {
				let components = snapshot.as_ref().map_or(0, |snapshot| snapshot.len());
				info!(components, "component metadata refresh complete");
			}
			Err(error) => {
				warn!(%error, "forced component metadata refresh failed");
			}
		}

		result
	}

	/// Apply (possibly changed) settings. When the origin they describe
	/// differs from the active one, the cache is invalidated and re-keyed
	/// so an in-flight fetch against the old origin is discarded at
	/// completion time. Returns whether the origin changed, so hosts can
	/// re-register file watchers.
	pub async fn apply_settings(&self, settings: &Settings) -> bool {
		let origin = settings.origin(&self.root);

		{
			let mut state = self.state.lock().await;
			if state.origin == origin {
				return false;
			}

			state.pattern_set = match origin.pattern.as_deref() {
				None => None,
				Some(pattern) => match build_pattern_set(pattern) {
					Ok(set) => Some(set),
					Err(error) => {
						warn!(%error, "ignoring unusable metadata file pattern");
						None
					}
				},
			};
			state.origin = origin.clone();
		}

		debug!(origin = %origin.describe(), "metadata origin settings changed");
		self.cache.set_origin(origin).await;
		true
	}

	/// A file-system change. Invalidates the cache (lazy refetch on the
	/// next read, so save storms collapse) when the local origin is active
	/// and the path matches its pattern; ignored otherwise.
	pub async fn handle_file_event(&self, path: &Path) {
		let matched = {
			let state = self.state.lock().await;
			let Some(pattern_set) = &state.pattern_set else {
				return;
			};

			let relative = path.strip_prefix(&state.origin.root).unwrap_or(path);
			pattern_set.is_match(relative)
		};

		if matched {
			debug!(path = %path.display(), "local metadata file changed");
			self.cache.invalidate().await;
		}
	}

	/// The glob pattern file events are currently matched against, for
	/// hosts that register watchers with their client.
	pub async fn active_pattern(&self) -> Option<String> {
		let state = self.state.lock().await;
		state
			.pattern_set
			.is_some()
			.then(|| state.origin.pattern.clone())
			.flatten()
	}
}
