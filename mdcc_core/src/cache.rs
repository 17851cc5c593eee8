use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

use crate::McError;
use crate::McResult;
use crate::catalog::MetadataSnapshot;
use crate::catalog::now_unix_ms;
use crate::config::Origin;
use crate::source::MetadataSource;

/// Broadcast to every caller awaiting an in-flight fetch.
#[derive(Debug, Clone)]
enum FetchCompletion {
	/// A new snapshot was published.
	Published,
	/// The fetch failed; the previously published snapshot (if any) stays.
	Failed(McError),
	/// The origin changed while the fetch was in flight; its result was
	/// thrown away without being published or recorded.
	Discarded,
}

/// Everything the cache knows, behind one lock that is never held across a
/// suspension point. The `in_flight` receiver doubles as the single-flight
/// guard: while it is present, no second fetch may start.
struct CacheState {
	origin: Origin,
	snapshot: Option<Arc<MetadataSnapshot>>,
	stale: bool,
	in_flight: Option<watch::Receiver<Option<FetchCompletion>>>,
	last_error: Option<McError>,
	generation: u64,
}

/// Single-flight cache for the component metadata catalog.
///
/// Reads are served from the currently published [`MetadataSnapshot`];
/// fetches run on a spawned task so a caller dropped mid-await never
/// cancels the fetch other callers are sharing. A fetch carries the origin
/// fingerprint it was started against and is discarded at completion time
/// when the configuration has moved on.
pub struct MetadataCache<S> {
	source: Arc<S>,
	state: Arc<Mutex<CacheState>>,
}

impl<S> Clone for MetadataCache<S> {
	fn clone(&self) -> Self {
		Self {
			source: Arc::clone(&self.source),
			state: Arc::clone(&self.state),
		}
	}
}

impl<S: MetadataSource> MetadataCache<S> {
	pub fn new(source: S, origin: Origin) -> Self {
		Self {
			source: Arc::new(source),
			state: Arc::new(Mutex::new(CacheState {
				origin,
				snapshot: None,
				stale: false,
				in_flight: None,
				last_error: None,
				generation: 0,
			})),
		}
	}

	/// Read the catalog, fetching when necessary.
	///
	/// With `force_refresh = false` a valid published snapshot is returned
	/// immediately with no I/O; otherwise the caller awaits the in-flight
	/// fetch (starting one when none exists). With `force_refresh = true` a
	/// fresh fetch always runs unless one is already in flight, in which
	/// case that fetch is shared instead of duplicated.
	///
	/// Fetch failures never surface here: the previous snapshot (possibly
	/// `None`) is returned and the error is recorded for
	/// [`last_error`](Self::last_error) / [`force_refresh`](Self::force_refresh).
	pub async fn get(&self, force_refresh: bool) -> Option<Arc<MetadataSnapshot>> {
		self.get_inner(force_refresh).await.0
	}

	/// `get(true)` with the failure of the awaited fetch made explicit, for
	/// the forced-refresh command path.
	pub async fn force_refresh(&self) -> McResult<Option<Arc<MetadataSnapshot>>> {
		let (snapshot, error) = self.get_inner(true).await;
		match error {
			Some(error) => Err(error),
			None => Ok(snapshot),
		}
	}

	async fn get_inner(&self, force_refresh: bool) -> (Option<Arc<MetadataSnapshot>>, Option<McError>) {
		let mut rx = {
			let mut state = self.state.lock().await;

			if !force_refresh && !state.stale && state.snapshot.is_some() {
				return (state.snapshot.clone(), None);
			}

			match state.in_flight.clone() {
				Some(rx) => rx,
				None => self.start_fetch_locked(&mut state),
			}
		};

		// The watch guard is not Send; copy the completion out before the
		// next suspension point.
		let completion = rx
			.wait_for(|value| value.is_some())
			.await
			.map(|value| value.clone())
			.ok()
			.flatten();

		if completion.is_none() {
			// The fetch task died without reporting. Drop the dead handle
			// so the next read can start over.
			let mut state = self.state.lock().await;
			if let Some(stored) = &state.in_flight {
				if stored.has_changed().is_err() {
					state.in_flight = None;
				}
			}
		}

		let state = self.state.lock().await;
		let error = match completion {
			Some(FetchCompletion::Failed(error)) => Some(error),
			_ => None,
		};

		(state.snapshot.clone(), error)
	}

	/// The currently published snapshot, stale or not. Never performs or
	/// awaits I/O.
	pub async fn latest(&self) -> Option<Arc<MetadataSnapshot>> {
		self.state.lock().await.snapshot.clone()
	}

	/// The completion-path read: returns the published snapshot immediately
	/// and, when it is missing or stale, kicks off the single-flight fetch
	/// in the background without awaiting it. A cache that has never been
	/// populated because its origin keeps failing is not re-kicked here;
	/// an invalidation or forced refresh re-arms it.
	pub async fn latest_or_refresh(&self) -> Option<Arc<MetadataSnapshot>> {
		let mut state = self.state.lock().await;

		let never_populated = state.snapshot.is_none() && state.last_error.is_none();
		if (never_populated || state.stale) && state.in_flight.is_none() {
			self.start_fetch_locked(&mut state);
		}

		state.snapshot.clone()
	}

	/// Mark the published snapshot stale without deleting it and without
	/// fetching. The next read triggers exactly one refetch; repeated
	/// invalidations before that read collapse into it.
	pub async fn invalidate(&self) {
		let mut state = self.state.lock().await;
		state.stale = true;
		debug!("metadata cache invalidated");
	}

	/// Replace the configured origin. The state is marked stale and the
	/// origin fingerprint changes, so a fetch still in flight for the old
	/// origin is discarded at completion time instead of publishing over
	/// the new configuration.
	pub async fn set_origin(&self, origin: Origin) {
		let mut state = self.state.lock().await;
		debug!(origin = %origin.describe(), "metadata origin replaced");
		state.origin = origin;
		state.stale = true;
		state.last_error = None;
	}

	/// The last recorded refresh failure, cleared by the next successful
	/// fetch.
	pub async fn last_error(&self) -> Option<McError> {
		self.state.lock().await.last_error.clone()
	}

	/// Generation of the published snapshot; 0 while the cache is empty.
	pub async fn generation(&self) -> u64 {
		self.state.lock().await.generation
	}

	/// Start the fetch task. Must be called with the state lock held; the
	/// caller receives the shared completion channel.
	fn start_fetch_locked(&self, state: &mut CacheState) -> watch::Receiver<Option<FetchCompletion>> {
		let (tx, rx) = watch::channel(None);
		let origin = state.origin.clone();
		let fingerprint = origin.fingerprint();

		// Staleness is consumed when the refetch starts: a failing refresh
		// leaves the previous snapshot readable without retriggering a
		// fetch on every read.
		state.stale = false;
		state.in_flight = Some(rx.clone());

		debug!(origin = %origin.describe(), "starting metadata fetch");

		let source = Arc::clone(&self.source);
		let shared = Arc::clone(&self.state);
		tokio::spawn(async move {
			let result = source.fetch(&origin).await;

			let completion = {
				let mut state = shared.lock().await;
				state.in_flight = None;

				if state.origin.fingerprint() != fingerprint {
					warn!(
						origin = %origin.describe(),
						"discarding metadata fetched against a replaced origin"
					);
					FetchCompletion::Discarded
				} else {
					match result {
						Ok(components) => {
							state.generation += 1;
							let snapshot = Arc::new(MetadataSnapshot {
								components,
								generation: state.generation,
								fingerprint,
								fetched_at_unix_ms: now_unix_ms(),
							});
							state.snapshot = Some(snapshot);
							state.last_error = None;
							debug!(generation = state.generation, "published metadata snapshot");
							FetchCompletion::Published
						}
						Err(error) => {
							debug!(%error, "metadata refresh failed, keeping previous snapshot");
							state.last_error = Some(error.clone());
							FetchCompletion::Failed(error)
						}
					}
				}
			};

			let _ = tx.send(Some(completion));
		});

		rx
	}
}
