//! `mdcc_core` is the core library for mdcc, the completion tooling for MDC
//! component tags (`::name{props}` … `::`) embedded in markdown. It
//! maintains a refreshable cached catalog of component metadata and answers
//! name- and prop-completion queries against it.
//!
//! ## Data Flow
//!
//! ```text
//! Configured origin (local glob pattern or remote URL)
//!   → OriginSource (reads/fetches and parses the JSON payload)
//!   → MetadataCache (single-flight fetches, snapshot publication,
//!     invalidation, stale-origin discard)
//!   → completion queries (pure reads over the published snapshot plus the
//!     document and cursor)
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Recognized settings, origin resolution and fingerprints,
//!   and `mdcc.toml` loading for the command line.
//! - [`blocks`] — Line-based block structure: open/close marker scanning,
//!   enclosing-block resolution, and prop-region inspection.
//! - [`completion`] — The two completion queries and their candidate type.
//!
//! ## Key Types
//!
//! - [`MetadataCache`] — Single-flight cache holding the latest valid
//!   [`MetadataSnapshot`].
//! - [`RefreshCoordinator`] — Forced refresh plus configuration- and
//!   file-change signal handling.
//! - [`ComponentDescriptor`] / [`PropDescriptor`] — The typed catalog.
//! - [`Settings`] — The recognized configuration keys.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use mdcc_core::MetadataCache;
//! use mdcc_core::OriginSource;
//! use mdcc_core::Settings;
//!
//! # async fn demo() {
//! let settings = Settings::default();
//! let origin = settings.origin(Path::new("."));
//! let cache = MetadataCache::new(OriginSource::new(), origin);
//!
//! if let Some(snapshot) = cache.get(false).await {
//!     println!("{} components known", snapshot.len());
//! }
//! # }
//! ```

pub use blocks::*;
pub use cache::*;
pub use catalog::*;
pub use completion::*;
pub use config::*;
pub use error::*;
pub use refresh::*;
pub use source::*;

pub mod blocks;
mod cache;
mod catalog;
pub mod completion;
pub mod config;
mod error;
mod refresh;
mod source;
