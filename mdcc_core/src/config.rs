use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::McError;
use crate::McResult;

/// Upper bound on a single metadata fetch, remote or local.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported config file locations in discovery order (highest precedence
/// first). Used by the command line front end; editors deliver the same
/// settings over the wire instead.
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["mdcc.toml", ".mdcc.toml", ".config/mdcc.toml"];

/// The recognized settings, matching the keys an editor client sends via
/// `initializationOptions` or `workspace/didChangeConfiguration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	/// Gates whether the cache and completion engine are active at all.
	pub enable_component_metadata_completions: bool,
	/// Remote origin for component metadata.
	pub component_metadata_url: Option<String>,
	/// Local origin for component metadata; takes precedence over the URL
	/// when it resolves to at least one file.
	pub component_metadata_local_file_pattern: Option<String>,
	/// Enables verbose diagnostic logging of fetch and cache activity.
	pub debug: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			enable_component_metadata_completions: true,
			component_metadata_url: None,
			component_metadata_local_file_pattern: None,
			debug: false,
		}
	}
}

impl Settings {
	/// Parse settings from a JSON payload, tolerating both the bare object
	/// and a `{"mdcc": {…}}` section wrapper.
	pub fn from_json(value: &Value) -> McResult<Self> {
		let section = value.get("mdcc").unwrap_or(value);

		if section.is_null() {
			return Ok(Self::default());
		}

		serde_json::from_value(section.clone())
			.map_err(|error| McError::ConfigParse(error.to_string()))
	}

	/// Resolve the fetch origin these settings describe, rooted at the
	/// workspace directory local patterns are relative to.
	pub fn origin(&self, root: &Path) -> Origin {
		Origin {
			root: root.to_path_buf(),
			pattern: self
				.component_metadata_local_file_pattern
				.as_deref()
				.filter(|pattern| !pattern.trim().is_empty())
				.map(str::to_string),
			url: self
				.component_metadata_url
				.as_deref()
				.filter(|url| !url.trim().is_empty())
				.map(str::to_string),
		}
	}
}

/// The configured metadata origin: an optional local glob pattern, an
/// optional remote URL, and the root local patterns resolve against. When
/// both are configured and the pattern matches at least one file, the local
/// files win and the URL is never consulted; the two origins are never
/// merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
	pub root: PathBuf,
	pub pattern: Option<String>,
	pub url: Option<String>,
}

impl Origin {
	/// An origin with nothing configured; fetching it yields an empty
	/// catalog.
	pub fn none(root: &Path) -> Self {
		Self {
			root: root.to_path_buf(),
			pattern: None,
			url: None,
		}
	}

	pub fn is_configured(&self) -> bool {
		self.pattern.is_some() || self.url.is_some()
	}

	/// Short human-readable label for logs and error messages.
	pub fn describe(&self) -> String {
		match (&self.pattern, &self.url) {
			(Some(pattern), Some(url)) => format!("{pattern} (falling back to {url})"),
			(Some(pattern), None) => pattern.clone(),
			(None, Some(url)) => url.clone(),
			(None, None) => "unconfigured".to_string(),
		}
	}

	/// The identity a fetch is issued against. Results carrying a
	/// fingerprint that no longer matches the current configuration are
	/// discarded at completion time instead of being published.
	pub fn fingerprint(&self) -> OriginFingerprint {
		OriginFingerprint(format!(
			"root={};files={};url={}",
			self.root.display(),
			self.pattern.as_deref().unwrap_or("-"),
			self.url.as_deref().unwrap_or("-"),
		))
	}
}

/// Opaque identity of a configured origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginFingerprint(String);

impl fmt::Display for OriginFingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Configuration loaded from an `mdcc.toml` file.
///
/// ```toml
/// debug = false
///
/// [metadata]
/// url = "https://example.com/api/component-meta"
/// files = "components/**/*.meta.json"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
	#[serde(default)]
	pub metadata: MetadataSection,
	#[serde(default)]
	pub debug: bool,
}

/// The `[metadata]` section of `mdcc.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct MetadataSection {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub files: Option<String>,
}

impl FileConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> McResult<Option<Self>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)
			.map_err(|error| McError::ConfigParse(error.to_string()))?;
		let config: Self =
			toml::from_str(&content).map_err(|error| McError::ConfigParse(error.to_string()))?;

		Ok(Some(config))
	}

	/// Convert the file configuration into the shared settings shape.
	pub fn settings(&self) -> Settings {
		Settings {
			enable_component_metadata_completions: true,
			component_metadata_url: self.metadata.url.clone(),
			component_metadata_local_file_pattern: self.metadata.files.clone(),
			debug: self.debug,
		}
	}
}
