use miette::Diagnostic;
use thiserror::Error;

/// Errors produced while resolving, fetching, or parsing component
/// metadata. Every variant carries owned strings so values can be cloned
/// into [`CacheState`](crate::cache::MetadataCache) and handed back out to
/// callers asking for the last recorded failure.
#[derive(Clone, Debug, Diagnostic, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum McError {
	#[error("failed to fetch component metadata from `{origin}`: {reason}")]
	#[diagnostic(
		code(mdcc::fetch_failed),
		help("check that the metadata origin is reachable and responds with JSON")
	)]
	Fetch { origin: String, reason: String },

	#[error("fetching component metadata from `{origin}` exceeded {timeout_ms}ms")]
	#[diagnostic(
		code(mdcc::fetch_timeout),
		help("the origin may be slow or unreachable; retry or switch to a local file pattern")
	)]
	Timeout { origin: String, timeout_ms: u64 },

	#[error("failed to parse component metadata from `{origin}`: {reason}")]
	#[diagnostic(
		code(mdcc::parse_failed),
		help("metadata must be a JSON array of components or an object keyed by component name")
	)]
	Parse { origin: String, reason: String },

	#[error("duplicate component `{name}` in metadata from `{origin}`")]
	#[diagnostic(
		code(mdcc::duplicate_component),
		help("component names must be unique across the whole catalog")
	)]
	DuplicateComponent { name: String, origin: String },

	#[error("duplicate prop `{name}` on component `{component}`")]
	#[diagnostic(code(mdcc::duplicate_prop))]
	DuplicateProp { component: String, name: String },

	#[error("unrecognized type tag `{type_tag}` for prop `{prop}` on component `{component}`")]
	#[diagnostic(
		code(mdcc::unknown_prop_type),
		help("supported type tags: string, number, boolean, enum, unknown")
	)]
	UnknownPropType {
		component: String,
		prop: String,
		type_tag: String,
	},

	#[error("invalid metadata file pattern `{pattern}`: {reason}")]
	#[diagnostic(
		code(mdcc::invalid_pattern),
		help("the local file pattern must be a valid glob, e.g. `components/**/*.json`")
	)]
	InvalidPattern { pattern: String, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(mdcc::config_parse),
		help("check that mdcc.toml is valid TOML with a [metadata] section")
	)]
	ConfigParse(String),
}

/// The three-way failure classification used when reporting refresh
/// outcomes. The cache treats every class identically (keep the previous
/// snapshot, record the error); the class only shapes log and notification
/// text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshFailure {
	Fetch,
	Parse,
	Timeout,
}

impl RefreshFailure {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fetch => "fetch error",
			Self::Parse => "parse error",
			Self::Timeout => "timeout",
		}
	}
}

impl McError {
	/// Collapse this error onto the refresh failure taxonomy.
	pub fn kind(&self) -> RefreshFailure {
		match self {
			Self::Fetch { .. } | Self::InvalidPattern { .. } => RefreshFailure::Fetch,
			Self::Timeout { .. } => RefreshFailure::Timeout,
			Self::Parse { .. }
			| Self::DuplicateComponent { .. }
			| Self::DuplicateProp { .. }
			| Self::UnknownPropType { .. }
			| Self::ConfigParse(_) => RefreshFailure::Parse,
		}
	}
}

pub type McResult<T> = Result<T, McError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
