use std::collections::HashSet;
use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::McError;
use crate::McResult;
use crate::config::OriginFingerprint;

/// The semantic type tag attached to a component prop. Tags outside this set
/// are rejected while parsing metadata; a missing tag maps to [`Unknown`].
///
/// [`Unknown`]: PropType::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum PropType {
	String,
	Number,
	Boolean,
	Enum,
	Unknown,
}

impl PropType {
	/// Parse a raw type tag, case-insensitively. Returns `None` for tags
	/// outside the recognized set.
	pub fn from_tag(tag: &str) -> Option<Self> {
		match tag.to_ascii_lowercase().as_str() {
			"string" => Some(Self::String),
			"number" => Some(Self::Number),
			"boolean" => Some(Self::Boolean),
			"enum" => Some(Self::Enum),
			"unknown" => Some(Self::Unknown),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::String => "string",
			Self::Number => "number",
			Self::Boolean => "boolean",
			Self::Enum => "enum",
			Self::Unknown => "unknown",
		}
	}
}

impl fmt::Display for PropType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single prop declared by a component. Order of construction is
/// preserved by [`ComponentDescriptor::props`] and drives completion
/// ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropDescriptor {
	/// The prop name, unique within its owning component.
	pub name: String,
	/// The semantic type tag.
	pub prop_type: PropType,
	/// Default value carried by the metadata, used to pre-fill insertions.
	pub default: Option<Value>,
	/// Whether the component requires this prop.
	pub required: bool,
	pub description: Option<String>,
}

impl PropDescriptor {
	/// Human-readable type hint shown next to the completion label, e.g.
	/// `enum (required)`.
	pub fn type_hint(&self) -> String {
		if self.required {
			format!("{} (required)", self.prop_type)
		} else {
			self.prop_type.to_string()
		}
	}

	/// The default value rendered as a bare literal suitable for insertion,
	/// or `None` when there is no usable default.
	pub fn default_literal(&self) -> Option<String> {
		match self.default.as_ref()? {
			Value::Null => None,
			Value::String(text) => Some(text.clone()),
			other => Some(other.to_string()),
		}
	}
}

/// A component known to the catalog: its tag name, its ordered props, and an
/// optional description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
	/// The tag name written after the colon run, unique within a catalog.
	pub name: String,
	pub description: Option<String>,
	/// Props in declaration order.
	pub props: Vec<PropDescriptor>,
}

impl ComponentDescriptor {
	pub fn prop(&self, name: &str) -> Option<&PropDescriptor> {
		self.props.iter().find(|prop| prop.name == name)
	}
}

/// An immutable catalog published by the cache. A fetch always produces a
/// fresh snapshot; nothing ever mutates one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataSnapshot {
	/// Components in catalog order (insertion order of the origin payload).
	pub components: Vec<ComponentDescriptor>,
	/// Strictly increasing across published snapshots; 1 is the first.
	pub generation: u64,
	/// The origin this snapshot was fetched against.
	pub fingerprint: OriginFingerprint,
	pub fetched_at_unix_ms: u64,
}

impl MetadataSnapshot {
	pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
		self.components.iter().find(|entry| entry.name == name)
	}

	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	pub fn len(&self) -> usize {
		self.components.len()
	}
}

pub(crate) fn now_unix_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_or(0, |duration| {
			duration.as_millis().try_into().unwrap_or(u64::MAX)
		})
}

// ---- Payload parsing ----

/// Raw payload shapes accepted from an origin. Component introspection
/// servers emit an object keyed by component name; hand-maintained files
/// tend to be arrays.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCatalog {
	List(Vec<RawComponent>),
	Map(serde_json::Map<String, Value>),
}

#[derive(Debug, Deserialize)]
struct RawComponent {
	name: String,
	#[serde(flatten)]
	body: RawComponentBody,
}

#[derive(Debug, Deserialize)]
struct RawComponentBody {
	#[serde(default)]
	description: Option<String>,
	#[serde(default)]
	props: Vec<RawProp>,
}

#[derive(Debug, Deserialize)]
struct RawProp {
	name: String,
	#[serde(rename = "type", default)]
	type_tag: Option<String>,
	#[serde(default)]
	default: Option<Value>,
	#[serde(default)]
	required: bool,
	#[serde(default)]
	description: Option<String>,
}

/// Accumulates components across one or more payloads (a catalog may be
/// assembled from several local files) while rejecting duplicate names.
#[derive(Debug, Default)]
pub(crate) struct CatalogBuilder {
	components: Vec<ComponentDescriptor>,
	seen: HashSet<String>,
}

impl CatalogBuilder {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn push(&mut self, origin: &str, component: ComponentDescriptor) -> McResult<()> {
		if !self.seen.insert(component.name.clone()) {
			return Err(McError::DuplicateComponent {
				name: component.name,
				origin: origin.to_string(),
			});
		}

		self.components.push(component);
		Ok(())
	}

	pub(crate) fn finish(self) -> Vec<ComponentDescriptor> {
		self.components
	}
}

/// Parse one metadata payload into the builder. `origin` labels errors with
/// the file path or URL the payload came from.
pub(crate) fn parse_catalog_into(
	builder: &mut CatalogBuilder,
	origin: &str,
	payload: &str,
) -> McResult<()> {
	let raw: RawCatalog = serde_json::from_str(payload).map_err(|error| McError::Parse {
		origin: origin.to_string(),
		reason: error.to_string(),
	})?;

	match raw {
		RawCatalog::List(entries) => {
			for entry in entries {
				let component = convert_component(origin, entry.name, entry.body)?;
				builder.push(origin, component)?;
			}
		}
		RawCatalog::Map(entries) => {
			// Map keys are authoritative even when the body repeats a
			// `name` field.
			for (name, value) in entries {
				let body: RawComponentBody =
					serde_json::from_value(value).map_err(|error| McError::Parse {
						origin: origin.to_string(),
						reason: format!("component `{name}`: {error}"),
					})?;
				let component = convert_component(origin, name, body)?;
				builder.push(origin, component)?;
			}
		}
	}

	Ok(())
}

/// Parse a standalone metadata payload into a component list.
pub fn parse_catalog(origin: &str, payload: &str) -> McResult<Vec<ComponentDescriptor>> {
	let mut builder = CatalogBuilder::new();
	parse_catalog_into(&mut builder, origin, payload)?;
	Ok(builder.finish())
}

fn convert_component(
	origin: &str,
	name: String,
	body: RawComponentBody,
) -> McResult<ComponentDescriptor> {
	if name.trim().is_empty() {
		return Err(McError::Parse {
			origin: origin.to_string(),
			reason: "component with empty name".to_string(),
		});
	}

	let mut props = Vec::with_capacity(body.props.len());
	let mut seen = HashSet::new();

	for raw in body.props {
		if !seen.insert(raw.name.clone()) {
			return Err(McError::DuplicateProp {
				component: name,
				name: raw.name,
			});
		}

		let prop_type = match raw.type_tag {
			None => PropType::Unknown,
			Some(tag) => {
				let Some(parsed) = PropType::from_tag(&tag) else {
					return Err(McError::UnknownPropType {
						component: name,
						prop: raw.name,
						type_tag: tag,
					});
				};
				parsed
			}
		};

		props.push(PropDescriptor {
			name: raw.name,
			prop_type,
			default: raw.default.filter(|value| !value.is_null()),
			required: raw.required,
			description: raw.description,
		});
	}

	Ok(ComponentDescriptor {
		name,
		description: body.description,
		props,
	})
}
