use std::collections::BTreeMap;
use std::fmt;

use float_cmp::approx_eq;
use serde::Deserialize;
use serde::Serialize;

/// A dynamic configuration or parameter value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Integer(i64),
	Float(f64),
	String(String),
	Sequence(Vec<Value>),
	Mapping(BTreeMap<String, Value>),
}

pub type Mapping = BTreeMap<String, Value>;

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(value), Self::Bool(other_value)) => value == other_value,
			(Self::Integer(value), Self::Integer(other_value)) => value == other_value,
			(Self::Float(value), Self::Float(other_value)) => {
				approx_eq!(f64, *value, *other_value, ulps = 2)
			}
			(Self::String(value), Self::String(other_value)) => value == other_value,
			(Self::Sequence(value), Self::Sequence(other_value)) => value == other_value,
			(Self::Mapping(value), Self::Mapping(other_value)) => value == other_value,
			_ => false,
		}
	}
}

impl Value {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_mapping(&self) -> Option<&Mapping> {
		match self {
			Self::Mapping(mapping) => Some(mapping),
			_ => None,
		}
	}

	pub fn as_sequence(&self) -> Option<&[Value]> {
		match self {
			Self::Sequence(items) => Some(items),
			_ => None,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn is_empty_string(&self) -> bool {
		matches!(self, Self::String(value) if value.is_empty())
	}

	pub fn is_scalar(&self) -> bool {
		!matches!(self, Self::Sequence(_) | Self::Mapping(_))
	}

	/// Text form of a scalar. Sequences and mappings have none.
	pub fn scalar_to_string(&self) -> Option<String> {
		match self {
			Self::Null => Some(String::new()),
			Self::Bool(value) => Some(value.to_string()),
			Self::Integer(value) => Some(value.to_string()),
			Self::Float(value) => Some(value.to_string()),
			Self::String(value) => Some(value.clone()),
			Self::Sequence(_) | Self::Mapping(_) => None,
		}
	}

	/// Recursively merge `other` into `self`. Mappings are unioned key by key;
	/// anything else is replaced by `other`.
	pub fn deep_merge(&mut self, other: Value) {
		match (self, other) {
			(Self::Mapping(target), Self::Mapping(source)) => merge_mappings(target, source),
			(target, other) => *target = other,
		}
	}
}

/// Merge `source` into `target`, with `source` winning on conflicts that are
/// not both mappings.
pub fn merge_mappings(target: &mut Mapping, source: Mapping) {
	for (key, value) in source {
		match target.get_mut(&key) {
			Some(existing) => existing.deep_merge(value),
			None => {
				target.insert(key, value);
			}
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.scalar_to_string() {
			Some(text) => write!(f, "{text}"),
			None => {
				let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
				write!(f, "{json}")
			}
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<Mapping> for Value {
	fn from(value: Mapping) -> Self {
		Self::Mapping(value)
	}
}

impl From<serde_yaml_ng::Value> for Value {
	fn from(value: serde_yaml_ng::Value) -> Self {
		match value {
			serde_yaml_ng::Value::Null => Self::Null,
			serde_yaml_ng::Value::Bool(value) => Self::Bool(value),
			serde_yaml_ng::Value::Number(number) => {
				if let Some(value) = number.as_i64() {
					Self::Integer(value)
				} else {
					number.as_f64().map_or(Self::Null, Self::Float)
				}
			}
			serde_yaml_ng::Value::String(value) => Self::String(value),
			serde_yaml_ng::Value::Sequence(items) => {
				Self::Sequence(items.into_iter().map(Self::from).collect())
			}
			serde_yaml_ng::Value::Mapping(mapping) => {
				Self::Mapping(
					mapping
						.into_iter()
						.map(|(key, value)| (yaml_key(key), Self::from(value)))
						.collect(),
				)
			}
			serde_yaml_ng::Value::Tagged(tagged) => Self::from(tagged.value),
		}
	}
}

/// Mapping keys are always strings; scalar keys keep their text form.
fn yaml_key(key: serde_yaml_ng::Value) -> String {
	match Value::from(key) {
		Value::String(key) => key,
		other => other.to_string(),
	}
}
