use std::path::Path;
use std::path::PathBuf;

use regex::Regex;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::Mapping;
use crate::TemplateVariables;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::Value;
use crate::include::PLACEHOLDER_REGEX;

/// Shared configuration file looked up next to the entry file.
pub const CONFIG_FILE_NAME: &str = "conf.yml";

/// Suffix of the per-entry configuration file, `<stem>_conf.yml`, which takes
/// precedence over [`CONFIG_FILE_NAME`].
pub const ENTRY_CONFIG_SUFFIX: &str = "_conf.yml";

/// Keys holding other configuration files merged into the one being read.
pub const INCLUDE_KEY: &str = "$include";

/// Keys that need a script engine. They are reported and dropped.
pub const SCRIPT_KEYS: [&str; 2] = ["$functions", "$post_process"];

/// Passes over the top level values before templates that keep expanding are
/// reported as circular.
const MAX_TEMPLATE_PASSES: usize = 16;

/// Find the configuration file for `entry`: `<stem>_conf.yml` first, then
/// `conf.yml`, both in the entry's directory.
pub fn find_config_file(entry: &Path) -> Option<PathBuf> {
	let directory = entry.parent().unwrap_or_else(|| Path::new(""));
	let stem = entry.file_stem()?.to_string_lossy();

	[format!("{stem}{ENTRY_CONFIG_SUFFIX}"), CONFIG_FILE_NAME.to_string()]
		.into_iter()
		.map(|name| directory.join(name))
		.find(|path| path.is_file())
}

/// Read a YAML configuration file, merging the files listed under `$include`
/// recursively. Keys already present win over included ones. `{{= key }}`
/// templates in string values are expanded against the merged top level.
pub fn read_config_file(path: &Path) -> TxtsheetResult<Mapping> {
	let mut chain = Vec::new();
	let mut data = read_config_recursive(path, &mut chain)?;
	expand_config_templates(&mut data)?;

	Ok(data)
}

fn is_template(value: &str) -> bool {
	value.contains("{{") && value.contains("}}")
}

/// Replace every `{{= key }}` of `template` with the scalar value of `key` in
/// `scope`. Any other `{{ ... }}` form is rejected.
pub fn expand_template(template: &str, scope: &Mapping) -> TxtsheetResult<String> {
	if PLACEHOLDER_REGEX.replace_all(template, "").contains("{{") {
		return Err(TxtsheetError::Config(format!(
			"`{template}` uses a template form other than `{{{{= key }}}}`"
		)));
	}

	let mut result = String::with_capacity(template.len());
	let mut last = 0;

	for captures in PLACEHOLDER_REGEX.captures_iter(template) {
		let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
			continue;
		};

		let Some(value) = scope.get(key.as_str()).and_then(Value::scalar_to_string) else {
			return Err(TxtsheetError::Config(format!(
				"template `{template}` refers to `{}`, which is not a top level value",
				key.as_str()
			)));
		};

		result.push_str(&template[last..whole.start()]);
		result.push_str(&value);
		last = whole.end();
	}

	result.push_str(&template[last..]);
	Ok(result)
}

/// Expand the top level string values until none changes, then every string
/// nested in mappings and lists against the expanded top level.
pub fn expand_config_templates(data: &mut Mapping) -> TxtsheetResult<()> {
	for _ in 0..MAX_TEMPLATE_PASSES {
		let mut modified = false;
		let keys: Vec<String> = data.keys().cloned().collect();

		for key in keys {
			let Some(Value::String(template)) = data.get(&key) else {
				continue;
			};

			if !is_template(template) {
				continue;
			}

			let expanded = expand_template(template, data)?;
			debug!(key = %key, value = %expanded, "expanded configuration template");
			data.insert(key, Value::String(expanded));
			modified = true;
		}

		if !modified {
			let scope = data.clone();
			for value in data.values_mut() {
				expand_nested_templates(value, &scope)?;
			}

			return Ok(());
		}
	}

	Err(TxtsheetError::Config(
		"configuration templates keep expanding, a value probably refers to itself".to_string(),
	))
}

fn expand_nested_templates(value: &mut Value, scope: &Mapping) -> TxtsheetResult<()> {
	match value {
		Value::Mapping(mapping) => {
			for child in mapping.values_mut() {
				expand_nested_templates(child, scope)?;
			}
		}
		Value::Sequence(items) => {
			for item in items {
				expand_nested_templates(item, scope)?;
			}
		}
		Value::String(text) if is_template(text) => {
			*text = expand_template(text, scope)?;
		}
		_ => {}
	}

	Ok(())
}

fn read_config_recursive(path: &Path, chain: &mut Vec<PathBuf>) -> TxtsheetResult<Mapping> {
	if chain.iter().any(|visited| visited == path) {
		return Err(TxtsheetError::Config(format!(
			"`{}` includes itself",
			path.display()
		)));
	}

	let mut data = read_yaml_mapping(path)?;

	for key in SCRIPT_KEYS {
		if data.remove(key).is_some() {
			warn!(path = %path.display(), key, "ignoring configuration key that requires scripting");
		}
	}

	let Some(includes) = data.remove(INCLUDE_KEY) else {
		return Ok(data);
	};

	let includes = match includes {
		Value::Null => Vec::new(),
		Value::String(file) => vec![Value::String(file)],
		Value::Sequence(files) => files,
		_ => {
			return Err(TxtsheetError::Config(format!(
				"`{INCLUDE_KEY}` in `{}` must be a list of file names",
				path.display()
			)));
		}
	};

	let directory = path.parent().unwrap_or_else(|| Path::new(""));
	chain.push(path.to_path_buf());

	for include in includes {
		let Some(name) = include.as_str() else {
			return Err(TxtsheetError::Config(format!(
				"`{INCLUDE_KEY}` in `{}` must only contain file names",
				path.display()
			)));
		};

		let included_path = directory.join(name);
		debug!(path = %included_path.display(), "including configuration file");
		let included = read_config_recursive(&included_path, chain)?;

		for (key, value) in included {
			data.entry(key).or_insert(value);
		}
	}

	chain.pop();

	Ok(data)
}

fn read_yaml_mapping(path: &Path) -> TxtsheetResult<Mapping> {
	let content = std::fs::read_to_string(path).map_err(|e| TxtsheetError::io(path, e))?;
	let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(&content)
		.map_err(|e| TxtsheetError::Config(format!("`{}`: {e}", path.display())))?;

	match Value::from(yaml) {
		Value::Null => Ok(Mapping::new()),
		Value::Mapping(mapping) => Ok(mapping),
		_ => {
			Err(TxtsheetError::Config(format!(
				"`{}` must contain a mapping at the top level",
				path.display()
			)))
		}
	}
}

/// A conditional rule: when the pattern matches an item's text, the values
/// fill that item's unset columns.
#[derive(Debug, Clone)]
pub struct ColumnRule {
	pub pattern: Regex,
	pub values: Mapping,
}

/// Column settings of the root (`$input`) or of a top level section (the
/// `$input` key of its yaml parameters).
#[derive(Debug, Clone, Default)]
pub struct ColumnSettings {
	pub order: Vec<String>,
	pub default_values: Mapping,
	pub rules: Vec<ColumnRule>,
}

impl ColumnSettings {
	/// Read `{ order, defaultValues, rules: [{ condition, values }] }`. The
	/// error is a reason without location.
	pub fn from_value(value: &Value) -> Result<Self, String> {
		let mapping = match value {
			Value::Null => return Ok(Self::default()),
			Value::Mapping(mapping) => mapping,
			_ => return Err("expected a mapping".to_string()),
		};

		let order = match mapping.get("order") {
			None | Some(Value::Null) => Vec::new(),
			Some(Value::Sequence(items)) => {
				items
					.iter()
					.map(|item| {
						item.scalar_to_string()
							.ok_or_else(|| "`order` must only contain column names".to_string())
					})
					.collect::<Result<Vec<_>, _>>()?
			}
			Some(_) => return Err("`order` must be a list of column names".to_string()),
		};

		let default_values = match mapping.get("defaultValues") {
			None | Some(Value::Null) => Mapping::new(),
			Some(Value::Mapping(values)) => values.clone(),
			Some(_) => return Err("`defaultValues` must be a mapping".to_string()),
		};

		let rules = match mapping.get("rules") {
			None | Some(Value::Null) => Vec::new(),
			Some(Value::Sequence(rules)) => {
				rules
					.iter()
					.enumerate()
					.map(|(index, rule)| column_rule(index, rule))
					.collect::<Result<Vec<_>, _>>()?
			}
			Some(_) => return Err("`rules` must be a list".to_string()),
		};

		Ok(Self {
			order,
			default_values,
			rules,
		})
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty() && self.default_values.is_empty() && self.rules.is_empty()
	}
}

fn column_rule(index: usize, rule: &Value) -> Result<ColumnRule, String> {
	let Some(rule) = rule.as_mapping() else {
		return Err(format!("rule {index} must be a mapping"));
	};

	let Some(condition) = rule.get("condition").and_then(Value::scalar_to_string) else {
		return Err(format!("rule {index} is missing its `condition`"));
	};

	let pattern = Regex::new(&condition)
		.map_err(|e| format!("rule {index} has an invalid condition `{condition}`: {e}"))?;

	let values = match rule.get("values") {
		None | Some(Value::Null) => Mapping::new(),
		Some(Value::Mapping(values)) => values.clone(),
		Some(_) => return Err(format!("`values` of rule {index} must be a mapping")),
	};

	Ok(ColumnRule { pattern, values })
}

/// Configuration scalars copied onto the root node unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSettings {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub template_filename: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ignore_column_id: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output_filename: Option<Value>,
	/// Read from `$projectId`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub project: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub index_sheetname: Option<Value>,
	/// The root directory relative to the entry file's directory.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub root_directory: Option<String>,
}

/// The validated seed configuration handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct SeedConfig {
	/// Absolute, or relative to the current directory.
	pub root_directory: Option<PathBuf>,
	pub template_values: Mapping,
	pub input: ColumnSettings,
	pub settings: RootSettings,
}

impl SeedConfig {
	/// Validate a configuration mapping. A relative `$rootDirectory` is
	/// resolved against `base_directory`.
	pub fn from_mapping(mapping: &Mapping, base_directory: &Path) -> TxtsheetResult<Self> {
		let root_directory = match mapping.get("$rootDirectory") {
			None | Some(Value::Null) => None,
			Some(Value::String(directory)) => Some(base_directory.join(directory)),
			Some(_) => {
				return Err(TxtsheetError::Config(
					"`$rootDirectory` must be a string".to_string(),
				));
			}
		};

		let template_values = match mapping.get("$templateValues") {
			None | Some(Value::Null) => Mapping::new(),
			Some(Value::Mapping(values)) => values.clone(),
			Some(_) => {
				return Err(TxtsheetError::Config(
					"`$templateValues` must be a mapping".to_string(),
				));
			}
		};

		let input = ColumnSettings::from_value(mapping.get("$input").unwrap_or(&Value::Null))
			.map_err(|reason| TxtsheetError::Config(format!("`$input`: {reason}")))?;

		let settings = RootSettings {
			template_filename: passthrough(mapping, "$templateFilename")?,
			ignore_column_id: passthrough(mapping, "$ignoreColumnId")?,
			output_filename: passthrough(mapping, "$outputFilename")?,
			project: passthrough(mapping, "$projectId")?,
			index_sheetname: passthrough(mapping, "$indexSheetname")?,
			root_directory: None,
		};

		Ok(Self {
			root_directory,
			template_values,
			input,
			settings,
		})
	}

	/// Read and validate a configuration file.
	pub fn load(path: &Path) -> TxtsheetResult<Self> {
		let mapping = read_config_file(path)?;
		let base_directory = path.parent().unwrap_or_else(|| Path::new(""));

		Self::from_mapping(&mapping, base_directory)
	}

	/// Top level template variables: every scalar of `$templateValues`.
	pub fn template_variables(&self) -> TemplateVariables {
		self.template_values
			.iter()
			.filter_map(|(key, value)| {
				if value.is_null() {
					return None;
				}
				value.scalar_to_string().map(|text| (key.clone(), text))
			})
			.collect()
	}
}

fn passthrough(mapping: &Mapping, key: &str) -> TxtsheetResult<Option<Value>> {
	match mapping.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(value) if value.is_scalar() => Ok(Some(value.clone())),
		Some(_) => Err(TxtsheetError::Config(format!("`{key}` must be a scalar"))),
	}
}
