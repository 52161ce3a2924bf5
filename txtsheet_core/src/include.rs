use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ProjectLayout;
use crate::SourceFile;
use crate::SourceLocation;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::join_relative;
use crate::lexer::parse_params;

/// Variables available to `{{=KEY}}` placeholders of include lines.
pub type TemplateVariables = BTreeMap<String, String>;

/// Injected into the variables of every inclusion, naming the project of the
/// included file.
pub const CURRENT_PROJECT_VARIABLE: &str = "$currentProjectDirectory";

static INCLUDE_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^<<\[\s*(.+)\s*\]\s*(\((.+)?\))?$").unwrap());

pub(crate) static PLACEHOLDER_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\{\{=\s*([\w$]+)\s*\}\}").unwrap());

static INCLUDE_PATH_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^((/)?([^:]+):)?(\./)?(.+)$").unwrap());

/// A `<<[path](params)` line before placeholder substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeDirective<'a> {
	pub path: &'a str,
	pub params: Option<&'a str>,
}

impl<'a> IncludeDirective<'a> {
	pub fn parse(text: &'a str) -> Option<Self> {
		let captures = INCLUDE_REGEX.captures(text)?;
		let path = captures.get(1)?.as_str().trim();
		let params = captures.get(3).map(|m| m.as_str());

		Some(Self { path, params })
	}
}

/// Replace every `{{=KEY}}` placeholder of `text`.
pub fn substitute_variables(
	text: &str,
	variables: &TemplateVariables,
	location: &SourceLocation,
) -> TxtsheetResult<String> {
	let mut result = String::with_capacity(text.len());
	let mut last = 0;

	for captures in PLACEHOLDER_REGEX.captures_iter(text) {
		let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
			continue;
		};

		let Some(value) = variables.get(key.as_str()) else {
			return Err(TxtsheetError::VariableNotFound {
				key: key.as_str().to_string(),
				location: location.clone(),
			});
		};

		result.push_str(&text[last..whole.start()]);
		result.push_str(value);
		last = whole.end();
	}

	result.push_str(&text[last..]);
	Ok(result)
}

/// The target of an include line after substitution.
///
/// - `name` lives in the current project's source directory
/// - `./name` is relative to the including file
/// - `project:name` names another project, searched from the root first
/// - `/project:name` is only searched under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludePath {
	pub project: Option<String>,
	pub root_only: bool,
	pub relative: bool,
	pub name: String,
}

impl IncludePath {
	pub fn parse(text: &str) -> Result<Self, String> {
		let captures = INCLUDE_PATH_REGEX
			.captures(text)
			.ok_or_else(|| "the path is empty".to_string())?;

		let project = captures.get(3).map(|m| m.as_str().trim().to_string());
		let root_only = captures.get(2).is_some();
		let relative = captures.get(4).is_some();
		let name = captures.get(5).map_or("", |m| m.as_str()).trim().to_string();

		if relative && project.is_some() {
			return Err("a `./` path cannot name a project".to_string());
		}

		if project.is_none() && name.starts_with('/') {
			return Err("a leading `/` must be followed by `project:`".to_string());
		}

		Ok(Self {
			project,
			root_only,
			relative,
			name,
		})
	}

	/// Resolve against the including file. A missing target is an error.
	pub fn resolve(
		&self,
		current: &SourceFile,
		layout: &ProjectLayout,
		location: &SourceLocation,
	) -> TxtsheetResult<SourceFile> {
		let invalid = |reason: String| {
			TxtsheetError::InvalidIncludePath {
				path: self.to_string(),
				reason,
				location: location.clone(),
			}
		};

		let directory = if self.relative { current.directory() } else { "" };
		let file = join_relative(directory, &self.name).map_err(invalid)?;
		let project = self.project.as_deref().unwrap_or(&current.project);
		let target = SourceFile::new(project, file);

		if layout.exists(&target) {
			return Ok(target);
		}

		if self.project.is_some() && !self.root_only {
			return Err(TxtsheetError::NotImplemented {
				feature: format!("include search path lookup for `{self}`"),
				location: location.clone(),
			});
		}

		Err(TxtsheetError::IncludeNotFound {
			source_directory: layout
				.source_directory(&target.project)
				.display()
				.to_string(),
			file_name: target.file,
			location: location.clone(),
		})
	}
}

impl std::fmt::Display for IncludePath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if let Some(project) = &self.project {
			if self.root_only {
				write!(f, "/")?;
			}
			write!(f, "{project}:")?;
		}
		if self.relative {
			write!(f, "./")?;
		}
		write!(f, "{}", self.name)
	}
}

/// Parse the parameter literal of an include line after substitution.
pub fn parse_include_params(
	params: &str,
	location: &SourceLocation,
) -> TxtsheetResult<BTreeMap<String, String>> {
	parse_params(params).map_err(|reason| {
		TxtsheetError::InvalidIncludeParams {
			params: params.to_string(),
			reason,
			location: location.clone(),
		}
	})
}

/// Variables seen by an included file: a copy of the includer's variables
/// overlaid with the include parameters and the target project.
pub fn include_variables(
	parent: &TemplateVariables,
	params: BTreeMap<String, String>,
	target: &SourceFile,
) -> TemplateVariables {
	let mut variables = parent.clone();
	variables.extend(params);
	variables.insert(CURRENT_PROJECT_VARIABLE.to_string(), target.project.clone());
	variables
}
