use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The origin of a line: the project directory (relative to the root), the
/// file path (relative to that project's source directory) and the 1-indexed
/// line number in the original file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
	pub project_directory: String,
	pub file_path: String,
	pub line_number: usize,
}

impl SourceLocation {
	pub fn new(
		project_directory: impl Into<String>,
		file_path: impl Into<String>,
		line_number: usize,
	) -> Self {
		Self {
			project_directory: project_directory.into(),
			file_path: file_path.into(),
			line_number,
		}
	}

	/// The `project:file` key used to group per-file output such as uid
	/// rewrites.
	pub fn file_key(&self) -> String {
		format!("{}:{}", self.project_directory, self.file_path)
	}
}

impl fmt::Display for SourceLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.project_directory.is_empty() {
			write!(f, "{}:{}", self.file_path, self.line_number)
		} else {
			write!(
				f,
				"{}:{}:{}",
				self.project_directory, self.file_path, self.line_number
			)
		}
	}
}

/// A single line of the annotated stream shared by the preprocessor and the
/// document parser. Stream order is document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLine {
	#[serde(flatten)]
	pub location: SourceLocation,
	pub text: String,
}

impl SourceLine {
	pub fn new(location: SourceLocation, text: impl Into<String>) -> Self {
		Self {
			location,
			text: text.into(),
		}
	}

	/// Same origin, different text.
	pub fn with_text(&self, text: impl Into<String>) -> Self {
		Self {
			location: self.location.clone(),
			text: text.into(),
		}
	}
}

/// Split file content into numbered source lines. A leading byte order mark
/// is dropped and both `\n` and `\r\n` endings are accepted.
pub fn split_lines(project_directory: &str, file_path: &str, content: &str) -> Vec<SourceLine> {
	let content = content.strip_prefix('\u{feff}').unwrap_or(content);

	content
		.lines()
		.enumerate()
		.map(|(index, text)| {
			SourceLine::new(
				SourceLocation::new(project_directory, file_path, index + 1),
				text,
			)
		})
		.collect()
}
