use std::fmt;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::SourceLine;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::split_lines;

/// Name of the directory holding the sources of every project.
pub const DEFAULT_SOURCE_DIRECTORY: &str = "source";

/// A file addressed by its project directory (relative to the root, `/`
/// separated) and its path inside that project's source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
	pub project: String,
	pub file: String,
}

impl SourceFile {
	pub fn new(project: impl Into<String>, file: impl Into<String>) -> Self {
		Self {
			project: project.into(),
			file: file.into(),
		}
	}

	/// Directory of the file inside its source directory, empty for files at
	/// the top of the source directory.
	pub fn directory(&self) -> &str {
		self.file.rsplit_once('/').map_or("", |(directory, _)| directory)
	}
}

impl fmt::Display for SourceFile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.project, self.file)
	}
}

/// The on-disk layout `<root>/<project>/<source directory>/<file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
	root: PathBuf,
	source_directory: String,
}

impl ProjectLayout {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			source_directory: DEFAULT_SOURCE_DIRECTORY.to_string(),
		}
	}

	#[must_use]
	pub fn with_source_directory(mut self, name: impl Into<String>) -> Self {
		self.source_directory = name.into();
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn source_directory_name(&self) -> &str {
		&self.source_directory
	}

	/// Absolute source directory of `project`.
	pub fn source_directory(&self, project: &str) -> PathBuf {
		let mut path = self.root.clone();
		if !project.is_empty() {
			path.push(project);
		}
		path.push(&self.source_directory);
		path
	}

	pub fn source_path(&self, file: &SourceFile) -> PathBuf {
		self.source_directory(&file.project).join(&file.file)
	}

	pub fn exists(&self, file: &SourceFile) -> bool {
		self.source_path(file).is_file()
	}

	/// Find the project and source-relative path of an entry file. The path
	/// must contain a source directory component below the root.
	pub fn locate(&self, entry: &Path) -> TxtsheetResult<SourceFile> {
		let outside = || {
			TxtsheetError::EntryOutsideSourceTree {
				path: entry.display().to_string(),
			}
		};

		let relative = match entry.strip_prefix(&self.root) {
			Ok(relative) => relative.to_path_buf(),
			Err(_) => {
				let root = normalize(&absolute(&self.root)?);
				let entry = normalize(&absolute(entry)?);
				entry.strip_prefix(&root).map_err(|_| outside())?.to_path_buf()
			}
		};

		let mut parts = Vec::new();
		for component in relative.components() {
			match component {
				Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
				Component::CurDir => {}
				_ => return Err(outside()),
			}
		}

		let Some(index) = parts.iter().position(|part| *part == self.source_directory) else {
			return Err(outside());
		};

		if index + 1 >= parts.len() {
			return Err(outside());
		}

		Ok(SourceFile::new(
			parts[..index].join("/"),
			parts[index + 1..].join("/"),
		))
	}

	/// Read a source file into numbered lines.
	pub fn read_source(&self, file: &SourceFile) -> TxtsheetResult<Vec<SourceLine>> {
		let path = self.source_path(file);
		let content = std::fs::read_to_string(&path).map_err(|e| TxtsheetError::io(&path, e))?;

		Ok(split_lines(&file.project, &file.file, &content))
	}
}

fn absolute(path: &Path) -> TxtsheetResult<PathBuf> {
	std::path::absolute(path).map_err(|e| TxtsheetError::io(path, e))
}

/// Join `name` onto the `/` separated `directory`, resolving `.` and `..`
/// lexically. Climbing above `directory`'s root is an error.
pub fn join_relative(directory: &str, name: &str) -> Result<String, String> {
	let mut parts: Vec<&str> = Vec::new();

	for part in directory.split('/').chain(name.split('/')) {
		match part {
			"" | "." => {}
			".." => {
				if parts.pop().is_none() {
					return Err(format!("`{name}` escapes the source directory"));
				}
			}
			part => parts.push(part),
		}
	}

	if parts.is_empty() {
		return Err(format!("`{name}` does not name a file"));
	}

	Ok(parts.join("/"))
}

/// Lexical path from `base` to `target`. Both paths are made absolute first.
pub fn relative_path(base: &Path, target: &Path) -> TxtsheetResult<PathBuf> {
	let base = normalize(&absolute(base)?);
	let target = normalize(&absolute(target)?);

	let base_components = base.components().collect::<Vec<_>>();
	let target_components = target.components().collect::<Vec<_>>();
	let common = base_components
		.iter()
		.zip(&target_components)
		.take_while(|(a, b)| a == b)
		.count();

	let mut relative = PathBuf::new();
	for _ in common..base_components.len() {
		relative.push("..");
	}
	for component in &target_components[common..] {
		relative.push(component.as_os_str());
	}

	if relative.as_os_str().is_empty() {
		relative.push(".");
	}

	Ok(relative)
}

fn normalize(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				normalized.pop();
			}
			component => normalized.push(component.as_os_str()),
		}
	}

	normalized
}
