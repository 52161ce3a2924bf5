use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::*;

/// A temporary `<root>/<project>/source/<file>` tree.
pub struct ProjectTree {
	dir: TempDir,
}

impl ProjectTree {
	pub fn new() -> Self {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		Self { dir }
	}

	pub fn root(&self) -> &Path {
		self.dir.path()
	}

	/// Write `content` to `<root>/<project>/source/<file>`.
	pub fn source(&self, project: &str, file: &str, content: &str) -> PathBuf {
		self.write(&format!("{project}/source/{file}"), content)
	}

	/// Write `content` to `<root>/<relative>`.
	pub fn write(&self, relative: &str, content: &str) -> PathBuf {
		let path = self.root().join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
		}
		std::fs::write(&path, content).unwrap_or_else(|e| panic!("write: {e}"));
		path
	}

	pub fn layout(&self) -> ProjectLayout {
		ProjectLayout::new(self.root())
	}

	/// Preprocess `<root>/<project>/source/<file>` with no variables.
	pub fn preprocess(&self, project: &str, file: &str, defines: DefineSet) -> TxtsheetResult<Vec<SourceLine>> {
		let layout = self.layout();
		let mut variables = TemplateVariables::new();
		variables.insert(CURRENT_PROJECT_VARIABLE.to_string(), project.to_string());

		Preprocessor::new(&layout).run(&SourceFile::new(project, file), defines, &variables)
	}

	pub fn options(&self) -> CompileOptions {
		CompileOptions {
			root: Some(self.root().to_path_buf()),
			..CompileOptions::default()
		}
	}
}

pub fn defines(names: &[&str]) -> DefineSet {
	names.iter().copied().collect()
}

pub fn source_lines(text: &str) -> Vec<SourceLine> {
	split_lines("app", "main.txt", text)
}

pub fn texts(lines: &[SourceLine]) -> Vec<String> {
	lines.iter().map(|line| line.text.clone()).collect()
}

/// Run comment stripping and directives over in-memory text as
/// `app:main.txt`.
pub fn preprocess_text(text: &str, defined: &[&str]) -> TxtsheetResult<Vec<String>> {
	let layout = ProjectLayout::new(".");
	let file = SourceFile::new("app", "main.txt");
	let lines = strip_comments(source_lines(text));

	Preprocessor::new(&layout)
		.process_lines(&file, lines, defines(defined), &TemplateVariables::new())
		.map(|lines| texts(&lines))
}

pub fn seed_config(yaml: &str) -> SeedConfig {
	let value: serde_yaml_ng::Value =
		serde_yaml_ng::from_str(yaml).unwrap_or_else(|e| panic!("yaml: {e}"));
	let Value::Mapping(mapping) = Value::from(value) else {
		panic!("config fixture must be a mapping");
	};

	SeedConfig::from_mapping(&mapping, Path::new(".")).unwrap_or_else(|e| panic!("config: {e}"))
}

pub fn compile(text: &str) -> TxtsheetResult<Compilation> {
	compile_source(text, &SeedConfig::default(), &DefineSet::new())
}

pub fn compile_with(text: &str, config: &SeedConfig) -> TxtsheetResult<Compilation> {
	compile_source(text, config, &DefineSet::new())
}

/// The first node whose text is `text`.
pub fn find<'a>(document: &'a Document, text: &str) -> &'a Node {
	document
		.iter()
		.map(|(_, node)| node)
		.find(|node| node.text == text)
		.unwrap_or_else(|| panic!("no node with text `{text}`"))
}

pub fn child_texts(document: &Document, id: NodeId) -> Vec<String> {
	document.children(id).map(|node| node.text.clone()).collect()
}

pub fn node_id(document: &Document, text: &str) -> NodeId {
	document
		.iter()
		.find(|(_, node)| node.text == text)
		.map(|(id, _)| id)
		.unwrap_or_else(|| panic!("no node with text `{text}`"))
}

pub fn initial_values(node: &Node) -> Option<Vec<(String, Value)>> {
	node.item()
		.and_then(|item| item.initial_values.as_ref())
		.map(|values| {
			values
				.iter()
				.map(|entry| (entry.column.clone(), entry.value.clone()))
				.collect()
		})
}

pub fn string_values(pairs: &[(&str, &str)]) -> Vec<(String, Value)> {
	pairs
		.iter()
		.map(|(column, value)| ((*column).to_string(), Value::from(*value)))
		.collect()
}
