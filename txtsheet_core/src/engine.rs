use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::CURRENT_PROJECT_VARIABLE;
use crate::DEFAULT_SOURCE_DIRECTORY;
use crate::DefineSet;
use crate::Document;
use crate::Preprocessor;
use crate::ProjectLayout;
use crate::SeedConfig;
use crate::SourceFile;
use crate::SourceLine;
use crate::TemplateVariables;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::UidRewrites;
use crate::find_config_file;
use crate::parse_lines;
use crate::relative_path;
use crate::resolve_initial_values;
use crate::split_lines;
use crate::strip_comments;

/// File name given to in-memory sources in locations.
pub const INLINE_SOURCE_NAME: &str = "<inline>";

/// Options for compiling an entry file.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
	/// Configuration file to use instead of the one found next to the entry.
	pub config: Option<PathBuf>,
	/// Names defined before the entry file is read.
	pub defines: DefineSet,
	/// Root directory overriding the configured `$rootDirectory`.
	pub root: Option<PathBuf>,
	/// Name of each project's source directory, `source` when unset.
	pub source_directory: Option<String>,
}

/// Everything produced for an entry file.
#[derive(Debug, Clone, Serialize)]
pub struct Compilation {
	/// The preprocessed line stream the tree was built from.
	#[serde(skip)]
	pub lines: Vec<SourceLine>,
	#[serde(rename = "tree")]
	pub document: Document,
	pub rewrites: UidRewrites,
}

/// Load the configuration for `entry`: the explicit file when given,
/// otherwise `<stem>_conf.yml` or `conf.yml` next to the entry. Without
/// either the configuration is empty.
pub fn load_config(entry: &Path, options: &CompileOptions) -> TxtsheetResult<SeedConfig> {
	let path = options.config.clone().or_else(|| find_config_file(entry));

	match path {
		Some(path) => {
			debug!(path = %path.display(), "loading configuration");
			SeedConfig::load(&path)
		}
		None => {
			debug!(entry = %entry.display(), "no configuration file found");
			Ok(SeedConfig::default())
		}
	}
}

struct Prepared {
	config: SeedConfig,
	layout: ProjectLayout,
	entry: SourceFile,
}

fn prepare(entry: &Path, options: &CompileOptions) -> TxtsheetResult<Prepared> {
	let config = load_config(entry, options)?;
	let root = options
		.root
		.clone()
		.or_else(|| config.root_directory.clone())
		.ok_or_else(|| {
			TxtsheetError::Config(
				"no root directory: set `$rootDirectory` or pass a root explicitly".to_string(),
			)
		})?;

	let layout = ProjectLayout::new(root).with_source_directory(
		options
			.source_directory
			.as_deref()
			.unwrap_or(DEFAULT_SOURCE_DIRECTORY),
	);
	let entry = layout.locate(entry)?;

	Ok(Prepared {
		config,
		layout,
		entry,
	})
}

fn top_level_variables(config: &SeedConfig, entry: &SourceFile) -> TemplateVariables {
	let mut variables = config.template_variables();
	variables.insert(CURRENT_PROJECT_VARIABLE.to_string(), entry.project.clone());
	variables
}

/// Run comment stripping, directives and includes over an entry file.
pub fn preprocess_file(entry: &Path, options: &CompileOptions) -> TxtsheetResult<Vec<SourceLine>> {
	let Prepared {
		config,
		layout,
		entry: file,
	} = prepare(entry, options)?;

	let variables = top_level_variables(&config, &file);
	Preprocessor::new(&layout).run(&file, options.defines.clone(), &variables)
}

/// Compile an entry file located at `<root>/<project>/<source>/<path>` into
/// its document tree and uid rewrites.
pub fn compile_file(entry: &Path, options: &CompileOptions) -> TxtsheetResult<Compilation> {
	let Prepared {
		mut config,
		layout,
		entry: file,
	} = prepare(entry, options)?;

	info!(entry = %file, root = %layout.root().display(), "compiling");

	let variables = top_level_variables(&config, &file);
	let lines = Preprocessor::new(&layout).run(&file, options.defines.clone(), &variables)?;

	let entry_directory = entry.parent().unwrap_or_else(|| Path::new(""));
	let root_directory = relative_path(entry_directory, layout.root())?;
	config.settings.root_directory = Some(root_directory.to_string_lossy().replace('\\', "/"));

	build(lines, &config)
}

/// Compile in-memory text. Includes resolve against the configured root
/// directory, or the current directory.
pub fn compile_source(
	source: &str,
	config: &SeedConfig,
	defines: &DefineSet,
) -> TxtsheetResult<Compilation> {
	let root = config
		.root_directory
		.clone()
		.unwrap_or_else(|| PathBuf::from("."));
	let layout = ProjectLayout::new(root);
	let file = SourceFile::new("", INLINE_SOURCE_NAME);
	let variables = top_level_variables(config, &file);

	let lines = strip_comments(split_lines(&file.project, &file.file, source));
	let lines = Preprocessor::new(&layout).process_lines(&file, lines, defines.clone(), &variables)?;

	build(lines, config)
}

fn build(lines: Vec<SourceLine>, config: &SeedConfig) -> TxtsheetResult<Compilation> {
	let output = parse_lines(&lines, config)?;
	let mut document = output.document;
	resolve_initial_values(&mut document)?;

	debug!(lines = lines.len(), nodes = document.len(), "compiled");

	Ok(Compilation {
		lines,
		document,
		rewrites: output.rewrites,
	})
}
