use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Compile outline documents into sheet trees.",
	long_about = "txtsheet compiles a lightweight outline language (headings, indented list \
	              items and fenced yaml parameters) into a JSON document tree ready for \
	              spreadsheet rendering.\n\nSources live at `<root>/<project>/source/<path>` \
	              and may use conditional directives (`@if`, `@define`, ...) and includes \
	              (`<<[project:path](key:\"value\")`).\n\nQuick start:\n  txtsheet build \
	              app/source/main.txt       Write main.json next to the input\n  txtsheet \
	              preprocess app/source/main.txt  Write the surviving lines only"
)]
pub struct TxtsheetCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Configuration file to use instead of `<stem>_conf.yml` or `conf.yml`
	/// next to the input.
	#[arg(long, short, global = true)]
	pub config: Option<PathBuf>,

	/// Root directory holding the project directories. Overrides the
	/// configured `$rootDirectory`.
	#[arg(long, short, global = true)]
	pub root: Option<PathBuf>,

	/// Name of each project's source directory.
	#[arg(long, global = true, default_value = "source")]
	pub source_directory: String,

	/// Define a name before the input is read. Repeat for several names.
	#[arg(long = "define", short = 'D', global = true, value_name = "NAME")]
	pub defines: Vec<String>,

	/// Where to write the JSON output. Use `-` for stdout.
	#[arg(long, short, global = true)]
	pub output: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Compile an entry file into its document tree.
	///
	/// Runs comment stripping, conditional directives and includes, builds
	/// the tree and resolves the initial values of every leaf item. Writes
	/// `{ "tree": ..., "rewrites": ... }` to `<stem>.json` next to the input
	/// unless `--output` is given. `rewrites` lists the headings and items
	/// that have no `[#id]` yet, grouped by `project:file`.
	Build {
		/// Entry file, located at `<root>/<project>/source/<path>`.
		file: PathBuf,
	},
	/// Run comment stripping, directives and includes only.
	///
	/// Writes the surviving lines, each with its project, file and line
	/// number, to `<stem>_preprocessed.json` next to the input unless
	/// `--output` is given.
	Preprocess {
		/// Entry file, located at `<root>/<project>/source/<path>`.
		file: PathBuf,
	},
}
