use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use txtsheet_cli::Commands;
use txtsheet_cli::TxtsheetCli;
use txtsheet_core::AnyEmptyResult;
use txtsheet_core::AnyResult;
use txtsheet_core::CompileOptions;
use txtsheet_core::TxtsheetError;
use txtsheet_core::compile_file;
use txtsheet_core::preprocess_file;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "TXTSHEET_LOG";

/// Output path meaning stdout.
const STDOUT_PATH: &str = "-";

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = TxtsheetCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Build { file }) => run_build(&args, file),
		Some(Commands::Preprocess { file }) => run_preprocess(&args, file),
		None => {
			eprintln!("No subcommand specified. Run `txtsheet --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<TxtsheetError>() {
			Ok(txtsheet_err) => {
				let report: miette::Report = (*txtsheet_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

fn compile_options(args: &TxtsheetCli) -> CompileOptions {
	CompileOptions {
		config: args.config.clone(),
		defines: args.defines.iter().map(String::as_str).collect(),
		root: args.root.clone(),
		source_directory: Some(args.source_directory.clone()),
	}
}

/// `<dir>/<stem><suffix>` for the input `file`.
fn default_output(file: &Path, suffix: &str) -> PathBuf {
	let stem = file
		.file_stem()
		.map_or_else(|| "output".into(), |stem| stem.to_string_lossy());
	file.with_file_name(format!("{stem}{suffix}"))
}

/// Write `value` as pretty JSON to `path`, or to stdout for `-`. Returns the
/// path written to.
fn write_json(value: &impl Serialize, path: &Path) -> AnyResult<Option<PathBuf>> {
	let json = serde_json::to_string_pretty(value)?;

	if path == Path::new(STDOUT_PATH) {
		println!("{json}");
		return Ok(None);
	}

	debug!(path = %path.display(), "writing output");
	std::fs::write(path, format!("{json}\n"))?;
	Ok(Some(path.to_path_buf()))
}

fn run_build(args: &TxtsheetCli, file: &Path) -> AnyEmptyResult {
	let compilation = compile_file(file, &compile_options(args))?;
	let output = args
		.output
		.clone()
		.unwrap_or_else(|| default_output(file, ".json"));

	let Some(written) = write_json(&compilation, &output)? else {
		return Ok(());
	};

	println!(
		"{} {}",
		colored!("Compiled", green),
		written.display()
	);

	let pending = compilation
		.rewrites
		.values()
		.map(Vec::len)
		.sum::<usize>();
	if pending > 0 {
		println!(
			"{} {pending} line(s) in {} file(s) have no id",
			colored!("note:", yellow),
			compilation.rewrites.len()
		);
	}

	Ok(())
}

fn run_preprocess(args: &TxtsheetCli, file: &Path) -> AnyEmptyResult {
	let lines = preprocess_file(file, &compile_options(args))?;
	let output = args
		.output
		.clone()
		.unwrap_or_else(|| default_output(file, "_preprocessed.json"));

	let Some(written) = write_json(&lines, &output)? else {
		return Ok(());
	};

	println!(
		"{} {} ({} lines)",
		colored!("Preprocessed", green),
		written.display(),
		lines.len()
	);

	Ok(())
}
