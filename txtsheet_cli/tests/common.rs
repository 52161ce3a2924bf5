use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn txtsheet_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("txtsheet"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("TXTSHEET_LOG");
	cmd
}

/// Write `content` to `<root>/<relative>`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write: {e}"));
	path
}
