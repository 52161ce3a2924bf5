mod common;

use txtsheet_core::AnyEmptyResult;

#[test]
fn build_writes_tree_next_to_the_input() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_file(tmp.path(), "app/source/conf.yml", "$rootDirectory: ../..\n$projectId: demo\n");
	let entry = common::write_file(tmp.path(), "app/source/main.txt", "# Sheet\n- [#a] item\n- other\n");

	common::txtsheet_cmd()
		.arg("build")
		.arg(&entry)
		.assert()
		.success()
		.stdout(predicates::str::contains("Compiled"))
		.stdout(predicates::str::contains("2 line(s) in 1 file(s) have no id"));

	let output = std::fs::read_to_string(tmp.path().join("app/source/main.json"))?;
	let json: serde_json::Value = serde_json::from_str(&output)?;

	assert_eq!(json["tree"]["project"].as_str(), Some("demo"));
	assert_eq!(json["tree"]["rootDirectory"].as_str(), Some("../.."));
	assert_eq!(json["tree"]["children"][0]["text"].as_str(), Some("Sheet"));
	assert_eq!(json["tree"]["children"][0]["children"][0]["id"].as_str(), Some("a"));
	assert_eq!(json["rewrites"]["app:main.txt"].as_array().map(Vec::len), Some(2));

	Ok(())
}

#[test]
fn build_with_root_and_defines_to_stdout() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let entry = common::write_file(
		tmp.path(),
		"app/source/main.txt",
		"@if dev\n# Dev\n@end\n# Always\n",
	);

	let assert = common::txtsheet_cmd()
		.arg("build")
		.arg(&entry)
		.arg("--root")
		.arg(tmp.path())
		.arg("-D")
		.arg("dev")
		.arg("--output")
		.arg("-")
		.assert()
		.success();

	let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
	let names = json["tree"]["children"]
		.as_array()
		.map(|children| {
			children
				.iter()
				.filter_map(|child| child["text"].as_str())
				.collect::<Vec<_>>()
		})
		.unwrap_or_default();

	assert_eq!(names, vec!["Dev", "Always"]);

	Ok(())
}

#[test]
fn build_writes_to_explicit_output_path() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let entry = common::write_file(tmp.path(), "app/source/main.txt", "- item\n");
	let output = tmp.path().join("out.json");

	common::txtsheet_cmd()
		.arg("build")
		.arg(&entry)
		.arg("--root")
		.arg(tmp.path())
		.arg("--output")
		.arg(&output)
		.assert()
		.success();

	assert!(output.is_file());
	assert!(!tmp.path().join("app/source/main.json").exists());

	Ok(())
}

#[test]
fn build_reports_unclosed_if() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let entry = common::write_file(tmp.path(), "app/source/main.txt", "@if a\n- item\n");

	common::txtsheet_cmd()
		.arg("build")
		.arg(&entry)
		.arg("--root")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("unclosed `@if`"));

	Ok(())
}

#[test]
fn build_requires_a_root_directory() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let entry = common::write_file(tmp.path(), "app/source/main.txt", "- item\n");

	common::txtsheet_cmd()
		.arg("build")
		.arg(&entry)
		.assert()
		.code(2)
		.stderr(predicates::str::contains("no root directory"));

	Ok(())
}

#[test]
fn missing_subcommand_exits_with_usage_hint() {
	common::txtsheet_cmd()
		.assert()
		.code(1)
		.stderr(predicates::str::contains("txtsheet --help"));
}
