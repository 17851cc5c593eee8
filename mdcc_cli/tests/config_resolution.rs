mod common;

use mdcc_core::AnyEmptyResult;

#[test]
fn mdcc_toml_supplies_metadata_origin() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("meta"))?;
	std::fs::write(
		tmp.path().join("meta/components.meta.json"),
		r#"[{ "name": "callout" }]"#,
	)?;
	std::fs::write(
		tmp.path().join("mdcc.toml"),
		"[metadata]\nfiles = \"meta/*.meta.json\"\n",
	)?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("fetch")
		.arg("--root")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Fetched 1 component(s)."));

	Ok(())
}

#[test]
fn flags_override_mdcc_toml() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("meta"))?;
	std::fs::create_dir_all(tmp.path().join("override"))?;
	std::fs::write(
		tmp.path().join("meta/one.meta.json"),
		r#"[{ "name": "callout" }]"#,
	)?;
	std::fs::write(
		tmp.path().join("override/two.meta.json"),
		r#"[{ "name": "callout" }, { "name": "card" }]"#,
	)?;
	std::fs::write(
		tmp.path().join("mdcc.toml"),
		"[metadata]\nfiles = \"meta/*.meta.json\"\n",
	)?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("fetch")
		.arg("--root")
		.arg(tmp.path())
		.arg("--files")
		.arg("override/*.meta.json")
		.assert()
		.success()
		.stdout(predicates::str::contains("Fetched 2 component(s)."));

	Ok(())
}

#[test]
fn nested_config_candidate_is_discovered() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(
		tmp.path().join("components.meta.json"),
		r#"[{ "name": "callout" }]"#,
	)?;
	std::fs::write(
		tmp.path().join(".config/mdcc.toml"),
		"[metadata]\nfiles = \"*.meta.json\"\n",
	)?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("fetch")
		.arg("--root")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Fetched 1 component(s)."));

	Ok(())
}

#[test]
fn malformed_mdcc_toml_is_an_error() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("mdcc.toml"), "metadata = \"not a table\"\n")?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("components")
		.arg("--root")
		.arg(tmp.path())
		.assert()
		.failure()
		.code(2)
		.stderr(predicates::str::contains("failed to parse config file"));

	Ok(())
}
