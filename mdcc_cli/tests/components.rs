mod common;

use mdcc_cli::Commands;
use mdcc_cli::MdccCli;
use mdcc_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;
use serde_json::Value;

const CATALOG: &str = r#"[
	{
		"name": "callout",
		"description": "A stylized box for notes and warnings.",
		"props": [
			{ "name": "type", "type": "enum", "default": "note", "required": true },
			{ "name": "icon", "type": "string" }
		]
	},
	{
		"name": "card",
		"props": [{ "name": "title", "type": "string", "required": true }]
	}
]"#;

#[test]
fn components_lists_catalog_from_local_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("meta"))?;
	std::fs::write(tmp.path().join("meta/components.meta.json"), CATALOG)?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("components")
		.arg("--root")
		.arg(tmp.path())
		.arg("--files")
		.arg("meta/*.meta.json")
		.assert()
		.success()
		.stdout(
			predicates::str::contains("::callout (2 prop(s))")
				.and(predicates::str::contains("::card (1 prop(s))"))
				.and(predicates::str::contains(
					"A stylized box for notes and warnings.",
				)),
		);

	Ok(())
}

#[test]
fn components_json_outputs_descriptors() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("components.meta.json"), CATALOG)?;

	let mut cmd = common::mdcc_cmd();
	let assert = cmd
		.arg("components")
		.arg("--json")
		.arg("--root")
		.arg(tmp.path())
		.arg("--files")
		.arg("*.meta.json")
		.assert()
		.success();

	let output = String::from_utf8(assert.get_output().stdout.clone())?;
	let parsed: Value = serde_json::from_str(&output)?;
	let components = parsed
		.as_array()
		.unwrap_or_else(|| panic!("expected a JSON array, got: {output}"));

	assert_eq!(components.len(), 2);
	assert_eq!(components[0]["name"], "callout");
	assert_eq!(components[0]["props"][0]["name"], "type");
	assert_eq!(components[0]["props"][0]["prop_type"], "enum");
	assert_eq!(components[1]["name"], "card");

	Ok(())
}

#[test]
fn components_reports_empty_catalog() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("components")
		.arg("--root")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("No components found"));

	Ok(())
}

#[test]
fn components_rejects_duplicate_names_across_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.meta.json"), r#"[{ "name": "callout" }]"#)?;
	std::fs::write(tmp.path().join("b.meta.json"), r#"[{ "name": "callout" }]"#)?;

	let mut cmd = common::mdcc_cmd();
	let _ = cmd
		.arg("components")
		.arg("--root")
		.arg(tmp.path())
		.arg("--files")
		.arg("*.meta.json")
		.assert()
		.failure()
		.code(2)
		.stderr(predicates::str::contains("duplicate component"));

	Ok(())
}

#[test]
fn components_flags_are_accepted_by_cli_parser() {
	use clap::Parser;

	let cli = MdccCli::parse_from([
		"mdcc",
		"components",
		"--json",
		"--root",
		"/tmp/ws",
		"--files",
		"meta/*.json",
	]);
	match cli.command {
		Some(Commands::Components { json }) => assert!(json),
		_ => panic!("expected Components command"),
	}
	assert_eq!(cli.files.as_deref(), Some("meta/*.json"));

	// Verify --json defaults to false when not specified.
	let cli = MdccCli::parse_from(["mdcc", "components"]);
	match cli.command {
		Some(Commands::Components { json }) => assert!(!json),
		_ => panic!("expected Components command"),
	}
}
