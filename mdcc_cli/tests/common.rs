use assert_cmd::Command;

pub fn mdcc_cmd() -> Command {
	let mut cmd = Command::cargo_bin("mdcc")
		.unwrap_or_else(|error| panic!("failed to locate mdcc binary: {error}"));
	cmd.env("NO_COLOR", "1");
	cmd
}
