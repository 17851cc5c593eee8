use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Inspect, fetch, and serve MDC component metadata.",
	long_about = "mdcc (markdown component completions) keeps an editor-facing catalog of the \
	              MDC components a project can embed in its markdown.\n\nIt resolves component \
	              descriptors from a local glob pattern or a remote URL and serves completions, \
	              hover information, and block folding for `::component` tags over the Language \
	              Server Protocol.\n\nQuick start:\n  mdcc components  List the resolved \
	              component catalog\n  mdcc fetch       Force a metadata refresh\n  mdcc \
	              lsp         Start the language server"
)]
pub struct MdccCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub root: Option<PathBuf>,

	/// Remote URL serving component metadata as JSON. Overrides `mdcc.toml`.
	#[arg(long, global = true)]
	pub url: Option<String>,

	/// Workspace-relative glob of component metadata files. Takes precedence
	/// over the URL when it matches at least one file. Overrides `mdcc.toml`.
	#[arg(long, global = true)]
	pub files: Option<String>,

	/// Enable verbose diagnostic logging of fetch and cache activity.
	#[arg(long, global = true, default_value_t = false)]
	pub debug: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// List the component catalog from the resolved metadata origin.
	///
	/// Performs a single fetch, reading local files matching the configured
	/// glob pattern when any exist and falling back to the configured URL
	/// otherwise, then prints each component with its prop count and
	/// description.
	///
	/// Use `--json` to emit the raw component descriptors for programmatic
	/// consumption.
	Components {
		/// Output the catalog as JSON instead of a table.
		#[arg(long, default_value_t = false)]
		json: bool,
	},
	/// Force a component metadata refresh and report the outcome.
	///
	/// Resolves the origin exactly as the language server would and performs
	/// one forced fetch, printing where the catalog came from and how many
	/// components it contains. Exits with a non-zero status code when the
	/// fetch fails.
	Fetch,
	/// Start the mdcc language server (LSP).
	///
	/// Communicates over stdin/stdout using the Language Server Protocol.
	/// Configure your editor to run `mdcc lsp` as the language server
	/// command for markdown files.
	///
	/// Provides completion for component names and their props, hover
	/// documentation on `::component` markers, and folding ranges for
	/// component blocks.
	Lsp,
}
