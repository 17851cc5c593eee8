use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use mdcc_cli::Commands;
use mdcc_cli::MdccCli;
use mdcc_core::FileConfig;
use mdcc_core::MetadataCache;
use mdcc_core::MetadataSnapshot;
use mdcc_core::Origin;
use mdcc_core::OriginSource;
use mdcc_core::RefreshCoordinator;
use mdcc_core::Settings;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

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
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = MdccCli::parse();

	// Respect NO_COLOR env var, the --no-color flag, and non-tty stdout.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match args.command {
		Some(Commands::Components { json }) => run_components(&args, json),
		Some(Commands::Fetch) => run_fetch(&args),
		Some(Commands::Lsp) => run_lsp(&args),
		None => {
			eprintln!("No subcommand specified. Run `mdcc --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<mdcc_core::McError>() {
			Ok(mc_err) => {
				let report: miette::Report = (*mc_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn resolve_root(args: &MdccCli) -> PathBuf {
	args.root
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Resolve effective settings: flags override `mdcc.toml`, which overrides
/// defaults.
fn resolve_settings(args: &MdccCli, root: &Path) -> Result<Settings, Box<dyn std::error::Error>> {
	let mut settings = match FileConfig::load(root)? {
		Some(config) => config.settings(),
		None => Settings::default(),
	};

	if let Some(url) = &args.url {
		settings.component_metadata_url = Some(url.clone());
	}
	if let Some(files) = &args.files {
		settings.component_metadata_local_file_pattern = Some(files.clone());
	}
	if args.debug {
		settings.debug = true;
	}

	Ok(settings)
}

/// Initialize stderr logging. `RUST_LOG` wins when set; otherwise the
/// resolved debug setting picks the default verbosity.
fn init_logging(debug: bool) {
	let directives = if debug {
		"mdcc_core=debug,mdcc_cli=debug,mdcc_lsp=debug"
	} else {
		"mdcc_core=warn"
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();
}

fn print_field(label: &str, value: impl std::fmt::Display) {
	println!("{label:<28} {value}");
}

/// Resolve the settings into an origin and perform one forced fetch through
/// the same refresh path the language server uses.
fn fetch_snapshot(
	settings: &Settings,
	root: &Path,
) -> Result<Option<Arc<MetadataSnapshot>>, Box<dyn std::error::Error>> {
	let cache = MetadataCache::new(OriginSource::new(), Origin::none(root));
	let coordinator = RefreshCoordinator::new(cache, root);

	let rt = tokio::runtime::Runtime::new()?;
	let snapshot = rt.block_on(async {
		coordinator.apply_settings(settings).await;
		coordinator.force_refresh().await
	})?;

	Ok(snapshot)
}

fn run_components(args: &MdccCli, json: bool) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let settings = resolve_settings(args, &root)?;
	init_logging(settings.debug);

	let origin = settings.origin(&root);
	let snapshot = fetch_snapshot(&settings, &root)?;

	if json {
		let components = snapshot
			.as_ref()
			.map_or(&[][..], |snapshot| snapshot.components.as_slice());
		println!("{}", serde_json::to_string_pretty(components)?);
		return Ok(());
	}

	let Some(snapshot) = snapshot else {
		println!("No component metadata available.");
		return Ok(());
	};

	if snapshot.is_empty() {
		println!("No components found ({}).", origin.describe());
		return Ok(());
	}

	println!("{}", colored!("Components:", bold));
	for component in &snapshot.components {
		println!("  ::{} ({} prop(s))", component.name, component.props.len());
		if let Some(description) = &component.description {
			println!("      {description}");
		}
	}

	println!();
	print_field("Origin", origin.describe());
	print_field("Components", snapshot.len());

	Ok(())
}

fn run_fetch(args: &MdccCli) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let settings = resolve_settings(args, &root)?;
	init_logging(settings.debug);

	let origin = settings.origin(&root);
	let snapshot = fetch_snapshot(&settings, &root)?;

	let components = snapshot.as_ref().map_or(0, |snapshot| snapshot.len());
	println!("Fetched {components} component(s).");
	print_field("Origin", origin.describe());
	if let Some(snapshot) = &snapshot {
		print_field("Generation", snapshot.generation);
	}

	Ok(())
}

fn run_lsp(args: &MdccCli) -> Result<(), Box<dyn std::error::Error>> {
	init_logging(args.debug);

	let rt = tokio::runtime::Runtime::new()?;
	rt.block_on(mdcc_lsp::run_server());
	Ok(())
}
