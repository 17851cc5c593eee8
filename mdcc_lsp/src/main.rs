use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
	// Stdout carries LSP protocol traffic; logs go to stderr.
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("mdcc_core=info,mdcc_lsp=info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();

	mdcc_lsp::run_server().await;
}
