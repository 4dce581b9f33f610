use clap::Parser;
use issue_chat::app;
use issue_chat::cli::{build_config, Args};
use tracing_subscriber::EnvFilter;

// Single-threaded runtime: every session handler runs on this one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = build_config(&args, |key| std::env::var(key).ok())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color)
        .init();

    if !config.color {
        colored::control::set_override(false);
    }

    app::run(config).await?;
    Ok(())
}
