// src/main.rs — research-stream entry point

use clap::Parser;

use research_stream::cli::Cli;
use research_stream::infra::config::Config;
use research_stream::infra::logger;
use research_stream::session::SessionStatus;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(SessionStatus::Failed) => std::process::exit(1),
        Ok(_) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<SessionStatus> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    if let Some(ref endpoint) = cli.endpoint {
        config.stream.endpoint = endpoint.clone();
    }

    // Respects RUST_LOG before the configured level
    logger::init_logging(&config.logging.level);

    let query = cli.query_text()?;
    if query.is_empty() {
        anyhow::bail!("No research query given. Usage: research-stream <QUERY>...");
    }

    research_stream::cli::run::run_research(&query, &config, cli.quiet, cli.json).await
}
