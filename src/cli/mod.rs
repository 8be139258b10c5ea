// src/cli/mod.rs — CLI definition (clap derive)

pub mod render;
pub mod run;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "research-stream",
    about = "Follow a streamed research session",
    version
)]
pub struct Cli {
    /// Research topic (words are joined with spaces)
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Streaming endpoint URL (overrides config)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Read the query from stdin
    #[arg(long)]
    pub stdin: bool,

    /// Suppress progress output (only emit the final result)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the finished session as JSON instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,
}

impl Cli {
    /// Query from the positional words, or from stdin with `--stdin`.
    pub fn query_text(&self) -> anyhow::Result<String> {
        if self.stdin {
            let mut buf = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
            return Ok(buf.trim().to_string());
        }
        Ok(self.query.join(" ").trim().to_string())
    }
}
