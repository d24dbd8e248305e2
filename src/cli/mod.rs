// CLI module for explanium
// Author: kelexine (https://github.com/kelexine)

use clap::Parser;

/// explanium - cached explanations for selected text, backed by hosted Gemma
#[derive(Parser, Debug)]
#[command(name = "explanium", version, about, long_about = None)]
pub struct Args {
    /// Explain TEXT once, print the result, and exit
    #[arg(long, value_name = "TEXT", conflicts_with_all = ["stats", "clear_cache"])]
    pub explain: Option<String>,

    /// Print cache statistics as JSON and exit
    #[arg(long)]
    pub stats: bool,

    /// Delete every cached explanation and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Gemma API key (overrides the configuration file)
    #[arg(long, env = "GEMMA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}
