use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "agentloop",
    version,
    about = "Tool-calling agent over an MCP stdio server"
)]
pub struct Cli {
    /// Configuration file (defaults to config/agent.toml)
    #[arg(long, short)]
    pub config: Option<String>,
    #[arg(long, short, value_enum, default_value_t = RunMode::Repl)]
    pub mode: RunMode,
    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,
    /// Override the per-query tool call budget
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_iterations: Option<u64>,
    /// Extra text placed ahead of the generated system instructions
    #[arg(long)]
    pub system: Option<String>,
    /// Query for `--mode once`; read from stdin when omitted
    pub query: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RunMode {
    /// Prompt for queries until `quit`
    Repl,
    /// Answer a single query and exit
    Once,
    /// JSON-lines requests on stdin, outcomes on stdout
    Stdio,
}
