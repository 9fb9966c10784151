mod cli;

use agentloop_core::agent::{Agent, AgentOptions, ToolCatalog, ToolInvoker};
use agentloop_core::config::AppConfig;
use agentloop_core::model::{GeminiClient, GenerationGateway, ModelProvider};
use agentloop_core::stdio;
use agentloop_core::tooling::McpProcess;
use clap::Parser;
use cli::{Cli, RunMode};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const REPL_PROMPT: &str = "Enter your query (or 'quit' to exit): ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.mode == RunMode::Stdio);
    info!("Starting agentloop");
    debug!(mode = ?cli.mode, config = ?cli.config, model = ?cli.model, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    apply_cli_overrides(&cli, &mut config);

    let provider = GeminiClient::from_config(&config.provider);
    provider.ensure_api_key()?;

    let server = config.require_server()?.clone();
    let process = McpProcess::spawn(server).await?;

    let result = serve(&cli, &config, provider, process.clone()).await;
    process.shutdown().await;
    info!("Agent execution finished");
    result
}

async fn serve<P: ModelProvider>(
    cli: &Cli,
    config: &AppConfig,
    provider: P,
    process: McpProcess,
) -> Result<(), Box<dyn Error>> {
    let catalog = ToolCatalog::discover(&process).await?;
    if catalog.is_empty() {
        warn!(server = process.name(), "Tool server advertised no callable tools");
    }

    let mut options = AgentOptions::from_settings(&config.agent, config.system_prompt.clone());
    options.server_guidance = process.instructions().await;

    let gateway =
        GenerationGateway::new(provider, config.model.clone(), config.agent.generation_timeout);
    let invoker = ToolInvoker::new(Arc::new(process), config.agent.tool_timeout);
    let agent = Agent::new(gateway, invoker, catalog, options);

    info!(mode = ?cli.mode, "Running agent in selected mode");
    match cli.mode {
        RunMode::Stdio => stdio::run(&agent).await?,
        RunMode::Once => run_once(&agent, &cli.query).await?,
        RunMode::Repl => run_repl(&agent).await?,
    }
    Ok(())
}

async fn run_once<P: ModelProvider>(agent: &Agent<P>, words: &[String]) -> io::Result<()> {
    let query = if words.is_empty() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        words.join(" ")
    };

    let outcome = agent.run(query.trim()).await;
    let mut stdout = io::stdout();
    stdout.write_all(format!("{}\n", outcome.wire()).as_bytes()).await?;
    stdout.flush().await
}

async fn run_repl<P: ModelProvider>(agent: &Agent<P>) -> io::Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout.write_all(REPL_PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let outcome = agent.run(query).await;
        stdout
            .write_all(format!("Result: {}\n", outcome.wire()).as_bytes())
            .await?;
    }

    stdout.flush().await
}

fn init_tracing(quiet: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) if quiet => EnvFilter::new("off"),
            Err(_) => EnvFilter::new("info"),
        };
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(model) = cli.model.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        info!(model, "Overriding model based on CLI flag");
        config.model = model.to_string();
    }
    if let Some(max) = cli.max_iterations {
        info!(max_iterations = max, "Overriding iteration budget based on CLI flag");
        config.agent.max_iterations = max as usize;
    }
    if let Some(system) = cli.system.clone() {
        config.system_prompt = Some(system);
    }
}
