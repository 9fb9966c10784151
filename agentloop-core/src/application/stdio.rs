//! JSON-lines front end: one query object per input line, one outcome
//! object per output line.

use crate::application::agent::{Agent, AgentOutcome, AgentStep, TerminationReason};
use crate::infrastructure::model::ModelProvider;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize stdio response: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct StdioQuery {
    query: String,
    #[serde(default)]
    max_iterations: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StdioResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    query_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    termination: Option<TerminationReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iterations: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    transcript: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    steps: Vec<AgentStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StdioResponse {
    fn outcome(outcome: AgentOutcome) -> Self {
        Self {
            query_id: Some(outcome.query_id),
            answer: Some(outcome.answer),
            termination: Some(outcome.termination),
            iterations: Some(outcome.state.iteration_count),
            transcript: outcome.state.transcript,
            steps: outcome.steps,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            query_id: None,
            answer: None,
            termination: None,
            iterations: None,
            transcript: Vec::new(),
            steps: Vec::new(),
            error: Some(message.into()),
        }
    }
}

pub async fn run<P: ModelProvider>(agent: &Agent<P>) -> Result<(), StdioError> {
    let stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    serve(agent, stdin, &mut stdout).await
}

/// Answer queries from `reader` until end of input.
pub async fn serve<P, R, W>(agent: &Agent<P>, reader: R, writer: &mut W) -> Result<(), StdioError>
where
    P: ModelProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received STDIO line");

        let response = match serde_json::from_str::<StdioQuery>(&line) {
            Ok(request) if request.query.trim().is_empty() => {
                StdioResponse::error("query cannot be empty")
            }
            Ok(StdioQuery {
                max_iterations: Some(0),
                ..
            }) => StdioResponse::error("max_iterations must be at least 1"),
            Ok(request) => {
                info!("Processing STDIO query");
                let budget = request.max_iterations.unwrap_or(agent.max_iterations());
                let outcome = agent.run_with_budget(request.query.trim(), budget).await;
                StdioResponse::outcome(outcome)
            }
            Err(err) => {
                error!(%err, "Failed to parse STDIO input line");
                StdioResponse::error(format!("invalid input JSON: {err}"))
            }
        };

        write_response(writer, &response).await?;
    }

    writer.flush().await?;
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &StdioResponse,
) -> Result<(), StdioError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}
