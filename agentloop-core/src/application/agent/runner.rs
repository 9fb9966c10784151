use super::catalog::ToolCatalog;
use super::coercion::{ArityPolicy, prepare_call};
use super::instructions::{build_prompt, compose_system_instructions};
use super::invoker::ToolInvoker;
use super::models::{AgentOptions, AgentOutcome, AgentStep, Termination, TerminationReason};
use super::parser::{ParsedResponse, parse_response};
use super::session::SessionState;
use crate::infrastructure::model::{GenerationGateway, ModelProvider};
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Result of one generate/parse/dispatch cycle.
#[derive(Debug, Clone)]
pub struct Iteration {
    pub state: SessionState,
    pub step: Option<AgentStep>,
    pub termination: Option<Termination>,
}

impl Iteration {
    fn proceed(state: SessionState, step: AgentStep) -> Self {
        Self {
            state,
            step: Some(step),
            termination: None,
        }
    }

    fn terminate(state: SessionState, step: Option<AgentStep>, termination: Termination) -> Self {
        Self {
            state,
            step,
            termination: Some(termination),
        }
    }
}

/// Drives a query through bounded generate/parse/dispatch cycles until the
/// model answers, a fatal condition occurs, or the budget runs out.
pub struct Agent<P: ModelProvider> {
    gateway: GenerationGateway<P>,
    invoker: ToolInvoker,
    catalog: ToolCatalog,
    system_prompt: String,
    max_iterations: usize,
    arity: ArityPolicy,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(
        gateway: GenerationGateway<P>,
        invoker: ToolInvoker,
        catalog: ToolCatalog,
        options: AgentOptions,
    ) -> Self {
        let instructions =
            compose_system_instructions(&catalog, options.server_guidance.as_deref());
        let system_prompt = match options.system_prompt {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{existing}\n\n{instructions}")
            }
            _ => instructions,
        };

        Self {
            gateway,
            invoker,
            catalog,
            system_prompt,
            max_iterations: options.max_iterations,
            arity: ArityPolicy::from_strict(options.strict_arity),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub async fn run(&self, query: &str) -> AgentOutcome {
        self.run_with_budget(query, self.max_iterations).await
    }

    /// Answer one query from a fresh session, allowing at most `budget`
    /// tool calls.
    pub async fn run_with_budget(&self, query: &str, budget: usize) -> AgentOutcome {
        let query_id = Uuid::new_v4().to_string();
        let span = info_span!("query", query_id = %query_id);

        async move {
            info!(budget, "Agent run started");
            let mut state = SessionState::new();
            let mut steps = Vec::new();

            let termination = loop {
                if state.iteration_count >= budget {
                    error!(iterations = state.iteration_count, "Max iterations reached");
                    break Termination::error(
                        TerminationReason::MaxIterationsReached,
                        "Max iterations reached",
                    );
                }

                let iteration = self.iterate(query, state).await;
                state = iteration.state;
                steps.extend(iteration.step);
                if let Some(termination) = iteration.termination {
                    break termination;
                }
            };

            info!(
                reason = %termination.reason,
                iterations = state.iteration_count,
                "Agent run finished"
            );
            AgentOutcome {
                query_id,
                answer: termination.answer,
                termination: termination.reason,
                state,
                steps,
            }
        }
        .instrument(span)
        .await
    }

    /// One cycle. Does not check the budget; [`Agent::run_with_budget`] does.
    pub async fn iterate(&self, query: &str, state: SessionState) -> Iteration {
        info!(iteration = state.iteration_count + 1, "Starting iteration");
        let prompt = build_prompt(&self.system_prompt, query, &state);

        let reply = match self.gateway.generate(&prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(%err, "Generation failed; ending query");
                return Iteration::terminate(
                    state,
                    None,
                    Termination::error(TerminationReason::GenerationFailed, err),
                );
            }
        };
        debug!(reply = %reply, "LLM response");

        match parse_response(&reply) {
            ParsedResponse::FinalAnswer { text } => {
                info!(answer = %text, "Agent returned final answer");
                Iteration::terminate(state, None, Termination::answer(text))
            }
            ParsedResponse::Malformed { raw_text } => {
                error!(reply = %raw_text, "Model reply matched neither verb");
                Iteration::terminate(
                    state,
                    None,
                    Termination::error(
                        TerminationReason::MalformedResponse,
                        format!("Malformed response: {raw_text}"),
                    ),
                )
            }
            ParsedResponse::FunctionCall { name, raw_params } => {
                self.dispatch(state, name, raw_params).await
            }
        }
    }

    async fn dispatch(
        &self,
        mut state: SessionState,
        tool: String,
        raw_params: Vec<String>,
    ) -> Iteration {
        let iteration = state.iteration_count + 1;
        info!(tool = %tool, params = ?raw_params, "Agent requested tool execution");

        let (arguments, shown, outcome) =
            match prepare_call(&self.catalog, &tool, &raw_params, self.arity) {
                Ok(arguments) => {
                    let outcome = self.invoker.invoke(&tool, &arguments).await;
                    (arguments.to_json(), arguments.to_string(), outcome)
                }
                Err(err) => (
                    Value::from(raw_params.clone()),
                    format!("{raw_params:?}"),
                    Err(err),
                ),
            };

        match outcome {
            Ok(result) => {
                let output = if result.is_error {
                    format!("Error: {}", result.text)
                } else {
                    result.text
                };
                state.record(
                    format!(
                        "In iteration {iteration} you called {tool} with {shown} parameters, and the function returned {output}."
                    ),
                    output.clone(),
                );
                let step = AgentStep {
                    iteration,
                    tool,
                    arguments,
                    success: !result.is_error,
                    output,
                };
                Iteration::proceed(state, step)
            }
            Err(err) => {
                let output = format!("Error: {err}");
                state.record(
                    format!(
                        "In iteration {iteration} you called {tool} with {shown} parameters, and the call failed with {output}."
                    ),
                    output.clone(),
                );
                let step = AgentStep {
                    iteration,
                    tool,
                    arguments,
                    success: false,
                    output,
                };
                if err.is_fatal() {
                    error!(%err, "Fatal tool error");
                    Iteration::terminate(
                        state,
                        Some(step),
                        Termination::error(TerminationReason::FatalToolError, &err),
                    )
                } else {
                    warn!(%err, "Recoverable tool error fed back to the model");
                    Iteration::proceed(state, step)
                }
            }
        }
    }
}
