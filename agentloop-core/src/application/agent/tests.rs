use super::*;
use crate::application::tooling::{ToolInvokeError, ToolServerInterface};
use crate::infrastructure::model::{GenerationGateway, ModelError, ModelProvider, ModelRequest, ModelResponse};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

type Handler = Arc<dyn Fn(&str, &Value) -> Result<Value, ToolInvokeError> + Send + Sync>;

#[derive(Clone)]
struct StubBridge {
    handler: Handler,
    hang: bool,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubBridge {
    fn calculator() -> Self {
        Self::with_handler(|tool, args| {
            let a = args.get("a").and_then(Value::as_i64).unwrap_or_default();
            let b = args.get("b").and_then(Value::as_i64).unwrap_or_default();
            let value = match tool {
                "add" => a + b,
                "subtract" => a - b,
                _ => 0,
            };
            Ok(json!({"content": [{"type": "text", "text": value.to_string()}], "isError": false}))
        })
    }

    fn with_handler(
        handler: impl Fn(&str, &Value) -> Result<Value, ToolInvokeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            hang: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::calculator()
        }
    }

    async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolServerInterface for StubBridge {
    async fn list_tools(&self) -> Result<Vec<Value>, ToolInvokeError> {
        Ok(calculator_records())
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ToolInvokeError> {
        self.calls
            .lock()
            .await
            .push((tool.to_string(), arguments.clone()));
        if self.hang {
            std::future::pending::<()>().await;
        }
        (self.handler)(tool, &arguments)
    }
}

#[derive(Clone)]
struct ScriptedProvider {
    responses: Arc<Mutex<Vec<Result<String, String>>>>,
    recordings: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<&str>) -> Self {
        Self::with_results(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    fn with_results(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn prompts(&self) -> Vec<String> {
        self.recordings
            .lock()
            .await
            .iter()
            .map(|request| request.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.recordings.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            return Err(ModelError::invalid_response("scripted", "script exhausted"));
        }
        match responses.remove(0) {
            Ok(text) => Ok(ModelResponse::new(text)),
            Err(reason) => Err(ModelError::invalid_response("scripted", reason)),
        }
    }
}

/// Provider that repeats the same reply forever.
#[derive(Clone, Default)]
struct LoopingProvider {
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl ModelProvider for LoopingProvider {
    fn id(&self) -> &str {
        "looping"
    }

    async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
        *self.calls.lock().await += 1;
        Ok(ModelResponse::new("FUNCTION_CALL: add|1|1"))
    }
}

struct StalledProvider;

#[async_trait]
impl ModelProvider for StalledProvider {
    fn id(&self) -> &str {
        "stalled"
    }

    async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ModelResponse::new("FINAL_ANSWER: [late]"))
    }
}

fn calculator_records() -> Vec<Value> {
    let pair = json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
        "required": ["a", "b"]
    });
    vec![
        json!({"name": "add", "description": "Add two numbers", "inputSchema": pair}),
        json!({"name": "subtract", "description": "Subtract two numbers", "inputSchema": pair}),
    ]
}

fn agent_with<P: ModelProvider>(
    provider: P,
    bridge: &StubBridge,
    options: AgentOptions,
) -> Agent<P> {
    let gateway = GenerationGateway::new(provider, "test-model", Duration::from_secs(10));
    let invoker = ToolInvoker::new(Arc::new(bridge.clone()), Duration::from_secs(30));
    let catalog = ToolCatalog::from_records(&calculator_records());
    Agent::new(gateway, invoker, catalog, options)
}

fn agent<P: ModelProvider>(provider: P, bridge: &StubBridge) -> Agent<P> {
    agent_with(provider, bridge, AgentOptions::default())
}

#[tokio::test]
async fn tool_call_then_final_answer() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|5|3", "FINAL_ANSWER: [8]"]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run("Add 5 and 3").await;

    assert_eq!(outcome.termination, TerminationReason::FinalAnswer);
    assert_eq!(outcome.answer, "[8]");
    assert_eq!(outcome.wire(), "FINAL_ANSWER: [8]");
    assert_eq!(outcome.iterations(), 1);
    assert_eq!(outcome.state.last_result.as_deref(), Some("8"));

    let entry = &outcome.state.transcript[0];
    assert!(entry.contains("add"));
    assert!(entry.contains('5') && entry.contains('3') && entry.contains('8'));

    assert_eq!(bridge.calls().await, vec![("add".to_string(), json!({"a": 5, "b": 3}))]);

    let prompts = provider.prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].ends_with("Query: Add 5 and 3"));
    assert!(prompts[1].contains(entry.as_str()));
    assert!(prompts[1].ends_with("What should I do next?"));

    assert_eq!(outcome.steps.len(), 1);
    assert!(outcome.steps[0].success);
    assert_eq!(outcome.steps[0].arguments, json!({"a": 5, "b": 3}));
}

#[tokio::test]
async fn immediate_final_answer_calls_no_tool() {
    let provider = ScriptedProvider::new(vec!["FINAL_ANSWER: [42]"]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run("What is the answer?").await;

    assert_eq!(outcome.answer, "[42]");
    assert_eq!(outcome.iterations(), 0);
    assert!(outcome.state.transcript.is_empty());
    assert!(bridge.calls().await.is_empty());
    assert_eq!(provider.prompts().await.len(), 1);
}

#[tokio::test]
async fn malformed_reply_ends_the_query() {
    let provider = ScriptedProvider::new(vec!["I think the answer is 8."]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider, &bridge);

    let outcome = agent.run("Add 5 and 3").await;

    assert_eq!(outcome.termination, TerminationReason::MalformedResponse);
    assert_eq!(
        outcome.answer,
        "[Error: Malformed response: I think the answer is 8.]"
    );
    assert!(bridge.calls().await.is_empty());
}

#[tokio::test]
async fn budget_stops_after_max_iterations() {
    let provider = LoopingProvider::default();
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run("Keep adding").await;

    assert_eq!(outcome.termination, TerminationReason::MaxIterationsReached);
    assert_eq!(outcome.answer, "[Error: Max iterations reached]");
    assert_eq!(outcome.wire(), "FINAL_ANSWER: [Error: Max iterations reached]");
    assert_eq!(outcome.iterations(), 3);
    assert_eq!(*provider.calls.lock().await, 3);
    assert_eq!(bridge.calls().await.len(), 3);
}

#[tokio::test]
async fn budget_override_per_query() {
    let provider = LoopingProvider::default();
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run_with_budget("Keep adding", 1).await;

    assert_eq!(outcome.iterations(), 1);
    assert_eq!(*provider.calls.lock().await, 1);
}

#[tokio::test]
async fn coercion_error_is_fed_back() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|x|3", "FINAL_ANSWER: [unknown]"]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run("Add x and 3").await;

    assert_eq!(outcome.termination, TerminationReason::FinalAnswer);
    assert_eq!(outcome.iterations(), 1);
    assert!(bridge.calls().await.is_empty());
    assert!(!outcome.steps[0].success);

    let prompts = provider.prompts().await;
    assert!(prompts[1].contains("invalid value 'x' for parameter 'a': expected integer"));
    assert!(outcome.state.transcript[0].contains("Error"));
}

#[tokio::test]
async fn unknown_tool_is_fatal() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: multiply|2|3", "FINAL_ANSWER: [6]"]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run("Multiply 2 and 3").await;

    assert_eq!(outcome.termination, TerminationReason::FatalToolError);
    assert_eq!(outcome.answer, "[Error: Unknown tool: multiply]");
    assert_eq!(outcome.iterations(), 1);
    assert!(bridge.calls().await.is_empty());
    assert_eq!(provider.prompts().await.len(), 1);
}

#[tokio::test]
async fn tool_level_error_result_is_fed_back() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: subtract|1|0", "FINAL_ANSWER: [done]"]);
    let bridge = StubBridge::with_handler(|_, _| {
        Ok(json!({"content": [{"type": "text", "text": "division by zero"}], "isError": true}))
    });
    let agent = agent(provider.clone(), &bridge);

    let outcome = agent.run("q").await;

    assert_eq!(outcome.termination, TerminationReason::FinalAnswer);
    assert_eq!(outcome.state.last_result.as_deref(), Some("Error: division by zero"));
    assert!(!outcome.steps[0].success);
    assert!(provider.prompts().await[1].contains("Error: division by zero"));
}

#[tokio::test]
async fn rpc_error_is_recoverable_but_disconnect_is_fatal() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|1|2", "FINAL_ANSWER: [3]"]);
    let bridge = StubBridge::with_handler(|_, _| {
        Err(ToolInvokeError::Rpc {
            server: "calc".into(),
            code: -32602,
            message: "invalid params".into(),
        })
    });
    let outcome = agent(provider, &bridge).run("q").await;
    assert_eq!(outcome.termination, TerminationReason::FinalAnswer);
    assert!(outcome.state.transcript[0].contains("invalid params"));

    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|1|2", "FINAL_ANSWER: [3]"]);
    let bridge = StubBridge::with_handler(|_, _| {
        Err(ToolInvokeError::Terminated {
            server: "calc".into(),
        })
    });
    let outcome = agent(provider.clone(), &bridge).run("q").await;
    assert_eq!(outcome.termination, TerminationReason::FatalToolError);
    assert!(outcome.answer.starts_with("[Error: tool channel lost"));
    assert_eq!(outcome.iterations(), 1);
    assert_eq!(provider.prompts().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_tool_times_out() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|1|2", "FINAL_ANSWER: [3]"]);
    let bridge = StubBridge::hanging();
    let agent = agent(provider, &bridge);

    let outcome = agent.run("q").await;

    assert_eq!(outcome.termination, TerminationReason::FatalToolError);
    assert_eq!(outcome.answer, "[Error: tool 'add' timed out after 30s]");
    assert_eq!(bridge.calls().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_ends_the_query() {
    let bridge = StubBridge::calculator();
    let outcome = agent(StalledProvider, &bridge).run("q").await;

    assert_eq!(outcome.termination, TerminationReason::GenerationFailed);
    assert_eq!(outcome.answer, "[Error: LLM generation timed out after 10s]");
    assert_eq!(outcome.iterations(), 0);
}

#[tokio::test]
async fn generation_failure_ends_the_query() {
    let provider = ScriptedProvider::with_results(vec![Err("quota exceeded".into())]);
    let bridge = StubBridge::calculator();
    let outcome = agent(provider, &bridge).run("q").await;

    assert_eq!(outcome.termination, TerminationReason::GenerationFailed);
    assert!(outcome.answer.contains("quota exceeded"));
}

#[tokio::test]
async fn whitespace_around_separators_is_ignored() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL:  add | 5 |3 ", "FINAL_ANSWER: [8]"]);
    let bridge = StubBridge::calculator();
    agent(provider, &bridge).run("q").await;

    assert_eq!(bridge.calls().await, vec![("add".to_string(), json!({"a": 5, "b": 3}))]);
}

#[tokio::test]
async fn each_query_starts_from_a_fresh_session() {
    let provider = ScriptedProvider::new(vec![
        "FUNCTION_CALL: add|5|3",
        "FINAL_ANSWER: [8]",
        "FINAL_ANSWER: [done]",
    ]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider.clone(), &bridge);

    let first = agent.run("first").await;
    let second = agent.run("second").await;

    assert_eq!(first.iterations(), 1);
    assert_eq!(second.iterations(), 0);
    assert_ne!(first.query_id, second.query_id);

    let prompts = provider.prompts().await;
    assert!(prompts[2].ends_with("Query: second"));
    assert!(!prompts[2].contains("What should I do next?"));
}

#[tokio::test]
async fn identical_scripts_give_identical_runs() {
    let script = vec!["FUNCTION_CALL: add|2|2", "FUNCTION_CALL: subtract|4|1", "FINAL_ANSWER: [3]"];

    let first_provider = ScriptedProvider::new(script.clone());
    let first = agent(first_provider.clone(), &StubBridge::calculator()).run("q").await;
    let second_provider = ScriptedProvider::new(script);
    let second = agent(second_provider.clone(), &StubBridge::calculator()).run("q").await;

    assert_eq!(first.answer, second.answer);
    assert_eq!(first.state, second.state);
    assert_eq!(first_provider.prompts().await, second_provider.prompts().await);
}

#[tokio::test]
async fn strict_arity_rejects_missing_values() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|5", "FINAL_ANSWER: [?]"]);
    let bridge = StubBridge::calculator();
    let options = AgentOptions {
        strict_arity: true,
        ..AgentOptions::default()
    };
    let outcome = agent_with(provider.clone(), &bridge, options).run("q").await;

    assert_eq!(outcome.termination, TerminationReason::FinalAnswer);
    assert!(bridge.calls().await.is_empty());
    assert!(provider.prompts().await[1].contains("expects 2 parameter(s) but received 1"));
}

#[tokio::test]
async fn lenient_arity_sends_partial_arguments() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|5", "FINAL_ANSWER: [5]"]);
    let bridge = StubBridge::calculator();
    agent(provider, &bridge).run("q").await;

    assert_eq!(bridge.calls().await, vec![("add".to_string(), json!({"a": 5}))]);
}

#[tokio::test]
async fn system_prompt_carries_preamble_and_catalog() {
    let provider = ScriptedProvider::new(vec!["FINAL_ANSWER: [ok]"]);
    let bridge = StubBridge::calculator();
    let options = AgentOptions {
        system_prompt: Some("Answer tersely.".into()),
        server_guidance: Some("Integers only.".into()),
        ..AgentOptions::default()
    };
    let agent = agent_with(provider.clone(), &bridge, options);
    agent.run("q").await;

    let prompt = &provider.prompts().await[0];
    assert!(prompt.starts_with("Answer tersely.\n\n"));
    assert!(prompt.contains("1. add(a: integer, b: integer) - Add two numbers"));
    assert!(prompt.contains("2. subtract(a: integer, b: integer) - Subtract two numbers"));
    assert!(prompt.contains("Integers only."));
}

#[tokio::test]
async fn discovery_builds_catalog_from_bridge() {
    let bridge = StubBridge::calculator();
    let catalog = ToolCatalog::discover(&bridge).await.expect("discovery succeeds");
    assert_eq!(catalog.len(), 2);
    assert!(catalog.get("subtract").is_some());
}

#[tokio::test]
async fn iterate_threads_state_explicitly() {
    let provider = ScriptedProvider::new(vec!["FUNCTION_CALL: add|5|3"]);
    let bridge = StubBridge::calculator();
    let agent = agent(provider, &bridge);

    let iteration = agent.iterate("q", SessionState::new()).await;

    assert!(iteration.termination.is_none());
    assert_eq!(iteration.state.iteration_count, 1);
    assert_eq!(iteration.step.map(|s| s.output), Some("8".to_string()));
}

#[derive(Clone, Default)]
struct ErrorEvents(Arc<AtomicUsize>);

impl ErrorEvents {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for ErrorEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

async fn errors_logged_by<P: ModelProvider>(agent: &Agent<P>) -> usize {
    let events = ErrorEvents::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));
    agent.run("q").await;
    events.count()
}

#[tokio::test]
async fn terminal_failures_log_at_error_level() {
    let bridge = StubBridge::calculator();

    let fatal = agent(ScriptedProvider::new(vec!["FUNCTION_CALL: multiply|2|3"]), &bridge);
    assert_eq!(errors_logged_by(&fatal).await, 1);

    let failed = agent(ScriptedProvider::with_results(vec![Err("quota exceeded".into())]), &bridge);
    assert_eq!(errors_logged_by(&failed).await, 1);

    let malformed = agent(ScriptedProvider::new(vec!["I think the answer is 8"]), &bridge);
    assert_eq!(errors_logged_by(&malformed).await, 1);

    let answered = agent(ScriptedProvider::new(vec!["FINAL_ANSWER: [8]"]), &bridge);
    assert_eq!(errors_logged_by(&answered).await, 0);
}
