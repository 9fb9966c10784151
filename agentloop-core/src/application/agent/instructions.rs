use super::catalog::ToolCatalog;
use super::parser::{FINAL_ANSWER_PREFIX, FUNCTION_CALL_PREFIX};
use super::session::{SessionPhase, SessionState};

/// Build the fixed system instructions for a session: role, tool catalog,
/// reply grammar and examples.
pub fn compose_system_instructions(catalog: &ToolCatalog, server_guidance: Option<&str>) -> String {
    let mut sections = vec![
        "You are an agent that solves problems step by step by calling tools. You have access to various tools."
            .to_string(),
    ];

    if let Some(guidance) = server_guidance.map(str::trim).filter(|g| !g.is_empty()) {
        sections.push(format!("Tool server guidance:\n{guidance}"));
    }

    let description = catalog.describe();
    if description.is_empty() {
        sections.push("Available tools:\nNo tools are currently available.".to_string());
    } else {
        sections.push(format!("Available tools:\n{description}"));
    }

    sections.push(format!(
        "You must respond with EXACTLY ONE line in one of these formats (no additional text):\n\
         1. For function calls:\n   {FUNCTION_CALL_PREFIX} function_name|param1|param2|...\n\
         2. For final answers:\n   {FINAL_ANSWER_PREFIX} [result]"
    ));

    sections.push(
        "Important:\n\
         - When a function returns multiple values, you need to process all of them\n\
         - Only give FINAL_ANSWER when you have completed all necessary calculations\n\
         - Do not repeat function calls with the same parameters"
            .to_string(),
    );

    sections.push(format!(
        "Examples:\n\
         - {FUNCTION_CALL_PREFIX} add|5|3\n\
         - {FUNCTION_CALL_PREFIX} open_freeform\n\
         - {FINAL_ANSWER_PREFIX} [42]"
    ));

    sections.push(format!(
        "DO NOT include any explanations or additional text.\n\
         Your entire response should be a single line starting with either {FUNCTION_CALL_PREFIX} or {FINAL_ANSWER_PREFIX}"
    ));

    sections.join("\n\n")
}

/// Prompt for the next generation: instructions, the query, and from the
/// second cycle on the transcript followed by a request for the next step.
pub fn build_prompt(system_prompt: &str, query: &str, state: &SessionState) -> String {
    match state.phase() {
        SessionPhase::AwaitingFirstPrompt => format!("{system_prompt}\n\nQuery: {query}"),
        SessionPhase::AwaitingToolResult => format!(
            "{system_prompt}\n\nQuery: {query}\n\n{}  What should I do next?",
            state.transcript.join(" ")
        ),
    }
}
