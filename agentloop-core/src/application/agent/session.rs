use serde::Serialize;

/// Per-query conversation memory. Reset at the start of every query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub iteration_count: usize,
    pub last_result: Option<String>,
    pub transcript: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingFirstPrompt,
    AwaitingToolResult,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn phase(&self) -> SessionPhase {
        if self.transcript.is_empty() {
            SessionPhase::AwaitingFirstPrompt
        } else {
            SessionPhase::AwaitingToolResult
        }
    }

    /// Append one transcript entry for a dispatched call.
    pub fn record(&mut self, entry: String, result: String) {
        self.transcript.push(entry);
        self.last_result = Some(result);
        self.iteration_count += 1;
    }
}
