//! Classifies model replies against the two-verb response grammar:
//!
//! ```text
//! FUNCTION_CALL: <name>|<p1>|<p2>|...
//! FINAL_ANSWER: <text>
//! ```

pub const FUNCTION_CALL_PREFIX: &str = "FUNCTION_CALL:";
pub const FINAL_ANSWER_PREFIX: &str = "FINAL_ANSWER:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    FunctionCall { name: String, raw_params: Vec<String> },
    FinalAnswer { text: String },
    Malformed { raw_text: String },
}

/// Total over every input; never fails.
///
/// Prefixes are case-sensitive and must open the reply after trimming.
/// A call must fit on one line and name a tool; every `|` segment after
/// the name is one positional parameter, whitespace-trimmed, and may be
/// empty. The answer payload is kept verbatim apart from the whitespace
/// that follows the prefix.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let text = raw.trim();

    if let Some(info) = text.strip_prefix(FUNCTION_CALL_PREFIX) {
        return parse_call(text, info);
    }

    if let Some(answer) = text.strip_prefix(FINAL_ANSWER_PREFIX) {
        return ParsedResponse::FinalAnswer {
            text: answer.trim_start().to_string(),
        };
    }

    malformed(text)
}

fn parse_call(text: &str, info: &str) -> ParsedResponse {
    if info.contains('\n') {
        return malformed(text);
    }

    let mut segments = info.split('|').map(str::trim);
    let name = match segments.next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return malformed(text),
    };
    let raw_params = segments.map(str::to_string).collect();

    ParsedResponse::FunctionCall { name, raw_params }
}

fn malformed(text: &str) -> ParsedResponse {
    ParsedResponse::Malformed {
        raw_text: text.to_string(),
    }
}
