//! Program extraction from model responses

const FENCE: &str = "```";

/// Body of the first fenced code block, or the whole response trimmed.
///
/// The info string after the opening fence (`rhai`, `rust`, ...) is
/// skipped. An unterminated fence runs to the end of the text.
pub fn extract_program(response: &str) -> &str {
    let Some(open) = response.find(FENCE) else {
        return response.trim();
    };
    let after_fence = &response[open + FENCE.len()..];
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => after_fence,
    };
    match body.find(FENCE) {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}
