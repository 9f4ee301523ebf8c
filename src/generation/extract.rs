//! Pull program source out of a generate reply.

use crate::llm::{GenerateContentResponse, LlmError};

/// Parse a success body and return the program text it carries.
///
/// Empty or malformed payloads are `ParseError`s.
pub fn extract_program(body: &str, fence_tag: &str) -> Result<String, LlmError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::parse_error(format!("Failed to parse response: {}", e)))?;

    let text = parsed
        .first_text()
        .ok_or_else(|| LlmError::parse_error("No candidate text in response".to_string()))?;

    let code = extract_code(text, fence_tag);
    if code.trim().is_empty() {
        return Err(LlmError::parse_error(
            "Candidate text contains no program".to_string(),
        ));
    }
    Ok(code)
}

/// Strip code-fence markup.
///
/// Prefers the first block fenced with `fence_tag`, then the first fenced
/// block of any tag, and otherwise returns `text` unchanged.
pub fn extract_code(text: &str, fence_tag: &str) -> String {
    let blocks = fenced_blocks(text);
    blocks
        .iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case(fence_tag))
        .or_else(|| blocks.first())
        .map(|(_, body)| body.clone())
        .unwrap_or_else(|| text.to_string())
}

/// `(info tag, body)` for every fenced block. An unterminated block runs to
/// the end of the text.
fn fenced_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let tag = info.split_whitespace().next().unwrap_or("").to_string();
                    current = Some((tag, Vec::new()));
                }
            }
            Some((tag, mut body)) => {
                if trimmed.starts_with("```") {
                    blocks.push((tag, join_lines(&body)));
                } else {
                    body.push(line);
                    current = Some((tag, body));
                }
            }
        }
    }
    if let Some((tag, body)) = current {
        blocks.push((tag, join_lines(&body)));
    }
    blocks
}

fn join_lines(lines: &[&str]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
