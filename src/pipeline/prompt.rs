use crate::util::truncate_chars;

/// Human-readable language name for a code fence tag.
pub fn language_name(fence_tag: &str) -> &str {
    match fence_tag.to_ascii_lowercase().as_str() {
        "rust" | "rs" => "Rust",
        "cpp" | "c++" => "C++",
        "python" | "py" => "Python",
        "go" => "Go",
        "java" => "Java",
        _ => fence_tag,
    }
}

/// Build the generation prompt for a problem statement.
///
/// The statement is truncated to `max_chars` characters so the request body
/// stays bounded. A blank statement yields an empty prompt, which the
/// failover orchestrator rejects before any network call.
pub fn build_prompt(statement: &str, fence_tag: &str, max_chars: usize) -> String {
    let statement = statement.trim();
    if statement.is_empty() {
        return String::new();
    }
    let body = truncate_chars(statement, max_chars);
    let language = language_name(fence_tag);

    format!(
        "Solve the following competitive programming problem in {language}.\n\
         Read the input from standard input and write the answer to standard output.\n\
         Reply with one complete program inside a single ```{tag} code block.\n\
         \n\
         {body}\n",
        language = language,
        tag = fence_tag,
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_language_and_fence() {
        let prompt = build_prompt("Add A and B.", "rust", 100);
        assert!(prompt.contains("in Rust."));
        assert!(prompt.contains("```rust code block"));
        assert!(prompt.ends_with("Add A and B.\n"));
    }

    #[test]
    fn statement_is_truncated() {
        let statement = "x".repeat(50);
        let prompt = build_prompt(&statement, "cpp", 10);
        assert!(prompt.contains(&"x".repeat(10)));
        assert!(!prompt.contains(&"x".repeat(11)));
        assert!(prompt.contains("in C++."));
    }

    #[test]
    fn blank_statement_gives_empty_prompt() {
        assert_eq!(build_prompt("  \n\t", "rust", 100), "");
    }

    #[test]
    fn unknown_tag_is_used_verbatim() {
        assert_eq!(language_name("zig"), "zig");
        assert_eq!(language_name("RS"), "Rust");
    }
}
