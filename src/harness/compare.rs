//! Output normalization for sample comparison.

/// Normalize program output for comparison.
///
/// - CRLF and lone CR become LF
/// - trailing whitespace is stripped from every line
/// - leading and trailing blank space of the whole text is trimmed
pub fn normalize_output(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    lines.join("\n").trim().to_string()
}

/// Exact equality after normalization.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    normalize_output(expected) == normalize_output(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_do_not_matter() {
        assert!(outputs_match("4\n", "4\r\n"));
        assert!(outputs_match("3\n", "3\r\n"));
        assert!(outputs_match("1\n2\n", "1\r\n2\r\n"));
        assert!(outputs_match("1\n2", "1\r2\r"));
    }

    #[test]
    fn trailing_whitespace_does_not_matter() {
        assert!(outputs_match("4\n", "4 \n"));
        assert!(outputs_match("1 2\n3", "1 2  \n3\t\n\n"));
        assert!(outputs_match("\n  Yes\n", "Yes"));
    }

    #[test]
    fn content_differences_still_fail() {
        assert!(!outputs_match("4\n", "5\n"));
        assert!(!outputs_match("1 2\n", "1  2\n"));
        assert!(!outputs_match("1\n2\n", "1\n\n2\n"));
    }
}
