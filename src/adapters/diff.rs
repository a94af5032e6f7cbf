// Diff attachments for failed comparisons

use crate::lifecycle::AllureLifecycle;
use dissimilar::{diff, Chunk};
use serde_json::Value;
use std::fmt::Write;

/// Inline diff: `[-removed-]{+added+}`, unchanged text as is
pub fn render_diff(expected: &str, actual: &str) -> String {
    let mut output = String::new();
    for chunk in diff(expected, actual) {
        let _ = match chunk {
            Chunk::Equal(text) => write!(output, "{}", text),
            Chunk::Delete(text) => write!(output, "[-{}-]", text),
            Chunk::Insert(text) => write!(output, "{{+{}+}}", text),
        };
    }
    output
}

/// Attaches a diff of two texts to the running test or step. Equal texts
/// attach nothing. Returns whether they differed.
pub fn attach_diff(lifecycle: &AllureLifecycle, expected: &str, actual: &str) -> bool {
    if expected == actual {
        return false;
    }
    let body = format!(
        "Expected - / Actual +\n\n{}\n",
        render_diff(expected, actual)
    );
    lifecycle.add_attachment("Diff", "text/plain", ".diff", body.as_bytes());
    true
}

/// JSON variant of `attach_diff`, comparing pretty-printed documents
pub fn attach_json_diff(lifecycle: &AllureLifecycle, expected: &Value, actual: &Value) -> bool {
    if expected == actual {
        return false;
    }
    let expected = serde_json::to_string_pretty(expected).unwrap_or_else(|_| expected.to_string());
    let actual = serde_json::to_string_pretty(actual).unwrap_or_else(|_| actual.to_string());
    attach_diff(lifecycle, &expected, &actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_diff_marks_changes() {
        let out = render_diff("name: Alice", "name: Bob");
        assert!(out.starts_with("name: "));
        assert!(out.contains("[-"));
        assert!(out.contains("{+"));
        assert!(out.contains("Alice") || out.contains("lice"));
    }

    #[test]
    fn test_equal_json_attaches_nothing() {
        let writer = std::sync::Arc::new(crate::writer::InMemoryResultsWriter::new());
        let lifecycle = AllureLifecycle::new(writer.clone());
        let value = json!({"age": 30});
        assert!(!attach_json_diff(&lifecycle, &value, &value));
        assert!(writer.attachments().is_empty());
    }
}
