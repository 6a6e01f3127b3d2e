#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use similar::{ChangeTag, TextDiff};

/// Longest diagnostic kept in a test case message.
pub const MESSAGE_TRUNCATE: usize = 4_000;

/// Converts `\r\n` and lone `\r` line endings to `\n`.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Removes the common leading whitespace of all non-blank lines.
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalizes a transcript before comparing it: line endings are unified,
/// trailing whitespace is stripped from every line and leading/trailing blank
/// lines are dropped.
pub fn normalize_output(text: &str) -> String {
    let unified = normalize_newlines(text);
    let lines = unified.lines().map(str::trim_end).collect::<Vec<_>>();

    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map(|i| i + 1)
        .unwrap_or(start);

    lines[start..end.max(start)].join("\n")
}

/// Renders a line diff between `expected` and `actual`, `-` marking expected
/// lines that are missing and `+` marking unexpected ones.
pub fn explain_mismatch(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        out.push_str(sign);
        out.push_str(change.value().trim_end_matches('\n'));
        out.push('\n');
    }
    out
}

/// Truncates `content` to the provided `limit`, appending a notice to indicate
/// omitted output.
pub fn truncate_with_notice(content: &str, limit: usize) -> String {
    if content.len() <= limit {
        return content.to_string();
    }

    let mut end = limit;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }

    let mut truncated = content[..end].to_string();
    if let Some(index) = truncated.rfind('\n') {
        truncated.truncate(index);
    }

    truncated.push_str("\n...[TRUNCATED]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedent_strips_common_indent() {
        let text = "    >>> 1 + 1\n    2\n\n      nested";
        assert_eq!(dedent(text), ">>> 1 + 1\n2\n\n  nested");
    }

    #[test]
    fn normalize_output_ignores_trailing_whitespace_and_blank_edges() {
        assert_eq!(normalize_output("\n\nhello   \r\nworld\t\n\n"), "hello\nworld");
        assert_eq!(normalize_output("   \n"), "");
        assert_eq!(normalize_output(""), "");
    }

    #[test]
    fn mismatch_marks_changed_lines() {
        let explained = explain_mismatch("a\nb\n", "a\nc\n");
        assert_eq!(explained, " a\n-b\n+c\n");
    }

    #[test]
    fn truncation_keeps_whole_lines() {
        let text = "line one\nline two\nline three";
        assert_eq!(truncate_with_notice(text, 12), "line one\n...[TRUNCATED]");
        assert_eq!(truncate_with_notice(text, 100), text);
    }
}
