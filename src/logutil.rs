//! Helpers for keeping narrative text (summaries, feelings, ids) on a single
//! log line. Event summaries are free text and routinely carry newlines.

/// Longest stretch of user text copied into one log record.
const MAX_LOGGED_CHARS: usize = 200;

/// Escape control characters and cap the length at [`MAX_LOGGED_CHARS`].
pub fn escape_log(s: &str) -> String {
    escape_with_limit(s, MAX_LOGGED_CHARS)
}

/// Escape `s` for single-line logging, keeping at most `limit` source chars.
/// Backslash, `\n`, `\r` and `\t` get their usual escapes; other control
/// characters become `\xNN`. Truncation is marked with `…`.
pub fn escape_with_limit(s: &str, limit: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(s.len().min(limit) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count == limit {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_summary_becomes_one_line() {
        let esc = escape_log("argued\nat dinner\r\tthen left");
        assert_eq!(esc, "argued\\nat dinner\\r\\tthen left");
    }

    #[test]
    fn long_text_is_truncated() {
        let esc = escape_with_limit("abcdef", 3);
        assert_eq!(esc, "abc…");
        assert_eq!(escape_with_limit("abc", 3), "abc");
    }

    #[test]
    fn other_controls_are_hex_escaped() {
        assert_eq!(escape_log("a\u{7}b"), "a\\x07b");
    }
}
