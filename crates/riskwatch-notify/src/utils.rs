//! Utility functions for notification channels

/// Maximum length of a response body kept in logs
pub const MAX_BODY_LENGTH: usize = 2000;

/// Truncate a string to at most `max_len` bytes, on a char boundary
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

/// Escape `s` for insertion between the quotes of a JSON string literal
pub fn json_escape(s: &str) -> String {
    let quoted = serde_json::Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 5), "hello... [truncated]");
        // 3-byte chars must not be split
        assert_eq!(truncate_string("风险提醒", 4), "风... [truncated]");
    }

    #[test]
    fn test_json_escape() {
        assert_eq!(json_escape("plain"), "plain");
        assert_eq!(json_escape("a \"quote\"\nline"), "a \\\"quote\\\"\\nline");
        assert_eq!(json_escape("任务"), "任务");
    }
}
