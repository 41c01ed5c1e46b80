//! Shared text helpers.

/// Truncate a string to at most `max_chars` characters.
///
/// Returns a sub-slice of the original string, always ending on a character
/// boundary. Strings that are already short enough are returned unchanged.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// First sentence of `s`, or the first line if no sentence terminator is found.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or end of input.
pub fn first_sentence(s: &str) -> &str {
    let s = s.trim();
    let line = s.lines().next().unwrap_or_default();
    let mut chars = line.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                None => return line,
                Some((_, next)) if next.is_whitespace() => return &line[..idx + c.len_utf8()],
                _ => {}
            }
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_ascii() {
        assert_eq!(truncate_chars("hello world", 5), "hello");
    }

    #[test]
    fn truncate_no_op_when_short() {
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let s = "あのね"; // 9 bytes, 3 chars
        assert_eq!(truncate_chars(s, 1), "あ");
        assert_eq!(truncate_chars(s, 2), "あの");
        assert_eq!(truncate_chars(s, 3), "あのね");
        assert_eq!(truncate_chars(s, 0), "");
    }

    #[test]
    fn first_sentence_stops_at_terminator() {
        assert_eq!(first_sentence("Ship it. Then watch the logs."), "Ship it.");
        assert_eq!(first_sentence("Really? Yes."), "Really?");
        assert_eq!(first_sentence("version 1.2 is out"), "version 1.2 is out");
    }

    #[test]
    fn first_sentence_falls_back_to_first_line() {
        assert_eq!(first_sentence("  no terminator here\nsecond line"), "no terminator here");
        assert_eq!(first_sentence(""), "");
    }
}
