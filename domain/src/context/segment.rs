//! Structural segmentation of phase context.
//!
//! Markdown headings and phase result markers (`[THINKING RESULT claude]`)
//! open a new segment that runs until the next marker. Unmarked body text is
//! split into paragraphs on blank lines.

use crate::util::first_sentence;

/// A contiguous piece of context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// Starts with a marker or carries a summary line
    pub priority: bool,
}

impl Segment {
    /// Marker line (if any) plus the first sentence of the body
    pub fn condensed(&self) -> String {
        let mut lines = self.text.lines();
        let first = lines.next().unwrap_or_default();
        if !is_marker(first) {
            return first_sentence(&self.text).to_string();
        }
        let body = lines.collect::<Vec<_>>().join("\n");
        let lead = first_sentence(&body);
        if lead.is_empty() {
            first.to_string()
        } else {
            format!("{}\n{}", first, lead)
        }
    }
}

/// Split `context` into segments in original order
pub fn segment_context(context: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut marked = false;

    for line in context.lines() {
        if is_marker(line) {
            flush(&mut segments, &mut current, marked);
            marked = true;
            current.push(line);
        } else if line.trim().is_empty() && !marked {
            flush(&mut segments, &mut current, marked);
        } else {
            current.push(line);
        }
    }
    flush(&mut segments, &mut current, marked);
    segments
}

/// Join segments back into a context string
pub fn join_segments<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> String {
    segments
        .into_iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn flush(segments: &mut Vec<Segment>, current: &mut Vec<&str>, marked: bool) {
    let text = current.join("\n");
    current.clear();
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let priority = marked || text.lines().any(is_summary_line);
    segments.push(Segment {
        text: text.to_string(),
        priority,
    });
}

/// Markdown heading or `[<PHASE> RESULT ...]` marker
pub fn is_marker(line: &str) -> bool {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix('#') {
        let rest = rest.trim_start_matches('#');
        let level = trimmed.len() - rest.len();
        return level <= 6 && (rest.is_empty() || rest.starts_with(' '));
    }
    if let Some(rest) = trimmed.strip_prefix('[')
        && let Some(end) = rest.find(']')
    {
        let mut words = rest[..end].split_whitespace();
        let phase = words.next().unwrap_or_default();
        return !phase.is_empty()
            && phase.chars().all(|c| c.is_ascii_uppercase() || c == '_')
            && words.next() == Some("RESULT");
    }
    false
}

/// `Summary:` line or summary heading
fn is_summary_line(line: &str) -> bool {
    let label = line
        .trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .to_ascii_lowercase();
    label == "summary" || label.starts_with("summary:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert!(is_marker("# Title"));
        assert!(is_marker("### Risks"));
        assert!(is_marker("[THINKING RESULT claude]"));
        assert!(is_marker("[DEBATE RESULT round 1]"));
        assert!(!is_marker("#hashtag"));
        assert!(!is_marker("[see RESULT]"));
        assert!(!is_marker("[link](http://example.com)"));
        assert!(!is_marker("plain text"));
    }

    #[test]
    fn test_marked_segment_spans_blank_lines() {
        let context = "[THINKING RESULT claude]\nFirst.\n\nSecond.\n## Next\nbody";
        let segments = segment_context(context);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "[THINKING RESULT claude]\nFirst.\n\nSecond.");
        assert!(segments.iter().all(|s| s.priority));
    }

    #[test]
    fn test_body_paragraphs_split_on_blank_lines() {
        let context = "one\ncontinued\n\n\ntwo\n\nSummary: three";
        let segments = segment_context(context);
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one\ncontinued", "two", "Summary: three"]);
        assert_eq!(
            segments.iter().map(|s| s.priority).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[test]
    fn test_condensed() {
        let marked = Segment {
            text: "[VOTING RESULT codex]\nApprove it. Long explanation follows.".to_string(),
            priority: true,
        };
        assert_eq!(marked.condensed(), "[VOTING RESULT codex]\nApprove it.");

        let bare = Segment {
            text: "## Heading".to_string(),
            priority: true,
        };
        assert_eq!(bare.condensed(), "## Heading");

        let body = Segment {
            text: "Plain body. More words.".to_string(),
            priority: false,
        };
        assert_eq!(body.condensed(), "Plain body.");
    }

    #[test]
    fn test_join_round_trips_simple_context() {
        let context = "# A\nalpha\n\n# B\nbeta";
        let segments = segment_context(context);
        assert_eq!(join_segments(&segments), context);
    }
}
