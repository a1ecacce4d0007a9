//! Stable encoding of multi-part reasoning.
//!
//! Adapters that decompose a multi-step trace concatenate each step's
//! reasoning into a single `reasoning` string. Segments are separated by the
//! ASCII record separator and each segment's label is separated from its text
//! by the ASCII unit separator. Both characters are stripped from the input,
//! so `split_reasoning(&join_reasoning(s)) == s` for any segments.

use serde::{Deserialize, Serialize};

/// Separates segments.
pub const SEGMENT_SEPARATOR: char = '\u{1e}';
/// Separates a segment's label from its text.
pub const LABEL_SEPARATOR: char = '\u{1f}';

/// One labelled piece of reasoning, e.g. a single sub-agent's rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningSegment {
    pub label: String,
    pub text: String,
}

impl ReasoningSegment {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: strip_separators(&label.into()),
            text: strip_separators(&text.into()),
        }
    }
}

fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| *c != SEGMENT_SEPARATOR && *c != LABEL_SEPARATOR)
        .collect()
}

/// Joins segments into one reasoning string.
pub fn join_reasoning(segments: &[ReasoningSegment]) -> String {
    segments
        .iter()
        .map(|s| {
            format!(
                "{}{}{}",
                strip_separators(&s.label),
                LABEL_SEPARATOR,
                strip_separators(&s.text)
            )
        })
        .collect::<Vec<_>>()
        .join(&SEGMENT_SEPARATOR.to_string())
}

/// Splits a reasoning string produced by [`join_reasoning`].
///
/// Plain reasoning without separators comes back as a single unlabelled
/// segment; an empty string yields no segments.
pub fn split_reasoning(reasoning: &str) -> Vec<ReasoningSegment> {
    if reasoning.is_empty() {
        return Vec::new();
    }
    reasoning
        .split(SEGMENT_SEPARATOR)
        .map(|part| match part.split_once(LABEL_SEPARATOR) {
            Some((label, text)) => ReasoningSegment {
                label: label.to_string(),
                text: text.to_string(),
            },
            None => ReasoningSegment {
                label: String::new(),
                text: part.to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_then_split() {
        let segments = vec![
            ReasoningSegment::new("researcher", "market is growing"),
            ReasoningSegment::new("critic", "valuation: stretched\n- see notes"),
            ReasoningSegment::new("coordinator", ""),
        ];
        let joined = join_reasoning(&segments);
        assert_eq!(split_reasoning(&joined), segments);
    }

    #[test]
    fn test_separators_in_input_are_stripped() {
        let segments = vec![ReasoningSegment::new("a\u{1e}b", "x\u{1f}y")];
        let joined = join_reasoning(&segments);
        let split = split_reasoning(&joined);
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].label, "ab");
        assert_eq!(split[0].text, "xy");
    }

    #[test]
    fn test_plain_reasoning() {
        let split = split_reasoning("just because");
        assert_eq!(split, vec![ReasoningSegment::new("", "just because")]);
        assert!(split_reasoning("").is_empty());
    }
}
