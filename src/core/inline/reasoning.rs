//! `<thinking>` / `<think>` reasoning blocks.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static OPEN_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*(thinking|think)\s*>").unwrap());
static CLOSE_THINKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*/\s*thinking\s*>").unwrap());
static CLOSE_THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*/\s*think\s*>").unwrap());

const TAG_PREFIXES: &[&str] = &["<thinking>", "<think>", "</thinking>", "</think>"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    /// `open` is true while the closing tag has not arrived yet.
    Thinking { text: String, open: bool },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text { text } | Segment::Thinking { text, .. } => text,
        }
    }

    pub fn is_thinking(&self) -> bool {
        matches!(self, Segment::Thinking { .. })
    }
}

fn closer_for(tag_name: &str) -> &'static Regex {
    if tag_name.eq_ignore_ascii_case("thinking") {
        &CLOSE_THINKING_RE
    } else {
        &CLOSE_THINK_RE
    }
}

/// Split `text` into plain and reasoning segments without trimming. Tags are
/// removed; concatenating the segment texts yields the input minus its tags.
/// Empty segments are dropped.
///
/// An opening tag only pairs with a closing tag of the same name. A block that
/// is still open at the end of the buffer is reported with `open: true` unless
/// `complete` is set, in which case whatever arrived counts as finished.
pub fn split_raw(text: &str, complete: bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(open) = OPEN_TAG_RE.captures(rest) {
        let Some(whole) = open.get(0) else { break };
        let name = open.get(1).map(|m| m.as_str()).unwrap_or("think");

        push_text(&mut segments, &rest[..whole.start()]);

        let body = &rest[whole.end()..];
        match closer_for(name).find(body) {
            Some(close) => {
                push_thinking(&mut segments, &body[..close.start()], false);
                rest = &body[close.end()..];
            }
            None => {
                let body = if complete {
                    body
                } else {
                    strip_partial_tag(body)
                };
                push_thinking(&mut segments, body, !complete);
                return segments;
            }
        }
    }

    let tail = if complete {
        rest
    } else {
        strip_partial_tag(rest)
    };
    push_text(&mut segments, tail);
    segments
}

/// Split and whitespace-trim, dropping segments that become empty.
pub fn split(text: &str, complete: bool) -> Vec<Segment> {
    split_raw(text, complete)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Text { text } => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| Segment::Text {
                    text: trimmed.to_string(),
                })
            }
            Segment::Thinking { text, open } => {
                let trimmed = text.trim();
                // An open block is kept even when empty so it can render as in progress.
                (!trimmed.is_empty() || open).then(|| Segment::Thinking {
                    text: trimmed.to_string(),
                    open,
                })
            }
        })
        .collect()
}

/// Drop a trailing fragment that could still grow into a tag, so half-arrived
/// markup like `<thin` is not flashed as visible text mid-stream.
fn strip_partial_tag(text: &str) -> &str {
    let Some(lt) = text.rfind('<') else {
        return text;
    };
    let tail = text[lt..].to_ascii_lowercase();
    if tail.len() < "</thinking>".len()
        && TAG_PREFIXES
            .iter()
            .any(|tag| tag.starts_with(&tail) && tail.len() < tag.len())
    {
        &text[..lt]
    } else {
        text
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text { text: prev }) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Text {
            text: text.to_string(),
        });
    }
}

fn push_thinking(segments: &mut Vec<Segment>, text: &str, open: bool) {
    if text.is_empty() && !open {
        return;
    }
    segments.push(Segment::Thinking {
        text: text.to_string(),
        open,
    });
}

/// Text with every complete reasoning block removed.
pub fn visible_text(text: &str, complete: bool) -> String {
    split_raw(text, complete)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Text { text } => Some(text),
            Segment::Thinking { .. } => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text { text: s.into() }
    }

    fn thinking(s: &str) -> Segment {
        Segment::Thinking {
            text: s.into(),
            open: false,
        }
    }

    #[test]
    fn splits_the_documented_example() {
        let segments = split("Before <thinking>step one</thinking> After", true);
        assert_eq!(segments, vec![text("Before"), thinking("step one"), text("After")]);
    }

    #[test]
    fn accepts_both_tag_names_case_insensitively() {
        let segments = split("<THINK>a</think>b<Thinking>c</THINKING>", true);
        assert_eq!(segments, vec![thinking("a"), text("b"), thinking("c")]);
    }

    #[test]
    fn opening_tag_only_matches_its_own_closer() {
        let segments = split("<thinking>x</think> y</thinking>z", true);
        assert_eq!(segments, vec![thinking("x</think> y"), text("z")]);
    }

    #[test]
    fn raw_segments_reassemble_to_untagged_text() {
        let inputs = [
            "Before <thinking>step one</thinking> After",
            "<think>\n  plan\n</think>\n\nAnswer: 42\n",
            "a<think>b</think>c<thinking>d</thinking>e",
            "no tags at all",
            "<THINK></THINK>empty block",
        ];
        for input in inputs {
            let rebuilt: String = split_raw(input, true)
                .iter()
                .map(|s| s.text().to_string())
                .collect();
            let stripped = OPEN_TAG_RE.replace_all(input, "");
            let stripped = CLOSE_THINKING_RE.replace_all(&stripped, "");
            let stripped = CLOSE_THINK_RE.replace_all(&stripped, "");
            assert_eq!(rebuilt, stripped, "input: {input:?}");
        }
    }

    #[test]
    fn unclosed_block_is_open_while_streaming() {
        let segments = split("Intro <thinking>still going", false);
        assert_eq!(
            segments,
            vec![
                text("Intro"),
                Segment::Thinking {
                    text: "still going".into(),
                    open: true
                }
            ]
        );
    }

    #[test]
    fn unclosed_block_is_finished_when_stream_completes() {
        let segments = split("Intro <thinking>cut off", true);
        assert_eq!(segments, vec![text("Intro"), thinking("cut off")]);
    }

    #[test]
    fn reparsing_growing_buffer_is_stable_across_chunk_boundaries() {
        let full = "Hi <think>reason</think> done";
        let mut buffer = String::new();
        for ch in full.chars() {
            buffer.push(ch);
            let segments = split(&buffer, false);
            for segment in &segments {
                if let Segment::Text { text } = segment {
                    assert!(!text.ends_with("<thi"), "partial tag leaked: {buffer:?}");
                }
            }
        }
        assert_eq!(
            split(&buffer, true),
            vec![text("Hi"), thinking("reason"), text("done")]
        );
    }

    #[test]
    fn partial_tag_is_held_back_only_while_streaming() {
        assert_eq!(visible_text("Answer <thi", false), "Answer ");
        assert_eq!(visible_text("Answer <thi", true), "Answer <thi");
        assert_eq!(visible_text("a < b", false), "a < b");
    }

    #[test]
    fn empty_open_block_is_reported_while_streaming() {
        let segments = split("<thinking>", false);
        assert_eq!(
            segments,
            vec![Segment::Thinking {
                text: String::new(),
                open: true
            }]
        );
    }
}
