//! Embedded sub-protocols in free-form assistant text.
//!
//! Three grammars are recognised independently of one another: reasoning
//! blocks, `tool_elicit` fences and artifacts. Every entry point re-scans the
//! whole buffer, so calling [`parse`] again after each streamed delta is safe
//! even when a tag or fence straddles two deltas. Malformed input degrades to
//! plain text; nothing here returns an error.

pub mod artifact;
pub mod fences;
pub mod reasoning;
pub mod tool_elicit;

pub use artifact::{Artifact, ArtifactKind};
pub use reasoning::Segment;
pub use tool_elicit::ToolElicitRequest;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMessage {
    pub segments: Vec<Segment>,
    pub tool_requests: Vec<ToolElicitRequest>,
    pub artifact: Option<Artifact>,
    /// A `tool_elicit` fence has opened but not closed yet.
    pub tool_block_in_progress: bool,
}

/// Parse an accumulated buffer. `complete` marks the end of the stream, which
/// finalises any reasoning block that never closed.
pub fn parse(text: &str, complete: bool) -> ParsedMessage {
    let blocks = fences::scan(text);
    ParsedMessage {
        segments: reasoning::split(text, complete),
        tool_requests: tool_elicit::extract(&blocks),
        artifact: artifact::select(artifact::candidates(text, &blocks)),
        tool_block_in_progress: !complete && tool_elicit::has_open_block(&blocks),
    }
}

pub fn tool_requests(text: &str) -> Vec<ToolElicitRequest> {
    tool_elicit::extract(&fences::scan(text))
}

pub fn find_artifact(text: &str) -> Option<Artifact> {
    let blocks = fences::scan(text);
    artifact::select(artifact::candidates(text, &blocks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammars_overlap_without_interfering() {
        let text = "<thinking>\nI should ask for the time.\n```tool_elicit\n{\"tool\":\"current_time\"}\n```\n</thinking>\nHere is a page:\n```html\n<p>hi</p>\n```\n";
        let parsed = parse(text, true);

        assert_eq!(parsed.tool_requests.len(), 1);
        assert_eq!(parsed.tool_requests[0].tool, "current_time");
        assert_eq!(parsed.artifact.as_ref().map(|a| a.kind), Some(ArtifactKind::Html));
        assert!(parsed.segments[0].is_thinking());
        assert!(parsed.segments[0].text().contains("tool_elicit"));
        assert!(!parsed.tool_block_in_progress);
    }

    #[test]
    fn incremental_parse_converges_on_final_parse() {
        let text = "Sure.\n```tool_elicit\n{\"tool\": \"generate_uuid\", \"reason\": \"id\"}\n```\nDone.";
        let mut buffer = String::new();
        let mut saw_in_progress = false;
        for chunk in text.as_bytes().chunks(7) {
            buffer.push_str(std::str::from_utf8(chunk).unwrap());
            let parsed = parse(&buffer, false);
            saw_in_progress |= parsed.tool_block_in_progress;
        }
        assert!(saw_in_progress);
        assert_eq!(parse(&buffer, true), parse(text, true));
        assert_eq!(tool_requests(&buffer).len(), 1);
    }

    #[test]
    fn malformed_blocks_degrade_to_text() {
        let parsed = parse("```tool_elicit\n{oops\n```\nstill readable", true);
        assert!(parsed.tool_requests.is_empty());
        assert!(parsed.artifact.is_none());
        assert_eq!(parsed.segments.len(), 1);
    }

    #[test]
    fn find_artifact_prefers_react() {
        let text = "```html\n<b/>\n```\n```react\nconst A = () => null;\n```\n";
        assert_eq!(find_artifact(text).unwrap().kind, ArtifactKind::React);
    }
}
