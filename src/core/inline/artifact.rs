//! Renderable artifact detection.
//!
//! Candidates come from explicit `<artifact type="..." title="...">` spans and
//! from fenced blocks in a known language. Only one artifact is surfaced per
//! message, chosen by type priority alone.

use super::fences::FencedBlock;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static ARTIFACT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<artifact\b([^>]*)>(.*?)</artifact\s*>").unwrap()
});
static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    React,
    Html,
    Svg,
    Mermaid,
    Python,
    Csv,
    Json,
    /// Tagged span whose `type` is missing or not recognised.
    #[serde(rename = "null")]
    Unclassified,
}

impl ArtifactKind {
    /// Lower ranks win.
    fn rank(self) -> u8 {
        match self {
            ArtifactKind::React => 0,
            ArtifactKind::Html => 1,
            ArtifactKind::Svg => 2,
            ArtifactKind::Mermaid => 3,
            ArtifactKind::Python => 4,
            ArtifactKind::Csv => 5,
            ArtifactKind::Json => 6,
            ArtifactKind::Unclassified => 7,
        }
    }

    /// Map a fence language or `type` attribute to a kind.
    pub fn from_lang(lang: &str) -> Option<Self> {
        match lang.trim().to_ascii_lowercase().as_str() {
            "react" | "jsx" | "tsx" => Some(ArtifactKind::React),
            "html" => Some(ArtifactKind::Html),
            "svg" => Some(ArtifactKind::Svg),
            "mermaid" => Some(ArtifactKind::Mermaid),
            "python" | "py" => Some(ArtifactKind::Python),
            "csv" => Some(ArtifactKind::Csv),
            "json" => Some(ArtifactKind::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::React => "react",
            ArtifactKind::Html => "html",
            ArtifactKind::Svg => "svg",
            ArtifactKind::Mermaid => "mermaid",
            ArtifactKind::Python => "python",
            ArtifactKind::Csv => "csv",
            ArtifactKind::Json => "json",
            ArtifactKind::Unclassified => "null",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub code: String,
    /// Language tag as written by the model (fence info or `type` attribute).
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the candidate came from an explicit `<artifact>` span.
    #[serde(skip)]
    tagged: bool,
}

fn tagged_candidates(text: &str) -> Vec<Artifact> {
    ARTIFACT_TAG_RE
        .captures_iter(text)
        .map(|caps| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

            let mut kind_attr = None;
            let mut title = None;
            for attr in ATTRIBUTE_RE.captures_iter(attrs) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                match attr[1].to_ascii_lowercase().as_str() {
                    "type" => kind_attr = Some(value),
                    "title" if !value.trim().is_empty() => title = Some(value.trim().to_string()),
                    _ => {}
                }
            }

            let language = kind_attr.unwrap_or_default();
            Artifact {
                kind: ArtifactKind::from_lang(&language).unwrap_or(ArtifactKind::Unclassified),
                code: body.trim_matches('\n').to_string(),
                language,
                title,
                tagged: true,
            }
        })
        .collect()
}

fn fenced_candidates(blocks: &[FencedBlock<'_>]) -> Vec<Artifact> {
    blocks
        .iter()
        .filter(|block| block.closed)
        .filter_map(|block| {
            let kind = ArtifactKind::from_lang(&block.lang)?;
            Some(Artifact {
                kind,
                code: block.body.to_string(),
                language: block.lang.clone(),
                title: None,
                tagged: false,
            })
        })
        .collect()
}

/// Every artifact candidate in document-independent order: tagged spans first,
/// then fenced blocks.
pub fn candidates(text: &str, blocks: &[FencedBlock<'_>]) -> Vec<Artifact> {
    let mut all = tagged_candidates(text);
    all.extend(fenced_candidates(blocks));
    all
}

/// Choose the artifact to surface: highest-priority kind wins. Within one kind
/// an explicit `<artifact>` span beats a fenced block, then the earlier one wins.
pub fn select(candidates: Vec<Artifact>) -> Option<Artifact> {
    candidates
        .into_iter()
        .enumerate()
        .min_by_key(|(index, artifact)| (artifact.kind.rank(), !artifact.tagged, *index))
        .map(|(_, artifact)| artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inline::fences::scan;

    fn pick(text: &str) -> Option<Artifact> {
        select(candidates(text, &scan(text)))
    }

    #[test]
    fn react_beats_html_regardless_of_order() {
        let html_first = "```html\n<p>hi</p>\n```\n\n```jsx\nexport default () => <p/>;\n```\n";
        let react_first = "```tsx\nexport default () => <p/>;\n```\n\n```html\n<p>hi</p>\n```\n";
        for text in [html_first, react_first] {
            let artifact = pick(text).unwrap();
            assert_eq!(artifact.kind, ArtifactKind::React);
            assert_eq!(artifact.code, "export default () => <p/>;");
        }
    }

    #[test]
    fn priority_order_is_fixed() {
        let text = "```json\n{}\n```\n```csv\na\n```\n```python\nx=1\n```\n```mermaid\ngraph TD\n```\n```svg\n<svg/>\n```\n";
        assert_eq!(pick(text).unwrap().kind, ArtifactKind::Svg);
        let text = "```json\n{}\n```\n```csv\na\n```\n";
        assert_eq!(pick(text).unwrap().kind, ArtifactKind::Csv);
    }

    #[test]
    fn unknown_languages_are_not_artifacts() {
        assert!(pick("```rust\nfn main() {}\n```\n").is_none());
        assert!(pick("```tool_elicit\n{\"tool\":\"x\"}\n```\n").is_none());
        assert!(pick("plain prose").is_none());
    }

    #[test]
    fn tagged_span_carries_title_and_type() {
        let text = r#"Here you go <artifact type="html" title=" Landing page ">
<h1>Hi</h1>
</artifact> done"#;
        let artifact = pick(text).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Html);
        assert_eq!(artifact.title.as_deref(), Some("Landing page"));
        assert_eq!(artifact.code, "<h1>Hi</h1>");
        assert_eq!(artifact.language, "html");
    }

    #[test]
    fn tagged_span_wins_within_the_same_kind() {
        let text = "```html\n<p>fenced</p>\n```\n<artifact type='html'><p>tagged</p></artifact>";
        assert_eq!(pick(text).unwrap().code, "<p>tagged</p>");
    }

    #[test]
    fn unrecognised_tag_type_is_lowest_priority() {
        let text = "<artifact type=\"diagram\">x</artifact>";
        let artifact = pick(text).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Unclassified);
        assert_eq!(artifact.kind.as_str(), "null");

        let text = "<artifact type=\"diagram\">x</artifact>\n```json\n{}\n```\n";
        assert_eq!(pick(text).unwrap().kind, ArtifactKind::Json);
    }

    #[test]
    fn unclosed_fence_is_not_an_artifact_yet() {
        assert!(pick("```html\n<div>").is_none());
    }
}
