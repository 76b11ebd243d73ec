//! Line-oriented scanner for Markdown fenced code blocks.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// First word of the info string, lowercased. Empty when absent.
    pub lang: String,
    pub info: &'a str,
    pub body: &'a str,
    /// False when the buffer ended before the closing fence.
    pub closed: bool,
}

struct Fence<'a> {
    marker: u8,
    len: usize,
    info: &'a str,
}

fn opening_fence(line: &str) -> Option<Fence<'_>> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = *rest.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let len = rest.bytes().take_while(|b| *b == marker).count();
    if len < 3 {
        return None;
    }
    let info = rest[len..].trim();
    if marker == b'`' && info.contains('`') {
        return None;
    }
    Some(Fence { marker, len, info })
}

fn is_closing_fence(line: &str, open: &Fence<'_>) -> bool {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return false;
    }
    let len = trimmed.bytes().take_while(|b| *b == open.marker).count();
    len >= open.len && trimmed[len..].trim().is_empty()
}

/// Every fenced block in `text`, in document order. A fence left open at the
/// end of the buffer yields a block whose body runs to the end.
pub fn scan(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut open: Option<(Fence<'_>, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);

        match &open {
            None => {
                if let Some(fence) = opening_fence(content) {
                    open = Some((fence, offset));
                }
            }
            Some((fence, body_start)) => {
                if is_closing_fence(content, fence) {
                    blocks.push(make_block(fence, &text[*body_start..line_start], true));
                    open = None;
                }
            }
        }
    }

    if let Some((fence, body_start)) = open {
        blocks.push(make_block(&fence, &text[body_start.min(text.len())..], false));
    }

    blocks
}

fn make_block<'a>(fence: &Fence<'a>, body: &'a str, closed: bool) -> FencedBlock<'a> {
    let lang = fence
        .info
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    FencedBlock {
        lang,
        info: fence.info,
        body: body
            .strip_suffix('\n')
            .map(|b| b.strip_suffix('\r').unwrap_or(b))
            .unwrap_or(body),
        closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_closed_blocks_with_language() {
        let text = "intro\n```Python title\nprint(1)\n```\nafter\n~~~\nplain\n~~~\n";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lang, "python");
        assert_eq!(blocks[0].info, "Python title");
        assert_eq!(blocks[0].body, "print(1)");
        assert!(blocks[0].closed);
        assert_eq!(blocks[1].lang, "");
        assert_eq!(blocks[1].body, "plain");
    }

    #[test]
    fn unclosed_block_runs_to_end() {
        let blocks = scan("```json\n{\"a\": 1");
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].closed);
        assert_eq!(blocks[0].body, "{\"a\": 1");
    }

    #[test]
    fn shorter_or_different_fences_do_not_close() {
        let text = "````md\n```\ninner\n```\n~~~\n````\n";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].body, "```\ninner\n```\n~~~");
    }

    #[test]
    fn indented_code_is_not_a_fence() {
        assert!(scan("    ```rust\n    x\n    ```\n").is_empty());
    }

    #[test]
    fn handles_crlf_line_endings() {
        let blocks = scan("```csv\r\na,b\r\n```\r\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lang, "csv");
        assert_eq!(blocks[0].body, "a,b");
    }
}
