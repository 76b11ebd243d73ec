//! Files attached to a user turn.

use crate::core::message::ContentPart;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Text files larger than this are not inlined.
pub const MAX_INLINE_TEXT_BYTES: u64 = 256 * 1024;
/// Images larger than this are not embedded.
pub const MAX_INLINE_IMAGE_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Text,
    Pdf,
    Audio,
    Unknown,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Text => "text",
            FileKind::Pdf => "pdf",
            FileKind::Audio => "audio",
            FileKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Base64 payload for binary files small enough to embed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_data: Option<String>,
    pub size: u64,
}

#[derive(Debug)]
pub enum AttachmentError {
    Read { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentError::Read { path, source } => {
                write!(f, "Failed to read attachment {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for AttachmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AttachmentError::Read { source, .. } => Some(source),
        }
    }
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rs", "py", "js", "ts", "jsx", "tsx", "json", "toml", "yaml", "yml",
    "csv", "tsv", "html", "htm", "css", "xml", "svg", "sh", "c", "h", "cpp", "hpp", "go", "java",
    "kt", "rb", "php", "sql", "log", "ini", "cfg",
];

/// Guess a mime type from a file name's extension.
pub fn guess_mime_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "md" | "markdown" => "text/markdown",
        ext if TEXT_EXTENSIONS.contains(&ext) => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Classify a file. SVG is treated as text so the markup reaches the model.
pub fn classify(name: &str, mime_type: &str) -> FileKind {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return FileKind::Text;
    }
    if mime_type.starts_with("image/") {
        FileKind::Image
    } else if mime_type.starts_with("text/") || mime_type == "application/json" {
        FileKind::Text
    } else if mime_type == "application/pdf" {
        FileKind::Pdf
    } else if mime_type.starts_with("audio/") {
        FileKind::Audio
    } else {
        FileKind::Unknown
    }
}

/// Largest file of `kind` whose content is carried inline.
fn inline_limit(kind: FileKind) -> Option<u64> {
    match kind {
        FileKind::Text => Some(MAX_INLINE_TEXT_BYTES),
        FileKind::Image => Some(MAX_INLINE_IMAGE_BYTES),
        _ => None,
    }
}

impl AttachedFile {
    /// Build an attachment from in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        let name = name.into();
        let size = bytes.len() as u64;
        Self::build(name, size, Some(bytes))
    }

    /// Read a file from disk. Files too large to inline, or of a kind that is
    /// never inlined, are described from their metadata without being read.
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let read_err = |source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size = fs::metadata(path).map_err(read_err)?.len();
        let kind = classify(&name, guess_mime_type(&name));

        if inline_limit(kind).is_some_and(|limit| size <= limit) {
            let bytes = fs::read(path).map_err(read_err)?;
            return Ok(Self::from_bytes(name, &bytes));
        }
        Ok(Self::build(name, size, None))
    }

    fn build(name: String, size: u64, bytes: Option<&[u8]>) -> Self {
        let mime_type = guess_mime_type(&name).to_string();
        let kind = classify(&name, &mime_type);

        let mut text_content = None;
        let mut base64_data = None;
        let inlined = bytes.filter(|_| inline_limit(kind).is_some_and(|limit| size <= limit));
        if let Some(bytes) = inlined {
            match kind {
                FileKind::Text => text_content = Some(String::from_utf8_lossy(bytes).into_owned()),
                FileKind::Image => base64_data = Some(base64::prelude::BASE64_STANDARD.encode(bytes)),
                _ => {}
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            mime_type,
            kind,
            text_content,
            base64_data,
            size,
        }
    }

    /// Content part sent to the model. Kinds that cannot be delivered become a
    /// short textual placeholder instead of failing the turn.
    pub fn to_content_part(&self) -> ContentPart {
        match (self.kind, &self.text_content, &self.base64_data) {
            (FileKind::Text, Some(text), _) => ContentPart::Text {
                text: format!(
                    "<file name=\"{}\" type=\"{}\">\n{}\n</file>",
                    self.name, self.mime_type, text
                ),
            },
            (FileKind::Image, _, Some(data)) => ContentPart::Image {
                url: format!("data:{};base64,{}", self.mime_type, data),
            },
            _ => ContentPart::Text {
                text: format!(
                    "[Attached file: {} ({}, {}) - content not included]",
                    self.name,
                    self.kind.as_str(),
                    format_size(self.size)
                ),
            },
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{:.1} MB", b / (KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classifies_common_files() {
        assert_eq!(classify("a.png", guess_mime_type("a.png")), FileKind::Image);
        assert_eq!(classify("a.rs", guess_mime_type("a.rs")), FileKind::Text);
        assert_eq!(classify("a.svg", guess_mime_type("a.svg")), FileKind::Text);
        assert_eq!(classify("a.pdf", guess_mime_type("a.pdf")), FileKind::Pdf);
        assert_eq!(classify("a.mp3", guess_mime_type("a.mp3")), FileKind::Audio);
        assert_eq!(classify("a.bin", guess_mime_type("a.bin")), FileKind::Unknown);
    }

    #[test]
    fn text_files_are_inlined_in_delimited_blocks() {
        let file = AttachedFile::from_bytes("notes.md", b"# Title\nbody");
        match file.to_content_part() {
            ContentPart::Text { text } => {
                assert!(text.starts_with("<file name=\"notes.md\" type=\"text/markdown\">"));
                assert!(text.contains("# Title\nbody"));
                assert!(text.ends_with("</file>"));
            }
            other => panic!("expected text part, got {other:?}"),
        }
    }

    #[test]
    fn images_become_data_uris() {
        let file = AttachedFile::from_bytes("pixel.png", &[0x89, b'P', b'N', b'G']);
        match file.to_content_part() {
            ContentPart::Image { url } => assert_eq!(url, "data:image/png;base64,iVBORw=="),
            other => panic!("expected image part, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_kinds_degrade_to_placeholder() {
        let file = AttachedFile::from_bytes("report.pdf", &[0u8; 2048]);
        match file.to_content_part() {
            ContentPart::Text { text } => {
                assert_eq!(
                    text,
                    "[Attached file: report.pdf (pdf, 2.0 KB) - content not included]"
                );
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
    }

    #[test]
    fn from_path_reads_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let file = AttachedFile::from_path(&path).unwrap();
        assert_eq!(file.name, "data.csv");
        assert_eq!(file.kind, FileKind::Text);
        assert_eq!(file.size, 8);
        assert_eq!(file.text_content.as_deref(), Some("a,b\n1,2\n"));

        let missing = AttachedFile::from_path(&dir.path().join("nope.txt"));
        assert!(matches!(missing, Err(AttachmentError::Read { .. })));
    }

    #[test]
    fn oversized_files_are_described_from_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.log");
        let handle = std::fs::File::create(&path).unwrap();
        handle.set_len(MAX_INLINE_TEXT_BYTES + 1).unwrap();
        drop(handle);

        let file = AttachedFile::from_path(&path).unwrap();
        assert_eq!(file.kind, FileKind::Text);
        assert_eq!(file.size, MAX_INLINE_TEXT_BYTES + 1);
        assert!(file.text_content.is_none());
        assert!(matches!(
            file.to_content_part(),
            ContentPart::Text { text } if text.contains("content not included")
        ));

        let blob = dir.path().join("blob.bin");
        std::fs::write(&blob, [0u8; 16]).unwrap();
        let file = AttachedFile::from_path(&blob).unwrap();
        assert_eq!((file.kind, file.size), (FileKind::Unknown, 16));
        assert!(file.base64_data.is_none());
    }
}
