use crate::core::message::{Message, Role};
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the diagnostic filter directive.
pub const LOG_FILTER_ENV_VAR: &str = "PARLEY_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Install the global `tracing` subscriber. Diagnostics go to `debug_log`
/// without ANSI colours when given, otherwise to stderr.
pub fn init_tracing(debug_log: Option<&Path>) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match debug_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    result.map_err(io::Error::other)
}

/// Plain-text transcript of finished messages, appended as they complete.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    /// A log that starts writing immediately when `path` is given.
    pub fn new(path: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let mut log = TranscriptLog {
            file_path: None,
            is_active: false,
        };
        if let Some(path) = path {
            log.set_log_file(path)?;
        }
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, Box<dyn Error>> {
        // Fail now rather than on the first message.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    /// Pause or resume. Pausing writes `pause_note` so the gap is visible.
    pub fn toggle(&mut self, pause_note: &str) -> Result<String, Box<dyn Error>> {
        let Some(path) = self.file_path.clone() else {
            return Err("No log file specified. Use --log <file> to enable logging first.".into());
        };
        if self.is_active {
            self.write_lines(&format!("## {pause_note}"))?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {})", path.display()))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn status_string(&self) -> String {
        let file_name = |path: &Path| {
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }

    /// Append a finished message. Errored and empty replies are skipped so a
    /// retried turn only shows up once.
    pub fn log_message(&self, message: &Message) -> Result<(), Box<dyn Error>> {
        if !self.is_active || message.is_errored() {
            return Ok(());
        }
        let text = message.text();
        if text.trim().is_empty() {
            return Ok(());
        }
        let entry = match message.role {
            Role::User => format!("You: {text}"),
            Role::Assistant => text,
            Role::Tool => format!(
                "## Tool result ({}):\n{text}",
                message.tool_name.as_deref().unwrap_or("tool")
            ),
        };
        self.write_lines(&entry)
    }

    fn write_lines(&self, content: &str) -> Result<(), Box<dyn Error>> {
        let Some(path) = self.file_path.as_ref() else {
            return Ok(());
        };
        let file: File = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finished_messages_are_appended_with_spacing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::new(Some(path.clone())).unwrap();

        log.log_message(&Message::user("hi\nthere")).unwrap();
        log.log_message(&Message::assistant("hello")).unwrap();
        log.log_message(&Message::tool_result("calculate", "42")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "You: hi\nthere\n\nhello\n\n## Tool result (calculate):\n42\n\n"
        );
    }

    #[test]
    fn errored_and_empty_replies_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::new(Some(path.clone())).unwrap();

        let mut failed = Message::assistant("half a rep");
        failed.error = Some("stream interrupted".into());
        log.log_message(&failed).unwrap();
        log.log_message(&Message::assistant("  ")).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn pause_writes_a_note_and_stops_logging() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let mut log = TranscriptLog::new(Some(path.clone())).unwrap();
        assert_eq!(log.status_string(), "active (chat.log)");

        let message = log.toggle("Logging paused").unwrap();
        assert!(message.starts_with("Logging paused"));
        assert_eq!(log.status_string(), "paused (chat.log)");
        log.log_message(&Message::user("unseen")).unwrap();

        log.toggle("Logging paused").unwrap();
        log.log_message(&Message::user("seen")).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "## Logging paused\n\nYou: seen\n\n"
        );
    }

    #[test]
    fn toggle_without_a_file_is_an_error() {
        let mut log = TranscriptLog::new(None).unwrap();
        assert!(log.toggle("paused").is_err());
        assert_eq!(log.status_string(), "disabled");
        assert!(!log.is_active());
    }
}
