use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Lines typed at the terminal. A single reader task owns stdin so the REPL
/// and human-input prompts can take turns without racing for it.
pub struct LineSource {
    rx: mpsc::UnboundedReceiver<String>,
}

impl LineSource {
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(error = %err, "stdin closed");
                        break;
                    }
                }
            }
        });
        Self { rx }
    }

    #[cfg(test)]
    pub fn scripted(lines: &[&str]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            let _ = tx.send(line.to_string());
        }
        Self { rx }
    }

    /// The next line, or `None` at end of input.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
