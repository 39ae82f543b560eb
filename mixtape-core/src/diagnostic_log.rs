//! Append-only JSONL persistence of [`DiagnosticEvent`]s.
//!
//! Grounded on the teacher's own use of the `dirs` crate for locating local
//! state (`dirs::cache_dir()`, `dirs::home_dir()`); the diagnostic log is the
//! one piece of persisted state this crate carries, so it resolves its own
//! base directory with the sibling `dirs::data_local_dir()` call.
//! Everything else is in-memory for the lifetime of a run.

use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::events::DiagnosticEvent;

pub const DEFAULT_LOG_ENV_VAR: &str = "MIXTAPE_DIAGNOSTIC_LOG";

/// Resolves the diagnostic log path: `$MIXTAPE_DIAGNOSTIC_LOG` if set,
/// otherwise `<data-local>/mixtape/orchestrator.log`.
pub fn resolve_log_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(DEFAULT_LOG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::data_local_dir()
        .ok_or_else(|| Error::Other("could not determine local data directory".into()))?;
    Ok(base.join("mixtape").join("orchestrator.log"))
}

/// An append-only JSONL writer. One [`DiagnosticEvent`] per line, newest
/// last, never rewritten or truncated.
pub struct DiagnosticLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl DiagnosticLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Other(format!("failed to create log directory: {e}")))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Other(format!("failed to open diagnostic log: {e}")))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &DiagnosticEvent) -> Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| Error::Other(format!("failed to serialize diagnostic event: {e}")))?;
        let mut file = self.file.lock().await;
        writeln!(file, "{line}")
            .map_err(|e| Error::Other(format!("failed to append diagnostic event: {e}")))?;
        Ok(())
    }
}
