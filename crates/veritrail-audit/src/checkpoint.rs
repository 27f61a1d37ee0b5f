//! JSON-lines checkpoint listener.
//!
//! One file holds one session.  Each recorded event is appended to it as one
//! line
//! `{"index":…,"event":{…},"root":"…"}` as soon as it is recorded, so a
//! session that dies before export still leaves a verifiable trail.
//! [`load_checkpoint`] turns such a file back into a `SessionExport`.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;

use veritrail_contracts::{
    error::{VeritrailError, VeritrailResult},
    session::{SessionExport, EMPTY_ROOT},
};
use veritrail_core::{EventListener, RecordedEvent};

/// Appends every recorded event to a JSONL file.
pub struct JsonlCheckpoint {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlCheckpoint {
    /// Create `path`, replacing any earlier checkpoint stored there.
    pub fn create(path: impl Into<PathBuf>) -> VeritrailResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| VeritrailError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventListener for JsonlCheckpoint {
    fn on_event(&self, recorded: &RecordedEvent) -> Result<(), String> {
        let mut line = serde_json::to_string(recorded).map_err(|e| e.to_string())?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|e| format!("checkpoint file lock poisoned: {e}"))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| format!("cannot append to '{}': {e}", self.path.display()))
    }
}

/// Rebuild a session from a checkpoint file.
///
/// Lines are ordered by their recorded `index`; the root is that of the
/// highest index.  The indices must run `0, 1, 2, …` without repeats or
/// gaps, otherwise the file is rejected as `SessionFormat`.  A truncated
/// final line (a crash mid-write) is skipped with a warning; any other
/// undecodable line is an error.
pub fn load_checkpoint(path: &Path) -> VeritrailResult<SessionExport> {
    let file = File::open(path).map_err(|source| VeritrailError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()
        .map_err(|source| VeritrailError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let mut entries: Vec<RecordedEvent> = Vec::with_capacity(lines.len());
    let last = lines.len().saturating_sub(1);
    for (n, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RecordedEvent>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if n == last => {
                warn!(path = %path.display(), line = n + 1, error = %e, "skipping truncated checkpoint line");
            }
            Err(e) => {
                return Err(VeritrailError::SessionFormat {
                    reason: format!("'{}' line {}: {e}", path.display(), n + 1),
                })
            }
        }
    }

    entries.sort_by_key(|e| e.index);
    if let Some((expected, entry)) = entries
        .iter()
        .enumerate()
        .find(|(expected, entry)| entry.index != *expected)
    {
        let reason = if entry.index < expected {
            format!("'{}' repeats event index {}", path.display(), entry.index)
        } else {
            format!("'{}' is missing event index {expected}", path.display())
        };
        return Err(VeritrailError::SessionFormat { reason });
    }
    let session_root = entries
        .last()
        .map(|e| e.root.clone())
        .unwrap_or_else(|| EMPTY_ROOT.to_string());
    let events: Vec<_> = entries.into_iter().map(|e| e.event).collect();

    Ok(SessionExport {
        session_id: String::new(),
        session_root,
        event_count: events.len(),
        events,
        exported_at: None,
    })
}
