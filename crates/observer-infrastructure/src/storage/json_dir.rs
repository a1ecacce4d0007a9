//! Directory-backed session store.
//!
//! Each session is an append-only JSON-lines event log:
//!
//! ```text
//! base_dir/
//! ├── <session-id>.jsonl   # opened, recorded*, outcome*, closed
//! └── <session-id>.lock    # advisory lock guarding appends
//! ```
//!
//! A session is rebuilt by replaying its log. Every append is flushed to disk
//! before it returns, so a record acknowledged to the caller survives a crash.
//! A torn final line left by a crash mid-append is ignored on replay and cut
//! off before the next append.
//!
//! Writers never replay the whole log: whether a session is closed is read
//! from the tail, and record existence is checked by the session manager.

use super::atomic_file::{FileLock, write_atomic};
use chrono::{DateTime, Utc};
use observer_core::decision::{DecisionRecord, OutcomeStatus, OutcomeUpdate, PerformanceMetrics};
use observer_core::error::{ObserverError, Result};
use observer_core::session::{Session, SessionState, SessionStore};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOG_EXTENSION: &str = "jsonl";

/// Bytes read per step when scanning a log backwards.
const TAIL_CHUNK: u64 = 8 * 1024;

/// One line of a session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SessionEvent {
    Opened {
        id: String,
        label: String,
        opened_at: DateTime<Utc>,
    },
    Recorded {
        record: DecisionRecord,
    },
    Outcome {
        record_id: String,
        status: OutcomeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metrics: Option<PerformanceMetrics>,
    },
    Closed {
        closed_at: DateTime<Utc>,
    },
}

/// Session store keeping one event log per session under a directory.
#[derive(Debug, Clone)]
pub struct JsonDirSessionStore {
    base_dir: PathBuf,
}

impl JsonDirSessionStore {
    /// Opens (and creates if needed) a store rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the directory cannot be created.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(|e| {
            ObserverError::storage(format!(
                "Failed to create session directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn log_path(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ObserverError::invalid_record(format!(
                "session id '{}' is not usable as a file name",
                session_id
            )));
        }
        Ok(self
            .base_dir
            .join(format!("{}.{}", session_id, LOG_EXTENSION)))
    }

    fn existing_log(&self, session_id: &str) -> Result<PathBuf> {
        let path = self.log_path(session_id)?;
        if !path.exists() {
            return Err(ObserverError::not_found("session", session_id));
        }
        Ok(path)
    }

    /// Opens a log for writing at its end, cutting off a torn final line
    /// first so the next event starts on a line of its own.
    ///
    /// Callers must hold the session's lock.
    fn open_for_append(path: &Path) -> Result<File> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len > 0 && read_range(&mut file, len - 1, len)? != b"\n" {
            let keep = last_newline_before(&mut file, len)?.map_or(0, |pos| pos + 1);
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = len - keep,
                "Truncating torn final line of session log"
            );
            file.set_len(keep)?;
            file.sync_data()?;
        }
        file.seek(SeekFrom::End(0))?;
        Ok(file)
    }

    /// Whether the session in a repaired log is closed.
    ///
    /// Outcome events may follow the close, so the scan walks back over them
    /// to the last lifecycle or record event. Its cost depends on that tail
    /// only, not on the number of records.
    fn ends_closed(file: &mut File, path: &Path) -> Result<bool> {
        let mut end = file.metadata()?.len();
        while end > 0 {
            // `end - 1` is the newline terminating the line.
            let start = last_newline_before(file, end - 1)?.map_or(0, |pos| pos + 1);
            let line = read_range(file, start, end - 1)?;
            end = start;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let event: SessionEvent =
                serde_json::from_slice(&line).map_err(|e| ObserverError::Serialization {
                    format: "JSON".to_string(),
                    message: format!("{} tail: {}", path.display(), e),
                })?;
            match event {
                SessionEvent::Outcome { .. } => continue,
                SessionEvent::Closed { .. } => return Ok(true),
                SessionEvent::Opened { .. } | SessionEvent::Recorded { .. } => return Ok(false),
            }
        }
        Ok(false)
    }

    fn write_event(file: &mut File, event: &SessionEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    /// Replays a log file into a session.
    fn replay(path: &Path) -> Result<Option<Session>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let complete = content.ends_with('\n');
        let lines: Vec<&str> = content.lines().collect();

        let mut session: Option<Session> = None;
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: SessionEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) if index + 1 == lines.len() && !complete => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring torn final line of session log"
                    );
                    break;
                }
                Err(e) => {
                    return Err(ObserverError::Serialization {
                        format: "JSON".to_string(),
                        message: format!("{} line {}: {}", path.display(), index + 1, e),
                    });
                }
            };
            apply_event(&mut session, event, path)?;
        }
        Ok(session)
    }

    fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

fn apply_event(session: &mut Option<Session>, event: SessionEvent, path: &Path) -> Result<()> {
    let corrupt = |what: &str| ObserverError::Serialization {
        format: "JSON".to_string(),
        message: format!("{}: {}", path.display(), what),
    };

    if let SessionEvent::Opened { id, label, opened_at } = event {
        if session.is_some() {
            return Err(corrupt("session opened twice"));
        }
        *session = Some(Session::open(id, label, opened_at));
        return Ok(());
    }

    let s = session
        .as_mut()
        .ok_or_else(|| corrupt("log does not start with an opened event"))?;
    match event {
        SessionEvent::Opened { .. } => {}
        SessionEvent::Recorded { record } => s.records.push(record),
        SessionEvent::Outcome {
            record_id,
            status,
            metrics,
        } => match s.find_record_mut(&record_id) {
            Some(record) => {
                record.outcome = Some(status);
                if metrics.is_some() {
                    record.performance_metrics = metrics;
                }
            }
            None => tracing::warn!(
                path = %path.display(),
                record_id = %record_id,
                "Ignoring outcome for an unknown record"
            ),
        },
        SessionEvent::Closed { closed_at } => {
            if s.state == SessionState::Open {
                s.state = SessionState::Closed;
                s.closed_at = Some(closed_at);
            }
        }
    }
    Ok(())
}

impl SessionStore for JsonDirSessionStore {
    fn create_session(&self, session: &Session) -> Result<()> {
        let path = self.log_path(&session.id)?;
        let _lock = FileLock::acquire(&path)?;
        if path.exists() {
            return Err(ObserverError::internal(format!(
                "session '{}' already exists",
                session.id
            )));
        }

        let mut contents = String::new();
        let opened = SessionEvent::Opened {
            id: session.id.clone(),
            label: session.label.clone(),
            opened_at: session.opened_at,
        };
        contents.push_str(&serde_json::to_string(&opened)?);
        contents.push('\n');
        for record in &session.records {
            contents.push_str(&serde_json::to_string(&SessionEvent::Recorded {
                record: record.clone(),
            })?);
            contents.push('\n');
        }
        if let Some(closed_at) = session.closed_at {
            contents.push_str(&serde_json::to_string(&SessionEvent::Closed { closed_at })?);
            contents.push('\n');
        }

        write_atomic(&path, contents.as_bytes())?;
        tracing::debug!(session_id = %session.id, path = %path.display(), "Created session log");
        Ok(())
    }

    fn append(&self, session_id: &str, record: &DecisionRecord) -> Result<()> {
        let path = self.existing_log(session_id)?;
        let _lock = FileLock::acquire(&path)?;
        let mut file = Self::open_for_append(&path)?;
        if Self::ends_closed(&mut file, &path)? {
            return Err(ObserverError::invalid_session_state(
                session_id,
                SessionState::Closed,
                "append to",
            ));
        }
        file.seek(SeekFrom::End(0))?;
        Self::write_event(
            &mut file,
            &SessionEvent::Recorded {
                record: record.clone(),
            },
        )
    }

    fn update_outcome(
        &self,
        session_id: &str,
        record_id: &str,
        update: &OutcomeUpdate,
    ) -> Result<()> {
        let path = self.existing_log(session_id)?;
        let _lock = FileLock::acquire(&path)?;
        let mut file = Self::open_for_append(&path)?;
        Self::write_event(
            &mut file,
            &SessionEvent::Outcome {
                record_id: record_id.to_string(),
                status: update.status,
                metrics: update.metrics.clone(),
            },
        )
    }

    fn close_session(&self, session_id: &str, closed_at: DateTime<Utc>) -> Result<()> {
        let path = self.existing_log(session_id)?;
        let _lock = FileLock::acquire(&path)?;
        let mut file = Self::open_for_append(&path)?;
        if Self::ends_closed(&mut file, &path)? {
            return Ok(());
        }
        file.seek(SeekFrom::End(0))?;
        Self::write_event(&mut file, &SessionEvent::Closed { closed_at })
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        Self::replay(&self.log_path(session_id)?)
    }

    fn list_open_sessions(&self) -> Result<Vec<String>> {
        Ok(self
            .list_sessions()?
            .into_iter()
            .filter(|s| s.is_open())
            .map(|s| s.id)
            .collect())
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for path in self.log_files()? {
            if let Some(session) = Self::replay(&path)? {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }
}

/// Reads the bytes in `[start, end)`.
fn read_range(file: &mut File, start: u64, end: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; (end - start) as usize];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Position of the last newline in `[0, end)`, scanning backwards.
fn last_newline_before(file: &mut File, end: u64) -> Result<Option<u64>> {
    let mut end = end;
    while end > 0 {
        let start = end.saturating_sub(TAIL_CHUNK);
        let chunk = read_range(file, start, end)?;
        if let Some(i) = chunk.iter().rposition(|b| *b == b'\n') {
            return Ok(Some(start + i as u64));
        }
        end = start;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_core::decision::DecisionDraft;
    use tempfile::TempDir;

    fn record(session_id: &str, id: &str) -> DecisionRecord {
        let draft = DecisionDraft::new("agent", "go").with_options(["go", "stop"]);
        DecisionRecord::from_draft(draft, id, session_id, Utc::now())
    }

    #[test]
    fn test_survives_reopening_the_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        store.append("s-1", &record("s-1", "r-1")).unwrap();
        store
            .update_outcome("s-1", "r-1", &OutcomeUpdate::new(OutcomeStatus::Success))
            .unwrap();

        let reopened = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        let session = reopened.load_session("s-1").unwrap().unwrap();
        assert_eq!(session.records.len(), 1);
        assert_eq!(session.records[0].outcome, Some(OutcomeStatus::Success));
        assert_eq!(reopened.list_open_sessions().unwrap(), vec!["s-1"]);
    }

    #[test]
    fn test_torn_final_line_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        store.append("s-1", &record("s-1", "r-1")).unwrap();

        let path = store.log_path("s-1").unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"event\":\"recorded\",\"rec").unwrap();

        let session = store.load_session("s-1").unwrap().unwrap();
        assert_eq!(session.records.len(), 1);
    }

    #[test]
    fn test_append_after_torn_line() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        store.append("s-1", &record("s-1", "r-1")).unwrap();

        let path = store.log_path("s-1").unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"event\":\"recorded\",\"rec").unwrap();

        store.append("s-1", &record("s-1", "r-2")).unwrap();
        let session = store.load_session("s-1").unwrap().unwrap();
        let ids: Vec<&str> = session.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r-1", "r-2"]);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_close_after_torn_line() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        let path = store.log_path("s-1").unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"event\":\"clo").unwrap();

        store.close_session("s-1", Utc::now()).unwrap();
        let session = store.load_session("s-1").unwrap().unwrap();
        assert_eq!(session.state, SessionState::Closed);
    }

    #[test]
    fn test_closed_state_read_from_the_tail() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        store.append("s-1", &record("s-1", "r-1")).unwrap();
        store.append("s-1", &record("s-1", "r-2")).unwrap();
        let closed_at = Utc::now();
        store.close_session("s-1", closed_at).unwrap();

        // Outcomes still land after the close and must not reopen the session.
        store
            .update_outcome("s-1", "r-1", &OutcomeUpdate::new(OutcomeStatus::Pending))
            .unwrap();
        store
            .update_outcome("s-1", "r-1", &OutcomeUpdate::new(OutcomeStatus::Success))
            .unwrap();

        let reopened = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        let err = reopened.append("s-1", &record("s-1", "r-3")).unwrap_err();
        assert!(err.is_invalid_session_state());

        reopened.close_session("s-1", Utc::now()).unwrap();
        let content = fs::read_to_string(reopened.log_path("s-1").unwrap()).unwrap();
        assert_eq!(content.matches("\"event\":\"closed\"").count(), 1);

        let session = reopened.load_session("s-1").unwrap().unwrap();
        assert_eq!(session.closed_at, Some(closed_at));
        assert_eq!(session.records.len(), 2);
        assert_eq!(session.records[0].outcome, Some(OutcomeStatus::Success));
    }

    #[test]
    fn test_outcome_metrics_survive_replay() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        store.append("s-1", &record("s-1", "r-1")).unwrap();

        let mut metrics = PerformanceMetrics::new();
        metrics.insert("latency_ms".to_string(), serde_json::json!(250));
        store
            .update_outcome(
                "s-1",
                "r-1",
                &OutcomeUpdate::new(OutcomeStatus::Pending).with_metrics(metrics.clone()),
            )
            .unwrap();
        store
            .update_outcome("s-1", "r-1", &OutcomeUpdate::new(OutcomeStatus::Failure))
            .unwrap();

        let record = &store.load_session("s-1").unwrap().unwrap().records[0];
        assert_eq!(record.outcome, Some(OutcomeStatus::Failure));
        assert_eq!(record.performance_metrics, Some(metrics));
    }

    #[test]
    fn test_outcome_for_unknown_record_is_skipped_on_replay() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        store.append("s-1", &record("s-1", "r-1")).unwrap();
        store
            .update_outcome("s-1", "ghost", &OutcomeUpdate::new(OutcomeStatus::Success))
            .unwrap();

        let session = store.load_session("s-1").unwrap().unwrap();
        assert_eq!(session.records.len(), 1);
        assert_eq!(session.records[0].outcome, None);
    }

    #[test]
    fn test_corrupt_middle_line_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        let path = store.log_path("s-1").unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"not json\n").unwrap();

        assert!(matches!(
            store.load_session("s-1"),
            Err(ObserverError::Serialization { .. })
        ));
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        assert!(store.load_session("../escape").is_err());
        assert!(
            store
                .create_session(&Session::open("a/b", "run", Utc::now()))
                .is_err()
        );
    }

    #[test]
    fn test_ignores_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonDirSessionStore::new(temp_dir.path()).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();
        store
            .create_session(&Session::open("s-1", "run", Utc::now()))
            .unwrap();
        assert_eq!(store.list_sessions().unwrap().len(), 1);
    }
}
