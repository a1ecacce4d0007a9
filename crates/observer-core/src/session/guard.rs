//! Scoped session acquisition.

use super::manager::{SessionHandle, SessionManager};
use crate::error::Result;
use std::ops::Deref;

/// Owns an open session and closes it when dropped.
///
/// Dropping the guard on a normal return, while unwinding from a panic, or
/// because the owning future was cancelled all close the session. Use
/// [`SessionGuard::close`] to observe close errors; the drop path can only log
/// them.
pub struct SessionGuard {
    manager: SessionManager,
    handle: SessionHandle,
    released: bool,
}

impl SessionGuard {
    pub(crate) fn new(manager: SessionManager, handle: SessionHandle) -> Self {
        Self {
            manager,
            handle,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    /// A handle that can be cloned and shared with concurrent recorders.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Closes the session now and reports the result.
    pub fn close(mut self) -> Result<()> {
        self.released = true;
        self.manager.close_session(&self.handle)
    }
}

impl Deref for SessionGuard {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if std::thread::panicking() {
            tracing::warn!(session_id = %self.handle.id(), "Closing session while unwinding");
        }
        if let Err(e) = self.manager.close_session(&self.handle) {
            tracing::warn!(
                session_id = %self.handle.id(),
                error = %e,
                "Failed to close session on scope exit"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SessionConfig;
    use crate::decision::{DecisionDraft, DecisionRecord, OutcomeUpdate};
    use crate::error::Result;
    use crate::session::{Session, SessionManager, SessionState, SessionStore};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    // Store that accepts everything and keeps nothing
    struct NullStore;

    impl SessionStore for NullStore {
        fn create_session(&self, _session: &Session) -> Result<()> {
            Ok(())
        }
        fn append(&self, _session_id: &str, _record: &DecisionRecord) -> Result<()> {
            Ok(())
        }
        fn update_outcome(&self, _: &str, _: &str, _: &OutcomeUpdate) -> Result<()> {
            Ok(())
        }
        fn close_session(&self, _session_id: &str, _closed_at: DateTime<Utc>) -> Result<()> {
            Ok(())
        }
        fn load_session(&self, _session_id: &str) -> Result<Option<Session>> {
            Ok(None)
        }
        fn list_open_sessions(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn list_sessions(&self) -> Result<Vec<Session>> {
            Ok(Vec::new())
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(NullStore), SessionConfig::default())
    }

    #[test]
    fn test_drop_closes_session() {
        let manager = manager();
        let handle = {
            let guard = manager.open_session("scoped").unwrap();
            guard.handle().clone()
        };
        assert_eq!(handle.state().unwrap(), SessionState::Closed);
    }

    #[test]
    fn test_panic_closes_session() {
        let manager = manager();
        let (tx, rx) = std::sync::mpsc::channel();
        let inner = manager.clone();
        let outcome = std::thread::spawn(move || {
            let guard = inner.open_session("doomed").unwrap();
            tx.send(guard.handle().clone()).unwrap();
            panic!("agent blew up");
        })
        .join();
        assert!(outcome.is_err());

        let handle = rx.recv().unwrap();
        assert_eq!(handle.state().unwrap(), SessionState::Closed);
        let err = manager
            .record(&handle, DecisionDraft::new("a", "x").with_options(["x"]))
            .unwrap_err();
        assert!(err.is_invalid_session_state());
    }

    #[test]
    fn test_deref_to_handle() {
        let manager = manager();
        let guard = manager.open_session("deref").unwrap();
        assert_eq!(guard.state().unwrap(), SessionState::Open);
        assert_eq!(guard.id(), guard.handle().id());
    }
}
