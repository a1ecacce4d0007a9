//! Session domain module.
//!
//! This module contains the observation session model, the store interface,
//! and lifecycle management.
//!
//! # Module Structure
//!
//! - `model`: Core session model (`Session`, `SessionState`, `SessionSummary`)
//! - `repository`: Store trait for session persistence (`SessionStore`)
//! - `manager`: Session lifecycle and serialized appends (`SessionManager`)
//! - `guard`: Scoped acquisition that closes on every exit path (`SessionGuard`)
//!
//! # Usage
//!
//! ```ignore
//! use observer_core::session::{SessionManager, SessionGuard, SessionStore};
//!
//! let guard = manager.open_session("nightly run")?;
//! manager.record(guard.handle(), draft)?;
//! guard.close()?;
//! ```

mod guard;
mod manager;
mod manager_test;
mod model;
mod repository;

pub use guard::SessionGuard;
pub use manager::{SessionHandle, SessionManager};
pub use model::{Session, SessionAverages, SessionState, SessionSummary};
pub use repository::SessionStore;
