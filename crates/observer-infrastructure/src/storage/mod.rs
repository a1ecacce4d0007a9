//! Storage backends for observation sessions.
//!
//! - `atomic_file`: atomic whole-file writes and advisory locks
//! - `memory`: in-process store, used for tests and ephemeral runs
//! - `json_dir`: one JSON-lines event log per session in a directory

pub mod atomic_file;
pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirSessionStore;
pub use memory::InMemorySessionStore;
