//! Application layer for the agent observer.
//!
//! This crate wires the domain pieces from `observer-core` (session manager,
//! adapter chain, analytics engine) to the store and adapters selected at
//! start-up, and exposes them as one service.

pub mod agent;
pub mod service;

pub use agent::ObservedAgent;
pub use service::ObserverService;
