//! Adapters for the supported agent families.
//!
//! - [`SwarmAdapter`]: multi-agent coordinator traces
//! - [`EnhancedAdapter`]: structured decision paths from reasoning agents
//! - [`GenericAdapter`]: simple agents and bare-string responses
//!
//! [`default_chain`] tries them in that order, most specific first.

pub mod enhanced;
pub mod generic;
pub mod swarm;
mod value;

pub use enhanced::EnhancedAdapter;
pub use generic::GenericAdapter;
pub use swarm::SwarmAdapter;

use observer_core::adapter::AdapterChain;

/// Swarm, then enhanced, then generic.
pub fn default_chain() -> AdapterChain {
    AdapterChain::new()
        .with(SwarmAdapter)
        .with(EnhancedAdapter)
        .with(GenericAdapter)
}
