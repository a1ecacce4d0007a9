pub mod config_loader;
pub mod paths;
pub mod storage;
pub mod store_factory;

pub use crate::config_loader::ConfigLoader;
pub use crate::paths::ObserverPaths;
pub use crate::storage::{InMemorySessionStore, JsonDirSessionStore};
pub use crate::store_factory::build_store;
