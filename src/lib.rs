/*!
 * Permission Engine Library
 * Compiled access-control decisions for namespaced permission nodes
 */

pub mod core;
pub mod monitoring;
pub mod permissions;

// Re-exports
pub use crate::core::{EngineConfig, EngineError, EngineResult, StoreError};
pub use monitoring::init_tracing;
pub use permissions::{
    Decision, Effect, Explanation, InMemoryStore, Kind, NodeHandle, NodeRef, PermissionService,
    PermissionStore, Subject,
};
