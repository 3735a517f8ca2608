/*!
 * Core Module
 * Identifiers, errors, limits and configuration shared by the engine
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::EngineConfig;
pub use errors::*;
pub use types::*;
