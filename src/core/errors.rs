/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::RoleId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for engine mutations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the persistence collaborator.
///
/// The engine never retries; these are propagated unchanged.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum StoreError {
    #[error("Role {0} not found")]
    #[diagnostic(
        code(store::role_not_found),
        help("The role may have been deleted. Refresh the role list.")
    )]
    RoleNotFound(RoleId),

    #[error("Parent role {0} not found")]
    #[diagnostic(
        code(store::parent_not_found),
        help("Create the parent role first or pass no parent.")
    )]
    ParentNotFound(RoleId),

    #[error("Setting parent {parent} on role {role} would create a cycle")]
    #[diagnostic(
        code(store::role_cycle),
        help("A role cannot inherit from one of its own descendants.")
    )]
    RoleCycle { role: RoleId, parent: RoleId },

    #[error("Storage backend error: {0}")]
    #[diagnostic(code(store::backend))]
    Backend(String),
}

/// Unified engine error type with miette diagnostics
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum EngineError {
    #[error("Malformed permission node: {0}")]
    #[diagnostic(
        code(permissions::malformed_node),
        help("Nodes look like `<namespace>.<local>`; wildcards are `*` or `<prefix>.*`.")
    )]
    MalformedNode(String),

    #[error("Permission node not declared: {0}")]
    #[diagnostic(
        code(permissions::undeclared_node),
        help("Declare the node in its namespace catalog before granting it.")
    )]
    UndeclaredNode(String),

    #[error("Role {0} is not known to the role tree")]
    #[diagnostic(code(permissions::unknown_role))]
    UnknownRole(RoleId),

    #[error("Store error: {0}")]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}
