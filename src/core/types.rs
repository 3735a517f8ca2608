/*!
 * Core Types
 * Common identifiers used across the permission engine
 */

/// Numeric user id, already resolved by the caller
pub type UserId = u64;

/// Role id as assigned by the persistence layer
pub type RoleId = u64;

/// Role priority (higher wins when several roles disagree)
pub type Rank = i64;

/// Stable per-namespace index allocated by the registry
pub type NamespaceIndex = u32;

/// Interned id of one dotted path segment, scoped to a namespace
pub type SegmentId = u32;

/// Per-namespace catalog epoch
pub type Version = u64;

/// Segment id that no program edge ever carries.
///
/// Lookups that mention a segment the namespace has never interned compile
/// it to this id so that the walk stops there without growing the interner.
pub const UNKNOWN_SEGMENT: SegmentId = SegmentId::MAX;
