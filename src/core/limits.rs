/*!
 * Engine Limits and Constants
 *
 * Centralized location for sizing defaults and input bounds.
 * Performance-critical constants are marked with [PERF],
 * security-critical ones with [SECURITY].
 */

// =============================================================================
// RESOLVER CACHE
// =============================================================================

/// Total resolver cache entries across all stripes
/// [PERF] Sized for the distinct node strings a busy dispatcher checks
pub const DEFAULT_RESOLVER_CACHE_CAPACITY: usize = 8192;

/// Number of independently locked LRU stripes
/// [PERF] Power of two keeps stripe selection a mask
pub const DEFAULT_RESOLVER_CACHE_STRIPES: usize = 16;

// =============================================================================
// USER CACHE
// =============================================================================

/// Maximum users whose compiled overrides are kept in memory
/// [PERF] Beyond this an arbitrary user is evicted and reloads on next use
pub const DEFAULT_USER_CACHE_CAPACITY: usize = 10_000;

/// Mutation epoch counters shared by hashed user ids
/// [PERF] Power of two; collisions only cost an extra reload
pub const USER_EPOCH_STRIPES: usize = 64;

// =============================================================================
// NODE GRAMMAR
// =============================================================================

/// Maximum dot-separated segments in a local path
/// [SECURITY] Bounds trie depth and per-check work
pub const MAX_NODE_SEGMENTS: usize = 32;

/// Maximum byte length of a full node string
/// [SECURITY] Rejects pathological inputs before any parsing work
pub const MAX_NODE_LENGTH: usize = 512;
