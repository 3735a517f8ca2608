/*!
 * Permission Programs
 * Segment interning, trie building and the compiled decision automaton
 */

pub mod automaton;
pub mod builder;
pub mod interner;

pub use automaton::{PermissionProgram, ProgramMatch};
pub use builder::TrieBuilder;
pub use interner::SegmentInterner;
