/*!
 * Synchronization Primitives
 * Copy-on-write cells for read-mostly tables
 */

mod rcu;

pub use rcu::RcuCell;
