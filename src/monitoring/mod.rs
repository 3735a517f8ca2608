/*!
 * Monitoring
 * Logging bootstrap for the permission engine
 */

pub mod tracer;

pub use tracer::init_tracing;
