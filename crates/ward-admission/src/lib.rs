//! Ward admission allocation engine.
//!
//! The [`admissions`] module holds the domain, the placement policy, the
//! transactional store seam and the batch distributor. The remaining modules
//! carry the runtime concerns shared with the HTTP service binary.

pub mod admissions;
pub mod config;
pub mod error;
pub mod telemetry;
