pub mod domain;
pub mod encoders;
pub mod error;
pub mod ingest;
pub mod models;
pub mod processing;
pub mod repository;

/// Damping constant for weighted reciprocal rank fusion. Larger values
/// flatten the score gap between adjacent ranks deep in a result list.
pub const RRF_DAMPING: f64 = 60.0;
