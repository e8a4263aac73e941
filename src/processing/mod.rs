pub mod embedding;
pub mod filters;
pub mod indexer;
pub mod metrics;
pub mod searcher;
pub mod sweep;
