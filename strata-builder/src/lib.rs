//! strata-builder — site aggregation pipeline
//!
//! Aggregates the normalized sample/analysis tables into one denormalized
//! site document per investigation site, enriched by pluggable
//! domain modules, cached as versioned JSON, and regenerated in bulk
//! through a bounded-concurrency batch scheduler.

pub mod assembler;
pub mod batch;
pub mod cache;
pub mod dating;
pub mod db;
pub mod models;
pub mod modules;

pub use assembler::{AssembleOptions, SiteAssembler};
pub use batch::{preload, BatchReport, BatchScheduler};
pub use cache::CacheStore;
