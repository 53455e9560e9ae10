//! clonetrail - clone fragment lineage and co-modification metrics
//!
//! Threads the clone fragments of a head commit back through a sampled
//! first-parent history and aggregates how often clones that span service
//! boundaries are modified together.

pub mod artifacts;
pub mod cache;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod git;
pub mod lineage;
pub mod metrics;
pub mod models;
pub mod reporters;
