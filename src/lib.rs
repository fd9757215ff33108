//! Finds which query peptides never occur in a reference protein database.
//!
//! The database is streamed once per worker; each worker only tests the
//! records of its own stripe and the per-worker presence vectors are
//! OR-reduced into one global answer.

pub mod config;
pub mod errors;
pub mod models;
pub mod peptides;
pub mod pipeline;
pub mod protein;
pub mod scan;

pub use config::ScanConfig;
pub use errors::{PepSeekError, Result};
pub use pipeline::{run, run_with_worker, RunSummary};
