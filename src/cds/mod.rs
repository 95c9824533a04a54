//! Client for the Copernicus Climate Data Store (CDS) retrieve API.
//!
//! A retrieval submits a request as a job, polls the job until it finishes, then streams the
//! result file to disk.
pub use self::client::{CdsClient, JobStatus};
pub use self::config::CdsConfig;

mod client;
mod config;
