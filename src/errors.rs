//! Module for errors.
use crate::cds::JobStatus;
use reqwest::StatusCode;
use std::{error::Error, fmt::Display};

/// Error from downloading or configuring the downloader.
#[derive(Debug)]
pub enum Era5Err {
    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    // Other forwarded errors
    /// Error forwarded from reqwest, e.g. a connection failure.
    Http(::reqwest::Error),
    /// A response body was not the JSON we expected.
    Json(::serde_json::Error),
    /// The `.cdsapirc` file could not be parsed.
    ConfigFile(::serde_yaml::Error),

    // My own errors from this crate
    /// No url or key could be found for the data store.
    MissingConfig(String),
    /// The data store answered with a non-success status code.
    Api {
        /// HTTP status returned.
        status: StatusCode,
        /// Message extracted from the response body.
        message: String,
    },
    /// The job ended without producing a result.
    JobFailed {
        /// Id of the job on the data store.
        job_id: String,
        /// Terminal status reported.
        status: JobStatus,
        /// Reason given by the data store, if any.
        reason: String,
    },
    /// The data store reported a job status we do not know about.
    UnknownJobStatus(String),
    /// The result file was not the size announced by the data store.
    IncompleteDownload {
        /// Size from the results document.
        expected: u64,
        /// Bytes actually written.
        received: u64,
    },
    /// A year argument could not be parsed.
    InvalidYear(String),
    /// A variable name that is not in the download list.
    UnknownVariable(String),
}

impl Display for Era5Err {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::Era5Err::*;

        match self {
            IO(err) => write!(f, "std lib io error: {}", err),

            Http(err) => write!(f, "http error: {}", err),
            Json(err) => write!(f, "unexpected response from data store: {}", err),
            ConfigFile(err) => write!(f, "invalid cdsapirc file: {}", err),

            MissingConfig(msg) => write!(f, "missing data store configuration: {}", msg),
            Api { status, message } => write!(f, "data store error ({}): {}", status, message),
            JobFailed {
                job_id,
                status,
                reason,
            } => write!(f, "job {} {}: {}", job_id, status, reason),
            UnknownJobStatus(status) => write!(f, "unknown job status: {}", status),
            IncompleteDownload { expected, received } => write!(
                f,
                "incomplete download: expected {} bytes, received {}",
                expected, received
            ),
            InvalidYear(val) => write!(f, "invalid year: {}", val),
            UnknownVariable(name) => write!(f, "unknown variable: {}", name),
        }
    }
}

impl Error for Era5Err {}

impl From<::std::io::Error> for Era5Err {
    fn from(err: ::std::io::Error) -> Era5Err {
        Era5Err::IO(err)
    }
}

impl From<::reqwest::Error> for Era5Err {
    fn from(err: ::reqwest::Error) -> Era5Err {
        Era5Err::Http(err)
    }
}

impl From<::serde_json::Error> for Era5Err {
    fn from(err: ::serde_json::Error) -> Era5Err {
        Era5Err::Json(err)
    }
}

impl From<::serde_yaml::Error> for Era5Err {
    fn from(err: ::serde_yaml::Error) -> Era5Err {
        Era5Err::ConfigFile(err)
    }
}
