//! Error types for setting up, running and finalizing a capture

use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Diagnostic reported by the radio driver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{} already exists", .path.display())]
    AlreadyExists { path: PathBuf },
    #[error("failed to preallocate {} to {size} bytes", .path.display())]
    AllocationFailed {
        path: PathBuf,
        size: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to map {}", .path.display())]
    MappingFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to finalize {}", .path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A byte count that isn't a whole number of samples or exceeds the region
    #[error("invalid length {len} for a region of {capacity} bytes")]
    InvalidLength { len: u64, capacity: u64 },
    #[error("rate log {}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
