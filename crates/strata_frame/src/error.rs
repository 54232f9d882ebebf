//! # Frame Driver Error Types

use std::path::PathBuf;

use strata_alloc::AllocError;
use thiserror::Error;

/// Errors that can occur while configuring or running the frame driver.
#[derive(Error, Debug)]
pub enum FrameError {
    /// An allocator failed for a reason other than running out of space.
    #[error("allocator error: {0}")]
    Alloc(#[from] AllocError),

    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::FrameConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but describes an unusable setup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for frame driver operations.
pub type FrameResult<T> = Result<T, FrameError>;
