//! # STRATA Frame Driver
//!
//! Runs the [`strata_alloc`] allocators through a frame loop and measures
//! them against plain `Box` allocation.
//!
//! ## Example
//!
//! ```rust
//! use strata_frame::{FrameConfig, FrameDriver};
//!
//! let mut config = FrameConfig::default();
//! config.pool.objects_per_frame = 100;
//! config.pool.capacity = 100;
//!
//! let mut driver = FrameDriver::new(config)?;
//! let report = driver.run(2)?;
//! assert_eq!(report.phase("frame").map(|m| m.samples()), Some(2));
//! # Ok::<(), strata_frame::FrameError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod objects;
pub mod profiler;

pub use cli::CliArgs;
pub use config::{BaselineSection, BuddySection, FrameConfig, PoolSection, StackSection};
pub use error::{FrameError, FrameResult};
pub use frame::{phase, FrameDriver, FrameStats};
pub use objects::{Cube, ObjectKind, Pyramid, Sphere};
pub use profiler::{ProfileMetrics, ProfileReport, ScopeTimer};
