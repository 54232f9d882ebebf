//! # Frame Driver Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! frames = 600
//! seed = 42
//!
//! [pool]
//! capacity = 1000
//! objects_per_frame = 1000
//!
//! [stack]
//! arena_bytes = 4194304
//! objects_per_frame = 300
//!
//! [buddy]
//! max_level_exp = 24
//! min_level_exp = 9
//! allocations_per_frame = 300
//!
//! [baseline]
//! enabled = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_alloc::buddy::{DEFAULT_MAX_LEVEL_EXP, DEFAULT_MIN_LEVEL_EXP};
use strata_alloc::BuddyConfig;

use crate::error::{FrameError, FrameResult};
use crate::objects::ObjectKind;

/// Pool allocator settings. The pool serves cubes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSection {
    /// Number of chunks reserved up front.
    pub capacity: usize,
    /// Cubes allocated per frame.
    pub objects_per_frame: usize,
    /// Route allocations through the pool.
    pub enabled: bool,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            objects_per_frame: 1_000,
            enabled: true,
        }
    }
}

/// Stack arena settings. The arena holds a rotating mix of all objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackSection {
    /// Arena size in bytes.
    pub arena_bytes: usize,
    /// Objects placed per frame.
    pub objects_per_frame: usize,
    /// Route allocations through the arena.
    pub enabled: bool,
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            arena_bytes: 4 * 1024 * 1024,
            objects_per_frame: 300,
            enabled: true,
        }
    }
}

/// Buddy allocator settings. Requests are sized like the workload objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuddySection {
    /// log2 of the arena size.
    pub max_level_exp: u32,
    /// log2 of the smallest block.
    pub min_level_exp: u32,
    /// Blocks requested per frame.
    pub allocations_per_frame: usize,
    /// Route allocations through the buddy allocator.
    pub enabled: bool,
}

impl BuddySection {
    /// Allocator configuration for this section.
    #[must_use]
    pub const fn allocator_config(&self) -> BuddyConfig {
        BuddyConfig {
            max_level_exp: self.max_level_exp,
            min_level_exp: self.min_level_exp,
        }
    }
}

impl Default for BuddySection {
    fn default() -> Self {
        Self {
            max_level_exp: DEFAULT_MAX_LEVEL_EXP,
            min_level_exp: DEFAULT_MIN_LEVEL_EXP,
            allocations_per_frame: 300,
            enabled: true,
        }
    }
}

/// Plain `Box` allocation of the pool workload, for comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineSection {
    /// Run the baseline each frame.
    pub enabled: bool,
}

impl Default for BaselineSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Complete driver configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Frames run by the command-line driver.
    pub frames: u64,
    /// Seed for the buddy release order.
    pub seed: u64,
    /// Pool settings.
    pub pool: PoolSection,
    /// Stack arena settings.
    pub stack: StackSection,
    /// Buddy settings.
    pub buddy: BuddySection,
    /// Baseline settings.
    pub baseline: BaselineSection,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            seed: 0x5EED,
            pool: PoolSection::default(),
            stack: StackSection::default(),
            buddy: BuddySection::default(),
            baseline: BaselineSection::default(),
        }
    }
}

impl FrameConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`FrameError::Parse`] for malformed TOML or unknown keys,
    /// [`FrameError::InvalidConfig`] if validation fails.
    pub fn from_toml_str(source: &str) -> FrameResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`FrameError::Io`] if the file cannot be read, otherwise as
    /// [`FrameConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> FrameResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| FrameError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks that every allocator can be built and that the buddy arena
    /// can hold the largest workload object.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> FrameResult<()> {
        if self.pool.capacity == 0 {
            return Err(FrameError::InvalidConfig(
                "pool.capacity must be greater than zero".into(),
            ));
        }
        if self.stack.arena_bytes == 0 {
            return Err(FrameError::InvalidConfig(
                "stack.arena_bytes must be greater than zero".into(),
            ));
        }

        let buddy = self.buddy.allocator_config();
        buddy
            .validate()
            .map_err(|err| FrameError::InvalidConfig(format!("buddy: {err}")))?;
        if buddy.arena_size() < ObjectKind::max_size() {
            return Err(FrameError::InvalidConfig(format!(
                "buddy arena of {} bytes cannot hold a {} byte object",
                buddy.arena_size(),
                ObjectKind::max_size()
            )));
        }
        Ok(())
    }
}
