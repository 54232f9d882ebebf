//! # Frame Driver Integration Tests
//!
//! Builds drivers from TOML and runs them for several frames.

use strata_alloc::{AllocError, UsageReport};
use strata_frame::{phase, FrameConfig, FrameDriver, FrameError};

const SMALL: &str = r"
frames = 5
seed = 7

[pool]
capacity = 128
objects_per_frame = 128

[stack]
arena_bytes = 262144
objects_per_frame = 20

[buddy]
max_level_exp = 20
min_level_exp = 9
allocations_per_frame = 40
";

#[test]
fn driver_from_toml_runs_clean() {
    let config = FrameConfig::from_toml_str(SMALL).unwrap();
    let frames = config.frames;
    let mut driver = FrameDriver::new(config).unwrap();

    let report = driver.run(frames).unwrap();
    assert_eq!(report.phase(phase::FRAME).unwrap().samples(), 5);

    // Every frame returns all memory.
    assert_eq!(driver.pool().usage().used_bytes, 0);
    assert_eq!(driver.stack().usage().used_bytes, 0);
    assert_eq!(driver.buddy().usage().used_bytes, 0);
    assert_eq!(driver.buddy().free_blocks_at(0), 1);
    driver.buddy().check_consistency().unwrap();
}

#[test]
fn one_driver_per_thread() {
    let config = FrameConfig::from_toml_str(SMALL).unwrap();
    let first = FrameDriver::new(config.clone()).unwrap();

    let err = FrameDriver::new(config.clone()).err().unwrap();
    assert!(matches!(
        err,
        FrameError::Alloc(AllocError::ArenaAlreadyCreated)
    ));

    drop(first);
    assert!(FrameDriver::new(config).is_ok());
}

#[test]
fn undersized_arena_is_survivable() {
    let mut config = FrameConfig::from_toml_str(SMALL).unwrap();
    // Room for a handful of objects only.
    config.stack.arena_bytes = 16 * 1024;
    let mut driver = FrameDriver::new(config).unwrap();

    for _ in 0..3 {
        let stats = driver.run_frame().unwrap();
        assert!(stats.stack < 20);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(driver.stack().current_size(), 0);
    }
}

#[test]
fn toggling_between_frames() {
    let config = FrameConfig::from_toml_str(SMALL).unwrap();
    let mut driver = FrameDriver::new(config).unwrap();

    driver.set_buddy_enabled(false).unwrap();
    let stats = driver.run_frame().unwrap();
    assert_eq!(stats.buddy, 0);
    assert_eq!(stats.pool, 128);
    assert!(!driver.buddy_enabled());

    driver.set_buddy_enabled(true).unwrap();
    driver.set_stack_enabled(false);
    let stats = driver.run_frame().unwrap();
    assert_eq!(stats.buddy, 40);
    assert_eq!(stats.stack, 0);
    assert!(!driver.stack().is_enabled());
}

#[test]
fn invalid_config_rejected_before_allocating() {
    let mut config = FrameConfig::default();
    config.buddy.min_level_exp = 30;
    let err = FrameDriver::new(config).err().unwrap();
    assert!(matches!(err, FrameError::InvalidConfig(_)));

    // Nothing was reserved, so a valid driver can still be built here.
    assert!(FrameDriver::new(FrameConfig::from_toml_str(SMALL).unwrap()).is_ok());
}
