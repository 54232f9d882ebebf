//! # Command-Line Arguments
//!
//! `strata_frame [--config <file.toml>] [--frames <n>] [--help]`

use std::path::PathBuf;

use crate::error::{FrameError, FrameResult};

/// Parsed command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// TOML file to load instead of the defaults.
    pub config: Option<PathBuf>,
    /// Overrides `frames` from the configuration.
    pub frames: Option<u64>,
    /// Print usage and exit.
    pub help: bool,
}

impl CliArgs {
    /// Parses arguments, skipping the program name in `args[0]`.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidConfig`] for an unknown flag, a flag missing its
    /// value, or a frame count that is not a non-negative integer.
    pub fn parse(args: &[String]) -> FrameResult<Self> {
        let mut parsed = Self::default();
        let mut rest = args.iter().skip(1);

        while let Some(arg) = rest.next() {
            match arg.as_str() {
                "--help" | "-h" => parsed.help = true,
                "--config" => {
                    let path = rest.next().ok_or_else(|| missing_value("--config"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--frames" => {
                    let value = rest.next().ok_or_else(|| missing_value("--frames"))?;
                    let frames = value.parse().map_err(|_| {
                        FrameError::InvalidConfig(format!(
                            "--frames expects a frame count, got '{value}'"
                        ))
                    })?;
                    parsed.frames = Some(frames);
                }
                other => {
                    return Err(FrameError::InvalidConfig(format!(
                        "unknown argument '{other}'"
                    )));
                }
            }
        }
        Ok(parsed)
    }
}

fn missing_value(flag: &str) -> FrameError {
    FrameError::InvalidConfig(format!("{flag} expects a value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("strata_frame")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(CliArgs::parse(&args(&[])).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_config_and_frames() {
        let parsed = CliArgs::parse(&args(&["--frames", "12", "--config", "run.toml"])).unwrap();
        assert_eq!(parsed.frames, Some(12));
        assert_eq!(parsed.config, Some(PathBuf::from("run.toml")));
        assert!(!parsed.help);
    }

    #[test]
    fn test_bad_frame_count_rejected() {
        for bad in ["abc", "-3", "1.5"] {
            let err = CliArgs::parse(&args(&["--frames", bad])).unwrap_err();
            assert!(matches!(err, FrameError::InvalidConfig(_)), "{bad}");
        }
    }

    #[test]
    fn test_missing_value_and_unknown_flag() {
        assert!(matches!(
            CliArgs::parse(&args(&["--frames"])),
            Err(FrameError::InvalidConfig(_))
        ));
        assert!(matches!(
            CliArgs::parse(&args(&["--verbose"])),
            Err(FrameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_help() {
        assert!(CliArgs::parse(&args(&["-h"])).unwrap().help);
    }
}
