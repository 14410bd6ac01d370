//! FFmpeg console verbosity.
//!
//! FFmpeg logs to stderr on its own, independently of the [`log`] facade the
//! rest of the crate uses. Decoding many videos in parallel makes that output
//! interleave with progress bars, so callers usually want it quieter than the
//! library default.
//!
//! ```no_run
//! use silhouette::FfmpegLogLevel;
//!
//! silhouette::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::str::FromStr;

use ffmpeg_next::util::log::Level;
use log::LevelFilter;

/// FFmpeg log verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl FfmpegLogLevel {
    /// The FFmpeg level that mirrors a `log` filter, so `--log-level debug`
    /// also opens up FFmpeg's own diagnostics.
    pub fn from_log_filter(filter: LevelFilter) -> Self {
        match filter {
            LevelFilter::Off => FfmpegLogLevel::Quiet,
            LevelFilter::Error => FfmpegLogLevel::Fatal,
            LevelFilter::Warn => FfmpegLogLevel::Error,
            LevelFilter::Info => FfmpegLogLevel::Error,
            LevelFilter::Debug => FfmpegLogLevel::Warning,
            LevelFilter::Trace => FfmpegLogLevel::Debug,
        }
    }

    fn to_ffmpeg(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }

    fn from_ffmpeg(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic | Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info | Level::Verbose => FfmpegLogLevel::Info,
            Level::Debug | Level::Trace => FfmpegLogLevel::Debug,
        }
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "quiet" => Ok(FfmpegLogLevel::Quiet),
            "fatal" => Ok(FfmpegLogLevel::Fatal),
            "error" => Ok(FfmpegLogLevel::Error),
            "warning" | "warn" => Ok(FfmpegLogLevel::Warning),
            "info" => Ok(FfmpegLogLevel::Info),
            "debug" => Ok(FfmpegLogLevel::Debug),
            other => Err(format!("unknown FFmpeg log level: {other}")),
        }
    }
}

/// Set FFmpeg's own stderr verbosity. Does not touch the `log` facade.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg());
}

/// Current FFmpeg verbosity, if FFmpeg reports a level it knows.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_set_on_ffmpeg_reads_back() {
        for level in [FfmpegLogLevel::Warning, FfmpegLogLevel::Quiet] {
            set_ffmpeg_log_level(level);
            assert_eq!(get_ffmpeg_log_level(), Some(level));
        }
    }

    #[test]
    fn parse_levels() {
        assert_eq!("quiet".parse(), Ok(FfmpegLogLevel::Quiet));
        assert_eq!("WARN".parse(), Ok(FfmpegLogLevel::Warning));
        assert_eq!("debug".parse(), Ok(FfmpegLogLevel::Debug));
        assert!("loud".parse::<FfmpegLogLevel>().is_err());
    }

    #[test]
    fn log_filter_keeps_ffmpeg_quieter_than_rust_side() {
        assert_eq!(
            FfmpegLogLevel::from_log_filter(LevelFilter::Off),
            FfmpegLogLevel::Quiet
        );
        assert_eq!(
            FfmpegLogLevel::from_log_filter(LevelFilter::Info),
            FfmpegLogLevel::Error
        );
        assert_eq!(
            FfmpegLogLevel::from_log_filter(LevelFilter::Trace),
            FfmpegLogLevel::Debug
        );
    }
}
