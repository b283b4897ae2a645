//! Named log streams
//!
//! Each stream is a `log` target with its own level threshold. `RUST_LOG`
//! is applied on top of the configured levels.

use std::collections::BTreeMap;
use std::str::FromStr;

use log::LevelFilter;

use crate::error::{SfcError, SfcResult};

pub const PARSER: &str = "sfc::parser";
pub const SOLVER: &str = "sfc::solver";
pub const MODEL: &str = "sfc::model";
/// Per-pass detail of the configured trace step
pub const TRACE: &str = "sfc::trace";
pub const TIMESERIES: &str = "sfc::timeseries";

pub const STREAMS: [&str; 5] = [PARSER, SOLVER, MODEL, TRACE, TIMESERIES];

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub default_level: LevelFilter,
    /// target -> threshold
    pub streams: BTreeMap<String, LevelFilter>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::Warn,
            streams: BTreeMap::new(),
        }
    }
}

impl LogSettings {
    /// Set one stream's threshold; `solver` is short for `sfc::solver`
    pub fn stream(mut self, name: &str, level: LevelFilter) -> Self {
        self.streams.insert(target_of(name), level);
        self
    }

    /// Parse `name=level` (or a bare level for the default)
    pub fn apply(&mut self, spec: &str) -> SfcResult<()> {
        match spec.split_once('=') {
            Some((name, level)) => {
                self.streams.insert(target_of(name.trim()), parse_level(level)?);
            }
            None => self.default_level = parse_level(spec)?,
        }
        Ok(())
    }

    pub fn builder(&self) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(self.default_level);
        for (target, level) in &self.streams {
            builder.filter_module(target, *level);
        }
        builder.parse_default_env();
        builder
    }
}

fn target_of(name: &str) -> String {
    if name.starts_with("sfc") {
        name.to_string()
    } else {
        format!("sfc::{}", name)
    }
}

fn parse_level(text: &str) -> SfcResult<LevelFilter> {
    LevelFilter::from_str(text.trim())
        .map_err(|_| SfcError::Syntax(format!("unknown log level '{}'", text.trim())))
}

/// Install the global logger; later calls leave the first logger in place
pub fn init(settings: &LogSettings) -> Result<(), log::SetLoggerError> {
    settings.builder().try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_specs() {
        let mut settings = LogSettings::default();
        settings.apply("solver=debug").unwrap();
        settings.apply("sfc::trace=info").unwrap();
        settings.apply("error").unwrap();
        assert_eq!(settings.streams[SOLVER], LevelFilter::Debug);
        assert_eq!(settings.streams[TRACE], LevelFilter::Info);
        assert_eq!(settings.default_level, LevelFilter::Error);
        assert!(settings.apply("model=loud").is_err());
    }

    #[test]
    fn test_stream_names() {
        let settings = LogSettings::default().stream("model", LevelFilter::Trace);
        assert!(settings.streams.contains_key(MODEL));
        assert!(STREAMS.iter().all(|s| s.starts_with("sfc::")));
    }
}
