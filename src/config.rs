//! Process-wide configuration, assembled once from CLI flags and the
//! `DETCORE_LOG` environment variable and stashed in a `lazy_static`
//! singleton.

use crate::log::LogLevel;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_opts(verbosity: u64, log_file: Option<PathBuf>) -> Config {
        let log_level = match std::env::var("DETCORE_LOG")
            .ok()
            .and_then(|s| LogLevel::from_env(&s))
        {
            Some(level) => level,
            None => LogLevel::from_verbosity(verbosity),
        };
        Config {
            log_level,
            log_file,
        }
    }
}
