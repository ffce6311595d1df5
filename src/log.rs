//! Leveled logging in the style the rest of this tree expects: a
//! module-level `log!` macro rather than a pull from the `log` crate.
//!
//! The level is fixed for the process lifetime by `Config::log_level`
//! (see `config.rs`), itself derived from `-v`/`-vv` flags and the
//! `DETCORE_LOG` environment variable.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum LogLevel {
    LogError,
    LogWarn,
    LogInfo,
    LogDebug,
}

impl LogLevel {
    pub fn from_verbosity(v: u64) -> LogLevel {
        match v {
            0 => LogLevel::LogWarn,
            1 => LogLevel::LogInfo,
            _ => LogLevel::LogDebug,
        }
    }

    pub fn from_env(s: &str) -> Option<LogLevel> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::LogError),
            "warn" | "warning" => Some(LogLevel::LogWarn),
            "info" => Some(LogLevel::LogInfo),
            "debug" => Some(LogLevel::LogDebug),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            LogLevel::LogError => "ERROR",
            LogLevel::LogWarn => "WARN",
            LogLevel::LogInfo => "INFO",
            LogLevel::LogDebug => "DEBUG",
        }
    }
}

lazy_static::lazy_static! {
    static ref CURRENT_LEVEL: Mutex<LogLevel> = Mutex::new(LogLevel::LogWarn);
    static ref LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);
}

/// Called once, early in `main`, from the parsed `Config`.
pub fn init(level: LogLevel, log_file: Option<&std::path::Path>) {
    *CURRENT_LEVEL.lock().unwrap() = level;
    if let Some(path) = log_file {
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap_or_else(|e| panic!("detcore: cannot open log file {:?}: {}", path, e));
        *LOG_FILE.lock().unwrap() = Some(f);
    }
}

pub fn enabled(level: LogLevel) -> bool {
    level <= *CURRENT_LEVEL.lock().unwrap()
}

/// Not part of the public logging surface; `log!` calls this.
pub fn write_line(level: LogLevel, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    let pid = std::process::id();
    eprintln!("[{} {}] {}", level.tag(), pid, args);
    if let Some(f) = LOG_FILE.lock().unwrap().as_mut() {
        let _ = writeln!(f, "[{} {}] {}", level.tag(), pid, args);
    }
}

/// `log!(LogDebug, "format {}", arg)` — mirrors the call sites already
/// written against this module elsewhere in the tree.
#[macro_export]
macro_rules! log {
    ($level:ident, $($arg:tt)*) => {
        $crate::log::write_line($crate::log::LogLevel::$level, format_args!($($arg)*))
    };
}

/// Log-and-panic helper used for conditions this crate treats as
/// programmer/environment bugs rather than recoverable runtime errors.
#[macro_export]
macro_rules! ed_assert {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::log!(LogError, $($arg)*);
            panic!($($arg)*);
        }
    };
}
