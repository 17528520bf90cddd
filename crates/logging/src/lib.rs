//! LedgerSoak Logging
//!
//! Subscriber setup shared by the binaries. `RUST_LOG` always wins over the
//! level passed in; consistency violations log under
//! `ledgersoak::consistency` and network failures under `ledgersoak::network`,
//! so either can be filtered on its own:
//!
//! ```text
//! RUST_LOG=warn,ledgersoak::consistency=error ledgersoak run --simulate 5
//! ```

use std::fmt;

use tracing_subscriber::{fmt as layer_fmt, prelude::*, EnvFilter};

/// Default verbosity when `RUST_LOG` is unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Filter directive: `level` for dependencies, at least debug for our crates.
    pub fn directive(self) -> String {
        match self {
            LogLevel::Info => "info,ledgersoak=debug".to_string(),
            LogLevel::Error | LogLevel::Warn => self.as_str().to_string(),
            LogLevel::Debug | LogLevel::Trace => {
                format!("{level},ledgersoak={level}", level = self.as_str())
            }
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global subscriber already installed.
#[derive(Debug)]
pub struct AlreadyInitialized;

impl fmt::Display for AlreadyInitialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("global tracing subscriber already initialized")
    }
}

impl std::error::Error for AlreadyInitialized {}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()))
}

/// Install the fmt subscriber, failing if one is already set.
pub fn try_init_logging(level: LogLevel) -> Result<(), AlreadyInitialized> {
    tracing_subscriber::registry()
        .with(layer_fmt::layer())
        .with(filter_for(level))
        .try_init()
        .map_err(|_| AlreadyInitialized)
}

/// Install the fmt subscriber; a second call is a no-op.
pub fn init_logging(level: LogLevel) {
    let _ = try_init_logging(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verbose() {
        assert_eq!(LogLevel::from_verbose(false), LogLevel::Info);
        assert_eq!(LogLevel::from_verbose(true), LogLevel::Debug);
    }

    #[test]
    fn test_directives_parse() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            let directive = level.directive();
            assert!(directive.parse::<EnvFilter>().is_ok(), "{directive}");
        }
        assert_eq!(LogLevel::Info.directive(), "info,ledgersoak=debug");
    }

    #[test]
    fn test_second_init_is_rejected() {
        init_logging(LogLevel::Warn);
        assert!(try_init_logging(LogLevel::Debug).is_err());
    }
}
