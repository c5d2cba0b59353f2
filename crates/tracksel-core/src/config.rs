#![forbid(unsafe_code)]

//! Execution-mode configuration.
//!
//! Debug-only instrumentation (trace hooks on tracking frames) is gated on an
//! explicit [`ExecutionMode`]. The mode lives in a per-thread slot installed
//! with [`TrackingConfig::install`]; the runtime never consults the process
//! environment directly. [`TrackingConfig::from_env`] is the one place that
//! does, for binaries that want `TRACKSEL_MODE` to drive it.

use std::cell::Cell;
use std::env;

/// Environment variable read by [`TrackingConfig::from_env`].
pub const MODE_ENV_VAR: &str = "TRACKSEL_MODE";

/// How much development instrumentation is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Trace hooks are never read or invoked.
    #[default]
    Production,
    /// Trace hooks run.
    Development,
    /// Trace hooks run; intended for test harnesses.
    Test,
}

impl ExecutionMode {
    /// Whether trace hooks should be honored.
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }

    /// Parse a mode name. Unknown names map to [`ExecutionMode::Production`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("development") || name.eq_ignore_ascii_case("dev") {
            Self::Development
        } else if name.eq_ignore_ascii_case("test") {
            Self::Test
        } else {
            Self::Production
        }
    }
}

/// Per-thread tracking configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingConfig {
    pub mode: ExecutionMode,
}

thread_local! {
    static CURRENT: Cell<TrackingConfig> = const {
        Cell::new(TrackingConfig { mode: ExecutionMode::Production })
    };
}

impl TrackingConfig {
    #[must_use]
    pub const fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    /// Build a config from `TRACKSEL_MODE`, falling back to defaults when the
    /// variable is unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var(MODE_ENV_VAR) {
            config.mode = ExecutionMode::parse(&val);
        }
        config
    }

    /// Make this the configuration for the calling thread. Returns the
    /// previously installed config.
    pub fn install(self) -> Self {
        tracing::debug!(message = "tracksel.config.install", mode = ?self.mode);
        CURRENT.with(|slot| slot.replace(self))
    }

    /// The configuration installed on the calling thread.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(Cell::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_production() {
        assert_eq!(TrackingConfig::default().mode, ExecutionMode::Production);
        assert!(!ExecutionMode::Production.is_debug());
    }

    #[test]
    fn parse_mode_names() {
        assert_eq!(ExecutionMode::parse("development"), ExecutionMode::Development);
        assert_eq!(ExecutionMode::parse("DEV"), ExecutionMode::Development);
        assert_eq!(ExecutionMode::parse(" test "), ExecutionMode::Test);
        assert_eq!(ExecutionMode::parse("production"), ExecutionMode::Production);
        assert_eq!(ExecutionMode::parse("staging"), ExecutionMode::Production);
        assert!(ExecutionMode::Test.is_debug());
        assert!(ExecutionMode::Development.is_debug());
    }

    #[test]
    fn install_is_thread_local() {
        let previous = TrackingConfig::new(ExecutionMode::Test).install();
        assert_eq!(TrackingConfig::current().mode, ExecutionMode::Test);

        let other = std::thread::spawn(|| TrackingConfig::current().mode)
            .join()
            .unwrap();
        assert_eq!(other, ExecutionMode::Production);

        previous.install();
    }
}
