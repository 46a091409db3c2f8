use std::str::FromStr;

use derive_more::Display;
use thiserror::Error;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// Language edition; only changes where tail-expression temporaries die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display)]
pub enum Edition {
    #[display("2015")]
    E2015,
    #[display("2018")]
    E2018,
    #[default]
    #[display("2021")]
    E2021,
    #[display("2024")]
    E2024,
}

impl Edition {
    /// From 2024 on, temporaries of a block's tail expression are dropped
    /// before the block's locals.
    pub fn tail_temporaries_drop_first(self) -> bool {
        self >= Edition::E2024
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown edition `{0}`")]
pub struct ParseEditionError(String);

impl FromStr for Edition {
    type Err = ParseEditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2015" => Ok(Edition::E2015),
            "2018" => Ok(Edition::E2018),
            "2021" => Ok(Edition::E2021),
            "2024" => Ok(Edition::E2024),
            other => Err(ParseEditionError(other.to_string())),
        }
    }
}

/// Per-program settings of the MIR builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub edition: Edition,
    /// Emit overflow and shift assertions for arithmetic.
    pub overflow_checks: bool,
    /// Record per-item failures as diagnostics instead of aborting.
    pub tolerate_errors: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            edition: Edition::default(),
            overflow_checks: true,
            tolerate_errors: false,
        }
    }
}

impl BuildConfig {
    /// Defaults overridden by `RSMIR_EDITION`, `RSMIR_OVERFLOW_CHECKS` and
    /// `RSMIR_TOLERATE_ERRORS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("RSMIR_EDITION") {
            match raw.parse::<Edition>() {
                Ok(edition) => config.edition = edition,
                Err(err) => {
                    tracing::warn!("ignoring RSMIR_EDITION: {}", err);
                }
            }
        }
        if let Some(checks) = env_true("RSMIR_OVERFLOW_CHECKS") {
            config.overflow_checks = checks;
        }
        config.tolerate_errors = bool_from_env("RSMIR_TOLERATE_ERRORS");
        config
    }

    pub fn with_edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    pub fn with_overflow_checks(mut self, enabled: bool) -> Self {
        self.overflow_checks = enabled;
        self
    }

    pub fn with_error_tolerance(mut self, enabled: bool) -> Self {
        self.tolerate_errors = enabled;
        self
    }
}
