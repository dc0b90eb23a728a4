use std::fmt;

use serde::{Deserialize, Serialize};

/// Default call-depth limit for console code.
///
/// Lower in debug builds, where each evaluator frame uses considerably more native stack.
#[cfg(debug_assertions)]
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 20;
#[cfg(not(debug_assertions))]
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 200;

/// Name console code is compiled under, as shown in tracebacks and syntax errors.
pub const DEFAULT_FILENAME: &str = "<console>";

/// Settings for console sessions.
///
/// Every field has a default, so a partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Source name for tracebacks, e.g. `<console>`.
    pub filename: String,
    /// Maximum nesting of function calls made by console code.
    pub max_recursion_depth: usize,
    /// Echo the `repr()` of console-level expression statements to the output channel.
    pub echo_expressions: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_owned(),
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            echo_expressions: true,
        }
    }
}

impl ConsoleConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    #[must_use]
    pub fn max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    #[must_use]
    pub fn echo_expressions(mut self, echo: bool) -> Self {
        self.echo_expressions = echo;
        self
    }

    /// Loads a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings can drive a console.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.is_empty() {
            return Err(ConfigError::Invalid("filename must not be empty".to_owned()));
        }
        if self.max_recursion_depth == 0 {
            return Err(ConfigError::Invalid("max_recursion_depth must be at least 1".to_owned()));
        }
        Ok(())
    }
}

/// Failure to load a [`ConsoleConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for this configuration.
    Parse(serde_json::Error),
    /// The document parsed but holds an unusable value.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid console configuration: {err}"),
            Self::Invalid(msg) => write!(f, "invalid console configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}
