//! Error types for configuration handling.

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    Missing(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = ConfigError::Missing("trust.domains".to_string());
        assert_eq!(err.to_string(), "missing configuration: trust.domains");

        let err = ConfigError::Invalid("binding type FOO".to_string());
        assert_eq!(err.to_string(), "invalid configuration: binding type FOO");
    }
}
