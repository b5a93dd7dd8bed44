//! Configuration loading.
//!
//! Deployment configuration is written as TOML. The types that describe it
//! live next to the code that consumes them; this module only turns text
//! into those types.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{ConfigError, ConfigResult};

/// Parses configuration from a TOML string.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the text is not valid TOML or does not
/// match the target type (including unknown keys on types that deny them).
pub fn from_toml_str<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = toml::from_str(content)?;
    Ok(config)
}

/// Loads configuration from a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Parse`] if its content is invalid.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "loading configuration");
    from_toml_str(&content)
}

/// Loads configuration from a TOML file, falling back to the type's default
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_file_or_default<T: DeserializeOwned + Default>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let path = path.as_ref();
    if path.exists() {
        load_file(path)
    } else {
        Ok(T::default())
    }
}

/// Splits a comma and whitespace separated list into its non-empty tokens.
///
/// Used for list-valued settings such as trusted domains and role keys.
#[must_use]
pub fn tokenize(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
