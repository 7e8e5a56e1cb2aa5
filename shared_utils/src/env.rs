use std::path::PathBuf;

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The variable is not set (or is not valid unicode).
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but holds only whitespace.
    #[error("Environment variable {0} is empty")]
    Empty(String),
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Leading and trailing whitespace is trimmed; a value that trims to nothing
/// is reported as [`EnvError::Empty`].
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    let raw = std::env::var(name).map_err(|_| EnvError::Missing(name.to_string()))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvError::Empty(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Resolves a path from an explicit value, falling back to an environment variable.
///
/// Used by CLI flags that may be omitted when the caller exports the variable instead.
pub fn path_or_env(explicit: Option<PathBuf>, name: &str) -> Result<PathBuf, EnvError> {
    match explicit {
        Some(path) => Ok(path),
        None => get_env_var(name).map(PathBuf::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_over_env() {
        let got = path_or_env(Some(PathBuf::from("a.toml")), "SHARED_UTILS_TEST_UNSET_VAR").unwrap();
        assert_eq!(got, PathBuf::from("a.toml"));
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = get_env_var("SHARED_UTILS_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, EnvError::Missing(ref n) if n == "SHARED_UTILS_TEST_DEFINITELY_UNSET"));
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_TEST_DEFINITELY_UNSET"
        );
    }
}
