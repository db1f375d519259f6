// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

use thiserror::Error;

pub trait Configuration {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate the component configuration
    fn validate(&self) -> Result<(), Self::Error>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{0} must not be empty")]
    Empty(String),
    #[error("{field} contains {value} more than once")]
    Duplicate { field: String, value: String },
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Checks that `values` is non-empty, has no blank entry and no repeats
pub fn validate_unique_names<'a>(
    field: &str,
    values: impl IntoIterator<Item = &'a str>,
) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for value in values {
        if value.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                field: field.to_string(),
                reason: "blank entry".to_string(),
            });
        }
        if !seen.insert(value) {
            return Err(ConfigurationError::Duplicate {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
    }
    if seen.is_empty() {
        return Err(ConfigurationError::Empty(field.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names() {
        assert!(validate_unique_names("context_types", ["A", "B"]).is_ok());
        assert_eq!(
            validate_unique_names("context_types", []),
            Err(ConfigurationError::Empty("context_types".to_string()))
        );
        assert_eq!(
            validate_unique_names("context_types", ["A", "B", "A"]),
            Err(ConfigurationError::Duplicate {
                field: "context_types".to_string(),
                value: "A".to_string(),
            })
        );
        assert!(matches!(
            validate_unique_names("context_types", ["A", " "]),
            Err(ConfigurationError::Invalid { .. })
        ));
    }
}
