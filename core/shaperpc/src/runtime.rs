// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time;

use duration_str::{deserialize_duration, deserialize_option_duration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use shaperpc_config::component::configuration::{Configuration, ConfigurationError};
use shaperpc_runtime::MAX_TIMEOUT;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct RuntimeConfiguration {
    /// Timeout applied to client calls that do not set one
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    #[schemars(with = "Option<String>")]
    default_timeout: Option<time::Duration>,

    /// Upper bound of any deadline, requested or propagated
    #[serde(
        default = "default_max_timeout",
        deserialize_with = "deserialize_duration"
    )]
    #[schemars(with = "String")]
    max_timeout: time::Duration,
}

impl Default for RuntimeConfiguration {
    fn default() -> Self {
        RuntimeConfiguration {
            default_timeout: None,
            max_timeout: default_max_timeout(),
        }
    }
}

fn default_max_timeout() -> time::Duration {
    time::Duration::from_secs(MAX_TIMEOUT)
}

impl RuntimeConfiguration {
    pub fn new() -> Self {
        RuntimeConfiguration::default()
    }

    pub fn with_default_timeout(self, default_timeout: time::Duration) -> Self {
        RuntimeConfiguration {
            default_timeout: Some(default_timeout),
            ..self
        }
    }

    pub fn with_max_timeout(self, max_timeout: time::Duration) -> Self {
        RuntimeConfiguration {
            max_timeout,
            ..self
        }
    }

    pub fn default_timeout(&self) -> Option<time::Duration> {
        self.default_timeout
    }

    pub fn max_timeout(&self) -> time::Duration {
        self.max_timeout
    }
}

impl Configuration for RuntimeConfiguration {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.max_timeout.is_zero() {
            return Err(ConfigurationError::Invalid {
                field: "max_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        match self.default_timeout {
            Some(t) if t > self.max_timeout => Err(ConfigurationError::Invalid {
                field: "default_timeout".to_string(),
                reason: format!("{t:?} exceeds max_timeout {:?}", self.max_timeout),
            }),
            _ => Ok(()),
        }
    }
}
