// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Value providers for configuration files
//!
//! String values may reference external data as `${provider:key}`, for
//! example `${env:SHAPERPC_TIMEOUT}` or `${file:/run/secrets/token}`.
//! [`ConfigResolver`] replaces every reference in a YAML document.

pub mod env;
pub mod file;

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_yaml::Value;
use thiserror::Error;

pub use env::EnvConfigProvider;
pub use file::FileConfigProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("environment variable {name}: {reason}")]
    Env { name: String, reason: String },
    #[error("unknown provider {0}")]
    UnknownProvider(String),
}

pub trait ConfigProvider: Send + Sync {
    /// Load the value identified by `key`
    fn load(&self, key: &str) -> Result<String, ProviderError>;
}

lazy_static! {
    static ref REFERENCE: Regex = Regex::new(r"\$\{([a-z]+):([^}]+)\}").unwrap();
}

pub struct ConfigResolver {
    providers: HashMap<&'static str, Box<dyn ConfigProvider>>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver with the `env` and `file` providers
    pub fn new() -> Self {
        let mut providers: HashMap<&'static str, Box<dyn ConfigProvider>> = HashMap::new();
        providers.insert("env", Box::new(EnvConfigProvider));
        providers.insert("file", Box::new(FileConfigProvider));
        Self { providers }
    }

    pub fn with_provider(
        mut self,
        scheme: &'static str,
        provider: Box<dyn ConfigProvider>,
    ) -> Self {
        self.providers.insert(scheme, provider);
        self
    }

    /// Replace all references found in `value`, recursively
    pub fn resolve(&self, value: &mut Value) -> Result<(), ProviderError> {
        match value {
            Value::String(s) => {
                if let Some(resolved) = self.resolve_str(s)? {
                    *s = resolved;
                }
            }
            Value::Sequence(items) => {
                for item in items {
                    self.resolve(item)?;
                }
            }
            Value::Mapping(mapping) => {
                for (_, item) in mapping.iter_mut() {
                    self.resolve(item)?;
                }
            }
            Value::Tagged(tagged) => self.resolve(&mut tagged.value)?,
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
        Ok(())
    }

    /// Resolved copy of `input`, None when it holds no reference
    pub fn resolve_str(&self, input: &str) -> Result<Option<String>, ProviderError> {
        if !REFERENCE.is_match(input) {
            return Ok(None);
        }

        let mut failure = None;
        let resolved = REFERENCE.replace_all(input, |caps: &Captures| {
            let scheme = &caps[1];
            let key = &caps[2];
            let loaded = self
                .providers
                .get(scheme)
                .ok_or_else(|| ProviderError::UnknownProvider(scheme.to_string()))
                .and_then(|provider| provider.load(key));
            match loaded {
                Ok(v) => {
                    tracing::debug!(%scheme, %key, "resolved configuration reference");
                    v
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(Some(resolved.into_owned())),
        }
    }
}
