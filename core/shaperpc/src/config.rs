// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0
//
// ConfigLoader reads the configuration file once and exposes lazy, cached
// accessors for tracing, contract and runtime sections. Tracing and runtime
// fall back to defaults when malformed, the contract section is validated.

use std::collections::HashSet;

use lazy_static::lazy_static;
use schemars::{JsonSchema, Schema, schema_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Value, from_str};
use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::ContractConfiguration;
use crate::runtime::RuntimeConfiguration;
use shaperpc_config::component::configuration::Configuration;
use shaperpc_config::provider::ConfigResolver;
use shaperpc_tracing::TracingConfiguration;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration - impossible to parse yaml")]
    InvalidYaml,
    #[error("invalid configuration - key {0} not valid")]
    InvalidKey(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("yaml parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("invalid configuration - resolver failed: {0}")]
    ResolverError(String),
}

lazy_static! {
    static ref CONFIG_KEYS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("tracing");
        s.insert("contract");
        s.insert("runtime");
        s
    };
}

/// Layout of the whole configuration file
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct ConfigurationFile {
    tracing: Option<TracingConfiguration>,
    contract: Option<ContractConfiguration>,
    runtime: Option<RuntimeConfiguration>,
}

/// JSON schema of the configuration file
pub fn configuration_schema() -> Schema {
    schema_for!(ConfigurationFile)
}

pub struct ConfigLoader {
    root: Value,
    tracing: Option<TracingConfiguration>,
    contract: Option<ContractConfiguration>,
    runtime: Option<RuntimeConfiguration>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root_keys = self
            .root
            .as_mapping()
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.as_str())
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();

        f.debug_struct("ConfigLoader")
            .field("root_keys", &root_keys)
            .field("tracing_loaded", &self.tracing.is_some())
            .field("contract_loaded", &self.contract.is_some())
            .field("runtime_loaded", &self.runtime.is_some())
            .finish()
    }
}

impl ConfigLoader {
    pub fn new(file_path: &str) -> Result<Self, ConfigError> {
        let config_str =
            std::fs::read_to_string(file_path).map_err(|e| ConfigError::NotFound(e.to_string()))?;
        debug!(path = %file_path, "configuration file read");
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let mut root: Value = from_str(config_str).map_err(|_| ConfigError::InvalidYaml)?;
        if root.is_null() {
            root = Value::Mapping(Default::default());
        }

        let mapping = root.as_mapping().ok_or(ConfigError::InvalidYaml)?;
        for key in mapping.keys() {
            let k = key.as_str().ok_or(ConfigError::InvalidYaml)?;
            if !CONFIG_KEYS.contains(k) {
                return Err(ConfigError::InvalidKey(k.to_string()));
            }
        }

        ConfigResolver::new()
            .resolve(&mut root)
            .map_err(|e| ConfigError::ResolverError(e.to_string()))?;

        Ok(Self {
            root,
            tracing: None,
            contract: None,
            runtime: None,
        })
    }

    pub fn tracing(&mut self) -> &TracingConfiguration {
        let root = &self.root;
        self.tracing
            .get_or_insert_with(|| section_or_default(root, "tracing"))
    }

    pub fn runtime(&mut self) -> &RuntimeConfiguration {
        let root = &self.root;
        self.runtime.get_or_insert_with(|| {
            let cfg: RuntimeConfiguration = section_or_default(root, "runtime");
            if let Err(e) = cfg.validate() {
                warn!(error = %e, "invalid runtime config, falling back to default");
                return RuntimeConfiguration::default();
            }
            cfg
        })
    }

    pub fn contract(&mut self) -> Result<&ContractConfiguration, ConfigError> {
        if self.contract.is_none() {
            let cfg = match self.root.get("contract") {
                Some(value) => serde_yaml::from_value::<ContractConfiguration>(value.clone())?,
                None => ContractConfiguration::default(),
            };
            cfg.validate().map_err(|e| {
                debug!(error = ?e, "contract configuration validation failed");
                ConfigError::Invalid(e.to_string())
            })?;
            debug!(?cfg, "Contract configuration loaded");
            self.contract = Some(cfg);
        }
        Ok(self.contract.get_or_insert_with(ContractConfiguration::default))
    }
}

fn section_or_default<T>(root: &Value, key: &str) -> T
where
    T: DeserializeOwned + Default + std::fmt::Debug,
{
    let cfg = root
        .get(key)
        .cloned()
        .map(|v| {
            serde_yaml::from_value(v).unwrap_or_else(|e| {
                warn!(
                    section = %key,
                    error = ?e,
                    "invalid config section, falling back to default"
                );
                T::default()
            })
        })
        .unwrap_or_default();
    debug!(section = %key, ?cfg, "configuration section loaded");
    cfg
}
