// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use shaperpc_config::component::configuration::{
    Configuration, ConfigurationError, validate_unique_names,
};
use shaperpc_contract::{ContextTypeSet, DEFAULT_CONTEXT_TYPES, SignatureClassifier};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ContractConfiguration {
    /// Parameter types treated as call context instead of payload
    #[serde(default = "default_context_types")]
    context_types: Vec<String>,
}

impl Default for ContractConfiguration {
    fn default() -> Self {
        ContractConfiguration {
            context_types: default_context_types(),
        }
    }
}

fn default_context_types() -> Vec<String> {
    DEFAULT_CONTEXT_TYPES.iter().map(|s| s.to_string()).collect()
}

impl ContractConfiguration {
    pub fn new() -> Self {
        ContractConfiguration::default()
    }

    pub fn with_context_types(context_types: Vec<String>) -> Self {
        ContractConfiguration { context_types }
    }

    pub fn context_types(&self) -> &[String] {
        &self.context_types
    }

    pub fn classifier(&self) -> SignatureClassifier {
        SignatureClassifier::new(ContextTypeSet::new(self.context_types.iter().cloned()))
    }
}

impl Configuration for ContractConfiguration {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        validate_unique_names(
            "context_types",
            self.context_types.iter().map(String::as_str),
        )
    }
}
