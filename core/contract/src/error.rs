// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("contract {0} does not contain any service interface")]
    ContractEmpty(String),
    #[error("contract description serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
