// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use shaperpc_contract::{ContractDescription, ContractError};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid contract description: {0}")]
    Description(#[from] serde_json::Error),
    #[error("invalid parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },
    #[error("contract {0} has no operations")]
    NoOperations(String),
}

/// A generated source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub file_name: String,
    pub content: String,
}

/// Read a JSON encoded ContractDescription
pub fn read_description(mut reader: impl Read) -> Result<ContractDescription, GenerateError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

/// Write `artifact` into `dir` unless a file with its name already exists
///
/// Returns whether the file was written. Artifact names embed the contract
/// fingerprint, so an existing file holds the same content.
pub fn write_artifact(dir: &Path, artifact: &GeneratedArtifact) -> Result<bool, GenerateError> {
    fs::create_dir_all(dir)?;
    let path: PathBuf = dir.join(&artifact.file_name);

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "artifact already present");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(artifact.content.as_bytes())?;
    debug!(path = %path.display(), bytes = artifact.content.len(), "artifact written");
    Ok(true)
}

/// Parse parameters from the parameter string
/// Format: "key1=value1,key2=value2"
pub fn parse_parameters(param_str: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if param_str.is_empty() {
        return params;
    }

    for pair in param_str.split(',') {
        if let Some((key, value)) = pair.split_once('=') {
            params.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    params
}
