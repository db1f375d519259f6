// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Structured fault detail carried in trailing metadata
//!
//! The server filter serializes a [`Fault`] found as the cause of a failed
//! call into [`ERROR_DETAIL_KEY`] and tags it with [`ERROR_DETAIL_TYPE_KEY`].
//! The client filter restores it as the cause of the received status.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::filter::{Filter, Next};
use crate::status::{Code, Status};
use crate::value::Value;

pub const ERROR_DETAIL_KEY: &str = "shaperpc-error-detail-bin";
pub const ERROR_DETAIL_TYPE_KEY: &str = "shaperpc-error-detail-type";

/// Type tag of a bincode encoded [`Fault`]
pub const FAULT_TYPE: &str = "shaperpc.Fault/bincode";

/// Application level failure with a machine readable detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: String,
    pub message: String,
    pub detail: Value,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            detail: Value::Nil,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// A status with `code` caused by this fault
    pub fn into_status(self, code: Code) -> Status {
        Status::new(code, self.to_string()).with_source(Arc::new(self))
    }

    fn encode(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    fn decode(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(fault, _)| fault)
    }
}

/// Writes the fault detail of failed calls into the status metadata
#[derive(Debug, Default)]
pub struct ServerErrorDetailFilter;

#[async_trait]
impl Filter for ServerErrorDetailFilter {
    async fn invoke(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
        let Err(mut status) = next.run(ctx).await else {
            return Ok(());
        };
        let Some(fault) = status.cause::<Fault>() else {
            return Err(status);
        };
        match fault.encode() {
            Ok(bytes) => {
                let metadata = status.metadata_mut();
                metadata.insert_bin(ERROR_DETAIL_KEY, bytes);
                metadata.insert(ERROR_DETAIL_TYPE_KEY, FAULT_TYPE);
                debug!(path = %ctx.path(), "attached fault detail");
            }
            Err(e) => warn!(path = %ctx.path(), error = %e, "failed to encode fault detail"),
        }
        Err(status)
    }
}

/// Restores fault detail sent by the server as the status cause
#[derive(Debug, Default)]
pub struct ClientErrorDetailFilter;

#[async_trait]
impl Filter for ClientErrorDetailFilter {
    async fn invoke(&self, ctx: &mut CallContext, next: Next<'_>) -> Result<(), Status> {
        let Err(status) = next.run(ctx).await else {
            return Ok(());
        };
        Err(restore_fault(status))
    }
}

/// Decodes the fault detail of `status`, if any, into its cause
pub fn restore_fault(status: Status) -> Status {
    if status.metadata().get(ERROR_DETAIL_TYPE_KEY) != Some(FAULT_TYPE) {
        return status;
    }
    let Some(bytes) = status.metadata().get_bin(ERROR_DETAIL_KEY) else {
        return status;
    };
    match Fault::decode(bytes) {
        Ok(fault) => status.with_source(Arc::new(fault)),
        Err(e) => {
            warn!(error = %e, "failed to decode fault detail");
            status
        }
    }
}
