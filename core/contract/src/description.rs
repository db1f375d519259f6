// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Output of the contract analyzer

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use twox_hash::XxHash64;

use crate::error::ContractError;
use crate::naming;
use crate::operation::{MethodRef, OperationDescriptor};

/// Why a method is not part of the compiled operation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// The signature could not be mapped onto an RPC shape
    UnsupportedSignature,
    /// Another method maps to the same service and operation name
    NamingConflict,
    /// The method is not marked as an operation, or its interface is not a service
    NotOperation,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::UnsupportedSignature => "unsupported signature",
            DiagnosticKind::NamingConflict => "naming conflict",
            DiagnosticKind::NotOperation => "not an operation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotSupportedMethod {
    pub method: MethodRef,
    pub diagnostic: Diagnostic,
}

/// A blocking method served by an equivalent async operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOverAsync {
    pub sync_method: MethodRef,
    pub async_method: MethodRef,
    /// Path of the operation that serves both methods
    pub operation_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub interface_name: String,
    pub service_name: String,
    pub operations: Vec<OperationDescriptor>,
    pub not_supported: Vec<NotSupportedMethod>,
    pub sync_over_async: Vec<SyncOverAsync>,
    /// Parents of this interface that are not services
    pub plain_parents: Vec<String>,
}

/// A non-service interface reached through inheritance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescription {
    pub interface_name: String,
    pub methods: Vec<NotSupportedMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescription {
    pub contract_name: String,
    pub services: Vec<ServiceDescription>,
    pub interfaces: Vec<InterfaceDescription>,
}

impl ContractDescription {
    /// All compiled operations, service by service
    pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.services.iter().flat_map(|s| s.operations.iter())
    }

    pub fn operation(&self, path: &str) -> Option<&OperationDescriptor> {
        self.operations().find(|op| op.path() == path)
    }

    pub fn service(&self, service_name: &str) -> Option<&ServiceDescription> {
        self.services.iter().find(|s| s.service_name == service_name)
    }

    /// Every rejected method, including the ones of plain interfaces
    pub fn diagnostics(&self) -> impl Iterator<Item = &NotSupportedMethod> {
        self.services
            .iter()
            .flat_map(|s| s.not_supported.iter())
            .chain(self.interfaces.iter().flat_map(|i| i.methods.iter()))
    }

    pub fn sync_over_async(&self) -> impl Iterator<Item = &SyncOverAsync> {
        self.services.iter().flat_map(|s| s.sync_over_async.iter())
    }

    /// Emits one warning per diagnostic and per non-service parent
    pub fn log_diagnostics(&self) {
        for service in &self.services {
            for entry in &service.not_supported {
                warn!(
                    service = %service.service_name,
                    method = %entry.method,
                    kind = %entry.diagnostic.kind,
                    "{}",
                    entry.diagnostic.message
                );
            }
            for parent in &service.plain_parents {
                warn!(
                    service = %service.service_name,
                    parent = %parent,
                    "parent interface is not a service, its methods are not exposed"
                );
            }
            for pair in &service.sync_over_async {
                debug!(
                    sync = %pair.sync_method,
                    operation = %pair.operation_path,
                    "sync method served by async operation"
                );
            }
        }

        for interface in &self.interfaces {
            for entry in &interface.methods {
                warn!(
                    interface = %interface.interface_name,
                    method = %entry.method,
                    kind = %entry.diagnostic.kind,
                    "{}",
                    entry.diagnostic.message
                );
            }
        }
    }

    /// Stable hash of the canonical JSON rendering
    pub fn fingerprint(&self) -> Result<u64, ContractError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(XxHash64::oneshot(0, &bytes))
    }

    /// Name under which generated artifacts for this contract are cached
    pub fn artifact_name(&self) -> Result<String, ContractError> {
        Ok(format!(
            "{}_{:016x}",
            naming::normalize(&self.contract_name),
            self.fingerprint()?
        ))
    }
}
