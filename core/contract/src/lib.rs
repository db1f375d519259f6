// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Contract compiler
//!
//! Maps a declaratively described service interface onto the four RPC call
//! shapes: [`SignatureClassifier`] assigns shapes and parameter roles,
//! [`MessageShapeBuilder`] synthesizes the positional envelopes and
//! [`ContractAnalyzer`] turns a whole interface hierarchy into a
//! [`ContractDescription`] consumed by a [`CodegenBackend`].

pub mod analyzer;
pub mod backend;
pub mod cache;
pub mod classifier;
pub mod description;
pub mod error;
pub mod interface;
pub mod message;
pub mod naming;
pub mod operation;
pub mod types;

pub use analyzer::ContractAnalyzer;
pub use backend::CodegenBackend;
pub use cache::{CacheEntry, ContractCache, ContractKey};
pub use classifier::{
    ClassifiedSignature, ContextTypeSet, DEFAULT_CONTEXT_TYPES, ResponseKind, SignatureClassifier,
    UnsupportedSignature,
};
pub use description::{
    ContractDescription, Diagnostic, DiagnosticKind, InterfaceDescription, NotSupportedMethod,
    ServiceDescription, SyncOverAsync,
};
pub use error::ContractError;
pub use interface::{
    InterfaceDescriptor, MethodDescriptor, OperationMarker, ParameterDescriptor, PassingMode,
    ServiceContract, ServiceMarker,
};
pub use message::{MessageShape, MessageShapeBuilder, MessageShapes};
pub use operation::{
    MethodRef, OperationDescriptor, OperationShape, ParameterBinding, ParameterRole,
};
pub use types::{
    AsyncResult, AsyncSequence, NamedType, Primitive, TypeDescriptor, TypeInfo, type_of,
};
