// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Compiled operation descriptors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interface::{InterfaceDescriptor, MethodDescriptor};
use crate::message::{MessageShape, MessageShapes};
use crate::naming;

/// One of the four RPC call patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationShape {
    Unary,
    ClientStreaming,
    ServerStreaming,
    DuplexStreaming,
}

impl OperationShape {
    /// Shape determined by which side carries a stream
    pub fn from_streaming(request_streaming: bool, response_streaming: bool) -> Self {
        match (request_streaming, response_streaming) {
            (false, false) => OperationShape::Unary,
            (true, false) => OperationShape::ClientStreaming,
            (false, true) => OperationShape::ServerStreaming,
            (true, true) => OperationShape::DuplexStreaming,
        }
    }

    pub fn is_request_streaming(&self) -> bool {
        matches!(
            self,
            OperationShape::ClientStreaming | OperationShape::DuplexStreaming
        )
    }

    pub fn is_response_streaming(&self) -> bool {
        matches!(
            self,
            OperationShape::ServerStreaming | OperationShape::DuplexStreaming
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationShape::Unary => "unary",
            OperationShape::ClientStreaming => "client-streaming",
            OperationShape::ServerStreaming => "server-streaming",
            OperationShape::DuplexStreaming => "duplex-streaming",
        }
    }
}

impl fmt::Display for OperationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a single parameter in the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterRole {
    /// Supplied by the runtime (call context, cancellation, call options)
    Context,
    /// Sent once per call, outside the streamed values
    HeaderData,
    /// The request stream
    StreamedValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterBinding {
    /// 0-based index in the declared parameter list
    pub index: usize,
    pub role: ParameterRole,
}

/// Identity of the declaring method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    /// Full name of the declaring interface
    pub interface: String,
    pub method: String,
    pub signature: String,
}

impl MethodRef {
    pub fn new(interface: &InterfaceDescriptor, method: &MethodDescriptor) -> Self {
        Self {
            interface: interface.full_name(),
            method: method.name.clone(),
            signature: method.signature(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.interface, self.signature)
    }
}

/// A fully classified remote operation
///
/// Immutable once built; shared as `Arc<OperationDescriptor>` by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    service_name: String,
    operation_name: String,
    method: MethodRef,
    shape: OperationShape,
    parameters: Vec<ParameterBinding>,
    request: MessageShape,
    request_header: Option<MessageShape>,
    response: MessageShape,
    response_header: Option<MessageShape>,
    is_async: bool,
}

impl OperationDescriptor {
    pub(crate) fn new(
        service_name: String,
        operation_name: String,
        method: MethodRef,
        shape: OperationShape,
        parameters: Vec<ParameterBinding>,
        shapes: MessageShapes,
        is_async: bool,
    ) -> Self {
        Self {
            service_name,
            operation_name,
            method,
            shape,
            parameters,
            request: shapes.request,
            request_header: shapes.request_header,
            response: shapes.response,
            response_header: shapes.response_header,
            is_async,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// `/{service}/{operation}`
    pub fn path(&self) -> String {
        naming::operation_path(&self.service_name, &self.operation_name)
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    pub fn shape(&self) -> OperationShape {
        self.shape
    }

    pub fn parameters(&self) -> &[ParameterBinding] {
        &self.parameters
    }

    /// Index of the parameter with the given role, if any
    pub fn parameter_with_role(&self, role: ParameterRole) -> Option<usize> {
        self.parameters
            .iter()
            .find(|p| p.role == role)
            .map(|p| p.index)
    }

    /// Request body: the streamed item type, or the header data when unary
    pub fn request(&self) -> &MessageShape {
        &self.request
    }

    pub fn request_header(&self) -> Option<&MessageShape> {
        self.request_header.as_ref()
    }

    pub fn response(&self) -> &MessageShape {
        &self.response
    }

    pub fn response_header(&self) -> Option<&MessageShape> {
        self.response_header.as_ref()
    }

    /// The declared return type is an async-result wrapper
    pub fn is_async(&self) -> bool {
        self.is_async
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.path(), self.shape, self.method)
    }
}
