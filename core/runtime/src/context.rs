// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-call context seen by filters
//!
//! Every call owns exactly one [`CallContext`]. Filters may inspect or
//! replace the request before calling `next()` and the response after it.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use http::Extensions;
use shaperpc_contract::OperationDescriptor;
use tokio_util::sync::CancellationToken;

use crate::binding::{OperationContext, Payload};
use crate::deadline;
use crate::metadata::Metadata;
use crate::provider::ServiceProvider;
use crate::value::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSide {
    Server,
    Client,
}

/// Header and body of one direction of a call
#[derive(Debug, Default)]
pub struct Exchange {
    pub header: Option<Message>,
    pub body: Option<Payload>,
}

impl Exchange {
    pub fn new(header: Option<Message>, body: Payload) -> Self {
        Self {
            header,
            body: Some(body),
        }
    }
}

/// The call as it crossed the transport
///
/// Filters may rewrite the request metadata of a [`CallContext`]; this keeps
/// the method and metadata exactly as received by the server or as sent by
/// the client.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportCall {
    pub method: String,
    pub metadata: Metadata,
}

impl TransportCall {
    pub fn new(method: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            method: method.into(),
            metadata,
        }
    }
}

/// Per-call state shared by the filters of one side of a call
///
/// On the server the transport call is attached before any filter runs. On
/// the client it is attached by the client adapter once the call has been
/// started, so client filters see it after `next()` returns.
#[derive(Debug)]
pub struct CallContext {
    operation: Arc<OperationDescriptor>,
    side: CallSide,
    path: String,
    pub request: Exchange,
    pub response: Exchange,
    request_metadata: Metadata,
    response_metadata: Metadata,
    deadline: Option<SystemTime>,
    cancellation: CancellationToken,
    services: Arc<ServiceProvider>,
    transport: Option<TransportCall>,
    state: Extensions,
}

impl CallContext {
    pub fn new(
        operation: Arc<OperationDescriptor>,
        side: CallSide,
        services: Arc<ServiceProvider>,
        cancellation: CancellationToken,
    ) -> Self {
        let path = operation.path();
        Self {
            operation,
            side,
            path,
            request: Exchange::default(),
            response: Exchange::default(),
            request_metadata: Metadata::new(),
            response_metadata: Metadata::new(),
            deadline: None,
            cancellation,
            services,
            transport: None,
            state: Extensions::new(),
        }
    }

    pub fn with_request_metadata(mut self, metadata: Metadata) -> Self {
        self.request_metadata = metadata;
        self
    }

    pub fn with_transport(mut self, transport: TransportCall) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<SystemTime>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn operation(&self) -> &OperationDescriptor {
        &self.operation
    }

    pub fn side(&self) -> CallSide {
        self.side
    }

    /// `/{service}/{operation}`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request_metadata(&self) -> &Metadata {
        &self.request_metadata
    }

    pub fn request_metadata_mut(&mut self) -> &mut Metadata {
        &mut self.request_metadata
    }

    /// Metadata sent with the response headers
    pub fn response_metadata(&self) -> &Metadata {
        &self.response_metadata
    }

    pub fn response_metadata_mut(&mut self) -> &mut Metadata {
        &mut self.response_metadata
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: SystemTime) {
        self.deadline = Some(deadline);
    }

    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline.map(deadline::remaining)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(deadline::is_exceeded)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn transport(&self) -> Option<&TransportCall> {
        self.transport.as_ref()
    }

    pub fn set_transport(&mut self, transport: TransportCall) {
        self.transport = Some(transport);
    }

    pub fn services(&self) -> &ServiceProvider {
        &self.services
    }

    /// Per-call values shared between filters
    pub fn state(&self) -> &Extensions {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Extensions {
        &mut self.state
    }

    /// Context handed to the operation implementation
    pub fn operation_context(&self) -> OperationContext {
        OperationContext::new(
            self.path.clone(),
            self.request_metadata.clone(),
            self.deadline,
            self.cancellation.clone(),
            self.services.clone(),
        )
    }
}
