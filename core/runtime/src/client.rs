// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side entry point
//!
//! A [`ClientProxy`] invokes the operations of one contract over a
//! [`Channel`]. Operations are addressed by path (`/Service/Operation`) or
//! by method name; the name of a sync method served by an async operation
//! resolves to that operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use shaperpc_contract::{ContractDescription, OperationDescriptor, OperationShape};

use crate::adapter::{CallOptions, ClientAdapter};
use crate::binding::Payload;
use crate::codec::{BincodeMarshaller, Marshaller};
use crate::context::{CallContext, CallSide, Exchange};
use crate::deadline;
use crate::filter::{FilterPipeline, FilterRegistration, FilterRegistry};
use crate::metadata::Metadata;
use crate::provider::ServiceProvider;
use crate::status::Status;
use crate::transport::{Channel, MessageStream};
use crate::value::Message;

/// Response of a streaming call
pub struct ResponseStream {
    /// Response headers
    pub metadata: Metadata,
    pub header: Option<Message>,
    pub messages: MessageStream,
}

pub struct ClientProxy {
    contract_name: String,
    operations: HashMap<String, Arc<OperationDescriptor>>,
    by_method: HashMap<String, Vec<String>>,
    aliases: HashMap<String, String>,
    channel: Arc<dyn Channel>,
    marshaller: Arc<dyn Marshaller>,
    filters: FilterRegistry,
    services: Arc<ServiceProvider>,
    default_timeout: Option<Duration>,
    max_timeout: Duration,
}

impl ClientProxy {
    pub fn new(description: &ContractDescription, channel: Arc<dyn Channel>) -> Self {
        let mut operations = HashMap::new();
        let mut by_method: HashMap<String, Vec<String>> = HashMap::new();
        for operation in description.operations() {
            let path = operation.path();
            by_method
                .entry(operation.method().method.clone())
                .or_default()
                .push(path.clone());
            operations.insert(path, Arc::new(operation.clone()));
        }
        let aliases = description
            .sync_over_async()
            .map(|pair| (pair.sync_method.method.clone(), pair.operation_path.clone()))
            .collect();

        Self {
            contract_name: description.contract_name.clone(),
            operations,
            by_method,
            aliases,
            channel,
            marshaller: Arc::new(BincodeMarshaller),
            filters: FilterRegistry::new(),
            services: Arc::new(ServiceProvider::new()),
            default_timeout: None,
            max_timeout: deadline::max_timeout(),
        }
    }

    pub fn with_marshaller(mut self, marshaller: Arc<dyn Marshaller>) -> Self {
        self.marshaller = marshaller;
        self
    }

    pub fn with_filter(mut self, registration: FilterRegistration) -> Self {
        self.filters.register(registration);
        self
    }

    pub fn with_filters(mut self, registry: &FilterRegistry) -> Self {
        self.filters = self.filters.merged(registry);
        self
    }

    pub fn with_services(mut self, services: Arc<ServiceProvider>) -> Self {
        self.services = services;
        self
    }

    /// Timeout of calls that do not set one
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Resolves an operation by path, sync alias or unique method name
    pub fn operation(&self, name: &str) -> Result<Arc<OperationDescriptor>, Status> {
        let path = if name.starts_with('/') {
            Some(name)
        } else if let Some(path) = self.aliases.get(name) {
            Some(path.as_str())
        } else {
            match self.by_method.get(name).map(Vec::as_slice) {
                Some([path]) => Some(path.as_str()),
                Some([_, _, ..]) => {
                    return Err(Status::invalid_argument(format!(
                        "method name {name} is ambiguous, use the operation path"
                    )));
                }
                _ => None,
            }
        };
        path.and_then(|p| self.operations.get(p))
            .cloned()
            .ok_or_else(|| {
                Status::unimplemented(format!(
                    "{} has no operation {name}",
                    self.contract_name
                ))
            })
    }

    fn expect_shape(operation: &OperationDescriptor, shape: OperationShape) -> Result<(), Status> {
        if operation.shape() == shape {
            return Ok(());
        }
        Err(Status::invalid_argument(format!(
            "{} is a {} operation, not {}",
            operation.path(),
            operation.shape(),
            shape
        )))
    }

    /// Runs one call through the client filters and the transport
    pub async fn call(
        &self,
        operation: Arc<OperationDescriptor>,
        header: Option<Message>,
        body: Payload,
        options: CallOptions,
    ) -> Result<(Metadata, Exchange), Status> {
        let CallOptions {
            metadata,
            timeout,
            cancellation,
        } = options;
        let cancellation = cancellation.map(|t| t.child_token()).unwrap_or_default();
        let deadline = timeout
            .or(self.default_timeout)
            .map(|t| deadline::deadline_after(t, self.max_timeout));

        let mut ctx = CallContext::new(
            operation,
            CallSide::Client,
            self.services.clone(),
            cancellation,
        )
        .with_request_metadata(metadata)
        .with_deadline(deadline);
        ctx.request = Exchange::new(header, body);

        let filters = self.filters.resolve(&self.services)?;
        let terminal = ClientAdapter::new(self.channel.clone(), self.marshaller.clone());
        FilterPipeline::new(&filters, &terminal).run(&mut ctx).await?;

        let metadata = ctx.response_metadata().clone();
        Ok((metadata, std::mem::take(&mut ctx.response)))
    }

    pub async fn unary(
        &self,
        name: &str,
        request: Message,
        options: CallOptions,
    ) -> Result<Message, Status> {
        let operation = self.operation(name)?;
        Self::expect_shape(&operation, OperationShape::Unary)?;
        let (_, response) = self
            .call(operation, None, Payload::Unary(request), options)
            .await?;
        unary_body(response)
    }

    pub async fn client_streaming(
        &self,
        name: &str,
        header: Option<Message>,
        requests: MessageStream,
        options: CallOptions,
    ) -> Result<Message, Status> {
        let operation = self.operation(name)?;
        Self::expect_shape(&operation, OperationShape::ClientStreaming)?;
        let (_, response) = self
            .call(operation, header, Payload::Stream(requests), options)
            .await?;
        unary_body(response)
    }

    pub async fn server_streaming(
        &self,
        name: &str,
        request: Message,
        options: CallOptions,
    ) -> Result<ResponseStream, Status> {
        let operation = self.operation(name)?;
        Self::expect_shape(&operation, OperationShape::ServerStreaming)?;
        let (metadata, response) = self
            .call(operation, None, Payload::Unary(request), options)
            .await?;
        stream_body(metadata, response)
    }

    pub async fn duplex(
        &self,
        name: &str,
        header: Option<Message>,
        requests: MessageStream,
        options: CallOptions,
    ) -> Result<ResponseStream, Status> {
        let operation = self.operation(name)?;
        Self::expect_shape(&operation, OperationShape::DuplexStreaming)?;
        let (metadata, response) = self
            .call(operation, header, Payload::Stream(requests), options)
            .await?;
        stream_body(metadata, response)
    }
}

fn unary_body(response: Exchange) -> Result<Message, Status> {
    response
        .body
        .ok_or_else(|| Status::internal("call produced no response"))?
        .into_unary()
}

fn stream_body(metadata: Metadata, response: Exchange) -> Result<ResponseStream, Status> {
    let messages = response
        .body
        .ok_or_else(|| Status::internal("call produced no response"))?
        .into_stream()?;
    Ok(ResponseStream {
        metadata,
        header: response.header,
        messages,
    })
}
