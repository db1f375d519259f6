// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Interpreted dispatch backend
//!
//! Operation implementations are registered by method name in a
//! [`MethodTable`]. [`DispatchBackend`] binds every operation of a
//! [`ContractDescription`] to its implementation, producing a
//! [`DispatchTable`] the server adapter routes calls through.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use futures::future::BoxFuture;
use shaperpc_contract::{CodegenBackend, ContractDescription, OperationDescriptor, OperationShape};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::deadline;
use crate::metadata::Metadata;
use crate::provider::ServiceProvider;
use crate::status::Status;
use crate::transport::MessageStream;
use crate::value::Message;

/// Body of a request or response
pub enum Payload {
    Unary(Message),
    Stream(MessageStream),
}

impl Payload {
    pub fn is_stream(&self) -> bool {
        matches!(self, Payload::Stream(_))
    }

    pub fn into_unary(self) -> Result<Message, Status> {
        match self {
            Payload::Unary(message) => Ok(message),
            Payload::Stream(_) => Err(Status::internal("expected a single message, got a stream")),
        }
    }

    pub fn into_stream(self) -> Result<MessageStream, Status> {
        match self {
            Payload::Stream(stream) => Ok(stream),
            Payload::Unary(_) => Err(Status::internal("expected a stream, got a single message")),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Unary(message) => f.debug_tuple("Unary").field(message).finish(),
            Payload::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug)]
pub struct OperationRequest {
    pub header: Option<Message>,
    pub payload: Payload,
}

#[derive(Debug)]
pub struct OperationReply {
    pub header: Option<Message>,
    pub payload: Payload,
}

impl OperationReply {
    pub fn unary(message: Message) -> Self {
        Self {
            header: None,
            payload: Payload::Unary(message),
        }
    }

    pub fn stream(stream: MessageStream) -> Self {
        Self {
            header: None,
            payload: Payload::Stream(stream),
        }
    }

    pub fn with_header(mut self, header: Message) -> Self {
        self.header = Some(header);
        self
    }
}

/// Call information handed to an operation implementation
#[derive(Debug, Clone)]
pub struct OperationContext {
    method: String,
    metadata: Metadata,
    deadline: Option<SystemTime>,
    cancellation: CancellationToken,
    services: Arc<ServiceProvider>,
}

impl OperationContext {
    pub fn new(
        method: impl Into<String>,
        metadata: Metadata,
        deadline: Option<SystemTime>,
        cancellation: CancellationToken,
        services: Arc<ServiceProvider>,
    ) -> Self {
        Self {
            method: method.into(),
            metadata,
            deadline,
            cancellation,
            services,
        }
    }

    /// Operation path of the call
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline.map(deadline::remaining)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn service<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.get::<T>()
    }
}

pub type MethodFuture = BoxFuture<'static, Result<OperationReply, Status>>;

/// `(service, request header?, request body, context) -> reply`
pub type MethodFn<S> =
    Arc<dyn Fn(Arc<S>, OperationRequest, OperationContext) -> MethodFuture + Send + Sync>;

struct MethodEntry<S> {
    shape: OperationShape,
    call: MethodFn<S>,
}

impl<S> Clone for MethodEntry<S> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape,
            call: self.call.clone(),
        }
    }
}

/// Operation implementations of a service type, keyed by method name
///
/// A key may be qualified with the declaring interface (`Calculator.Sum`)
/// to disambiguate methods of the same name in different interfaces.
pub struct MethodTable<S> {
    entries: HashMap<String, MethodEntry<S>>,
}

impl<S> Default for MethodTable<S> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<S: Send + Sync + 'static> MethodTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(
        mut self,
        method: impl Into<String>,
        shape: OperationShape,
        call: MethodFn<S>,
    ) -> Self {
        self.entries.insert(method.into(), MethodEntry { shape, call });
        self
    }

    pub fn unary<F, Fut>(self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<S>, Message, OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Message, Status>> + Send + 'static,
    {
        let call: MethodFn<S> = Arc::new(
            move |service: Arc<S>,
                  request: OperationRequest,
                  ctx: OperationContext|
                  -> MethodFuture {
                match request.payload.into_unary() {
                    Ok(message) => f(service, message, ctx)
                        .map(|r| r.map(OperationReply::unary))
                        .boxed(),
                    Err(status) => futures::future::ready(Err(status)).boxed(),
                }
            },
        );
        self.raw(method, OperationShape::Unary, call)
    }

    pub fn client_streaming<F, Fut>(self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<S>, Option<Message>, MessageStream, OperationContext) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<Message, Status>> + Send + 'static,
    {
        let call: MethodFn<S> = Arc::new(
            move |service: Arc<S>,
                  request: OperationRequest,
                  ctx: OperationContext|
                  -> MethodFuture {
                match request.payload.into_stream() {
                    Ok(stream) => f(service, request.header, stream, ctx)
                        .map(|r| r.map(OperationReply::unary))
                        .boxed(),
                    Err(status) => futures::future::ready(Err(status)).boxed(),
                }
            },
        );
        self.raw(method, OperationShape::ClientStreaming, call)
    }

    pub fn server_streaming<F, Fut>(self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<S>, Message, OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationReply, Status>> + Send + 'static,
    {
        let call: MethodFn<S> = Arc::new(
            move |service: Arc<S>,
                  request: OperationRequest,
                  ctx: OperationContext|
                  -> MethodFuture {
                match request.payload.into_unary() {
                    Ok(message) => f(service, message, ctx).boxed(),
                    Err(status) => futures::future::ready(Err(status)).boxed(),
                }
            },
        );
        self.raw(method, OperationShape::ServerStreaming, call)
    }

    pub fn duplex<F, Fut>(self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<S>, Option<Message>, MessageStream, OperationContext) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<OperationReply, Status>> + Send + 'static,
    {
        let call: MethodFn<S> = Arc::new(
            move |service: Arc<S>,
                  request: OperationRequest,
                  ctx: OperationContext|
                  -> MethodFuture {
                match request.payload.into_stream() {
                    Ok(stream) => f(service, request.header, stream, ctx).boxed(),
                    Err(status) => futures::future::ready(Err(status)).boxed(),
                }
            },
        );
        self.raw(method, OperationShape::DuplexStreaming, call)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, operation: &OperationDescriptor) -> Option<&MethodEntry<S>> {
        let method = operation.method();
        self.entries
            .get(&format!("{}.{}", method.interface, method.method))
            .or_else(|| self.entries.get(&method.method))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("no implementation registered for {method} (operation {operation})")]
    MissingImplementation { operation: String, method: String },
    #[error("operation {operation} is {expected}, implementation registered as {registered}")]
    ShapeMismatch {
        operation: String,
        expected: OperationShape,
        registered: OperationShape,
    },
}

/// An operation bound to its implementation
pub struct Binding<S> {
    operation: Arc<OperationDescriptor>,
    call: MethodFn<S>,
}

impl<S> Binding<S> {
    pub fn operation(&self) -> &Arc<OperationDescriptor> {
        &self.operation
    }

    pub fn invoke(
        &self,
        service: Arc<S>,
        request: OperationRequest,
        ctx: OperationContext,
    ) -> MethodFuture {
        (self.call)(service, request, ctx)
    }
}

impl<S> Clone for Binding<S> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            call: self.call.clone(),
        }
    }
}

/// Bound operations of one contract, keyed by operation path
pub struct DispatchTable<S> {
    contract_name: String,
    bindings: HashMap<String, Binding<S>>,
    aliases: HashMap<String, String>,
}

impl<S> DispatchTable<S> {
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn get(&self, path: &str) -> Option<&Binding<S>> {
        self.bindings.get(path)
    }

    /// Operation path serving the sync method `method`
    pub fn alias(&self, method: &str) -> Option<&str> {
        self.aliases.get(method).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

pub struct DispatchBackend<S> {
    methods: MethodTable<S>,
}

impl<S: Send + Sync + 'static> DispatchBackend<S> {
    pub fn new(methods: MethodTable<S>) -> Self {
        Self { methods }
    }
}

impl<S: Send + Sync + 'static> CodegenBackend for DispatchBackend<S> {
    type Output = DispatchTable<S>;
    type Error = BindingError;

    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn generate(&self, description: &ContractDescription) -> Result<Self::Output, Self::Error> {
        let mut bindings = HashMap::new();
        for operation in description.operations() {
            let path = operation.path();
            let entry = self.methods.lookup(operation).ok_or_else(|| {
                BindingError::MissingImplementation {
                    operation: path.clone(),
                    method: operation.method().method.clone(),
                }
            })?;
            if entry.shape != operation.shape() {
                return Err(BindingError::ShapeMismatch {
                    operation: path,
                    expected: operation.shape(),
                    registered: entry.shape,
                });
            }
            bindings.insert(
                path,
                Binding {
                    operation: Arc::new(operation.clone()),
                    call: entry.call.clone(),
                },
            );
        }

        let aliases = description
            .sync_over_async()
            .map(|pair| (pair.sync_method.method.clone(), pair.operation_path.clone()))
            .collect();

        Ok(DispatchTable {
            contract_name: description.contract_name.clone(),
            bindings,
            aliases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message;
    use futures::StreamExt;
    use shaperpc_contract::{
        AsyncResult, AsyncSequence, ContractAnalyzer, InterfaceDescriptor, MethodDescriptor,
        type_of,
    };

    struct Counter {
        step: i64,
    }

    fn contract() -> ContractDescription {
        let iface = InterfaceDescriptor::new("Counter")
            .service()
            .method(
                MethodDescriptor::new("AddAsync", type_of::<AsyncResult<i64>>())
                    .param("x", type_of::<i64>())
                    .operation_named("Add"),
            )
            .method(MethodDescriptor::new("Add", type_of::<i64>()).param("x", type_of::<i64>()))
            .method(
                MethodDescriptor::new("Count", type_of::<AsyncSequence<i64>>())
                    .param("n", type_of::<i64>())
                    .operation(),
            );
        ContractAnalyzer::default().analyze(&iface).unwrap()
    }

    fn context() -> OperationContext {
        OperationContext::new(
            "/Counter/Add",
            Metadata::new(),
            None,
            CancellationToken::new(),
            Arc::new(ServiceProvider::new()),
        )
    }

    fn methods() -> MethodTable<Counter> {
        MethodTable::new()
            .unary("AddAsync", |svc: Arc<Counter>, msg, _ctx| async move {
                let x: i64 = msg.arg(1)?;
                Ok::<_, Status>(message![x + svc.step])
            })
            .server_streaming("Counter.Count", |svc: Arc<Counter>, msg, _ctx| async move {
                let n: i64 = msg.arg(1)?;
                let step = svc.step;
                let items = futures::stream::iter((0..n).map(move |i| Ok(message![i * step])));
                Ok::<_, Status>(OperationReply::stream(items.boxed()))
            })
    }

    #[tokio::test]
    async fn test_bind_and_invoke() {
        let table = DispatchBackend::new(methods()).generate(&contract()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.contract_name(), "Counter");
        assert_eq!(table.alias("Add"), Some("/Counter/Add"));

        let service = Arc::new(Counter { step: 10 });
        let binding = table.get("/Counter/Add").unwrap();
        assert_eq!(binding.operation().shape(), OperationShape::Unary);
        let reply = binding
            .invoke(
                service.clone(),
                OperationRequest {
                    header: None,
                    payload: Payload::Unary(message![5i64]),
                },
                context(),
            )
            .await
            .unwrap();
        assert_eq!(reply.payload.into_unary().unwrap(), message![15i64]);

        let reply = table
            .get("/Counter/Count")
            .unwrap()
            .invoke(
                service,
                OperationRequest {
                    header: None,
                    payload: Payload::Unary(message![3i64]),
                },
                context(),
            )
            .await
            .unwrap();
        let items: Vec<_> = reply.payload.into_stream().unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_ref().unwrap(), &message![20i64]);
    }

    #[tokio::test]
    async fn test_wrong_payload_kind_is_internal() {
        let table = DispatchBackend::new(methods()).generate(&contract()).unwrap();
        let err = table
            .get("/Counter/Add")
            .unwrap()
            .invoke(
                Arc::new(Counter { step: 1 }),
                OperationRequest {
                    header: None,
                    payload: Payload::Stream(futures::stream::empty().boxed()),
                },
                context(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::status::Code::Internal);
    }

    #[test]
    fn test_binding_errors() {
        let missing =
            MethodTable::<Counter>::new().unary("AddAsync", |_, msg, _| async move { Ok(msg) });
        assert_eq!(
            DispatchBackend::new(missing).generate(&contract()).err(),
            Some(BindingError::MissingImplementation {
                operation: "/Counter/Count".into(),
                method: "Count".into(),
            })
        );

        let mismatched = methods().unary("Count", |_, msg, _| async move { Ok(msg) });
        // the qualified key still wins over the plain one
        assert!(DispatchBackend::new(mismatched).generate(&contract()).is_ok());

        let mismatched = MethodTable::<Counter>::new()
            .unary("AddAsync", |_, msg, _| async move { Ok(msg) })
            .unary("Count", |_, msg, _| async move { Ok(msg) });
        assert_eq!(
            DispatchBackend::new(mismatched).generate(&contract()).err(),
            Some(BindingError::ShapeMismatch {
                operation: "/Counter/Count".into(),
                expected: OperationShape::ServerStreaming,
                registered: OperationShape::Unary,
            })
        );
    }
}
