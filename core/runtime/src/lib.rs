// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Call-time runtime for shaperpc contracts
//!
//! Provides the server and client call adapters, the filter pipeline, an
//! interpreted dispatch backend and an in-process transport.

pub mod adapter;
pub mod binding;
pub mod client;
pub mod codec;
pub mod context;
pub mod deadline;
pub mod filter;
pub mod memory;
pub mod metadata;
pub mod provider;
pub mod server;
pub mod status;
pub mod transport;
pub mod value;

pub use adapter::{CallOptions, ClientAdapter, ServerAdapter, ServerDispatch};
pub use binding::{
    Binding, BindingError, DispatchBackend, DispatchTable, MethodFn, MethodFuture, MethodTable,
    OperationContext, OperationReply, OperationRequest, Payload,
};
pub use client::{ClientProxy, ResponseStream};
pub use codec::{BincodeMarshaller, HEADER_KEY, Marshaller};
pub use context::{CallContext, CallSide, Exchange, TransportCall};
pub use deadline::{DEADLINE_KEY, MAX_TIMEOUT};
pub use filter::{
    ClientErrorDetailFilter, Fault, Filter, FilterPipeline, FilterRegistration, FilterRegistry,
    Handler, Next, ServerErrorDetailFilter,
};
pub use memory::MemoryChannel;
pub use metadata::{Metadata, MetadataValue};
pub use provider::ServiceProvider;
pub use server::{ServiceHost, ServiceHostBuilder};
pub use status::{BoxError, Code, Status};
pub use transport::{
    CallHandler, Channel, ClientCall, MessageStream, RequestWriter, ResponseFrame, ResponseReader,
    ResponseWriter, ServerCall, TransportError,
};
pub use value::{FromValue, IntoValue, Message, Value, ValueError};
