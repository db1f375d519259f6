// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use shaperpc_contract::{MessageShape, OperationDescriptor};
use tokio_util::sync::CancellationToken;

use crate::binding::{Binding, OperationRequest, Payload};
use crate::codec::Marshaller;
use crate::context::{CallContext, CallSide, Exchange, TransportCall};
use crate::deadline;
use crate::filter::{Filter, FilterPipeline, Handler};
use crate::metadata::Metadata;
use crate::provider::ServiceProvider;
use crate::status::{Code, Status};
use crate::transport::{MessageStream, ResponseWriter, ServerCall, TransportError};
use crate::value::Message;

/// Server side call adapter
///
/// Stateless: one instance serves any number of concurrent calls, each call
/// owning its context and streams.
#[derive(Clone)]
pub struct ServerAdapter {
    marshaller: Arc<dyn Marshaller>,
    max_timeout: Duration,
}

/// Everything a single call needs besides the transport
pub struct ServerDispatch<'a, S> {
    pub service: Arc<S>,
    pub binding: &'a Binding<S>,
    pub filters: &'a [Arc<dyn Filter>],
    pub services: Arc<ServiceProvider>,
}

struct Invoke<'a, S> {
    service: Arc<S>,
    binding: &'a Binding<S>,
}

#[async_trait]
impl<'a, S: Send + Sync + 'static> Handler for Invoke<'a, S> {
    async fn handle(&self, ctx: &mut CallContext) -> Result<(), Status> {
        let body = ctx
            .request
            .body
            .take()
            .ok_or_else(|| Status::internal("request body already consumed"))?;
        let request = OperationRequest {
            header: ctx.request.header.take(),
            payload: body,
        };
        let reply = self
            .binding
            .invoke(self.service.clone(), request, ctx.operation_context())
            .await?;
        ctx.response = Exchange::new(reply.header, reply.payload);
        Ok(())
    }
}

impl ServerAdapter {
    pub fn new(marshaller: Arc<dyn Marshaller>, max_timeout: Duration) -> Self {
        Self {
            marshaller,
            max_timeout,
        }
    }

    /// Runs one call to completion and reports its outcome to the transport
    pub async fn serve<S: Send + Sync + 'static>(
        &self,
        dispatch: ServerDispatch<'_, S>,
        call: ServerCall,
    ) {
        let ServerCall {
            method,
            metadata,
            incoming,
            mut writer,
            cancellation,
        } = call;
        let deadline = deadline::parse_deadline(&metadata, self.max_timeout);

        let mut expired = false;
        let run = self.run(
            &dispatch,
            TransportCall::new(method.clone(), metadata.clone()),
            metadata,
            incoming,
            writer.as_mut(),
            &cancellation,
            deadline,
        );
        let outcome = match deadline {
            Some(deadline) => {
                tokio::select! {
                    result = run => result,
                    _ = tokio::time::sleep(deadline::remaining(deadline)) => {
                        tracing::debug!(%method, "call exceeded its deadline");
                        expired = true;
                        cancellation.cancel();
                        Err(Status::deadline_exceeded("call exceeded its deadline"))
                    }
                }
            }
            None => run.await,
        };

        let timed_out = expired || deadline.is_some_and(deadline::is_exceeded);
        let outcome = settle(&method, outcome, cancellation.is_cancelled(), timed_out);

        if let Err(status) = stopped(writer.finish(outcome).await, &cancellation) {
            tracing::warn!(%method, error = %status, "failed to complete call");
        }
    }

    async fn run<S: Send + Sync + 'static>(
        &self,
        dispatch: &ServerDispatch<'_, S>,
        transport: TransportCall,
        metadata: Metadata,
        mut incoming: MessageStream,
        writer: &mut dyn ResponseWriter,
        cancellation: &CancellationToken,
        deadline: Option<SystemTime>,
    ) -> Result<Metadata, Status> {
        let operation = dispatch.binding.operation().clone();

        let header = match operation.request_header() {
            Some(shape) => Some(self.read_header(&metadata, shape)?),
            None => None,
        };

        let body = if operation.shape().is_request_streaming() {
            Payload::Stream(request_stream(
                incoming,
                operation.request().clone(),
                cancellation.clone(),
            ))
        } else {
            let first = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(Status::cancelled("call cancelled")),
                first = incoming.next() => first,
            };
            let message = first
                .ok_or_else(|| Status::invalid_argument("missing request message"))??;
            message.conform(operation.request())?;
            Payload::Unary(message)
        };

        let mut ctx = CallContext::new(
            operation.clone(),
            CallSide::Server,
            dispatch.services.clone(),
            cancellation.clone(),
        )
        .with_request_metadata(metadata)
        .with_transport(transport)
        .with_deadline(deadline);
        ctx.request = Exchange::new(header, body);

        let terminal = Invoke {
            service: dispatch.service.clone(),
            binding: dispatch.binding,
        };
        FilterPipeline::new(dispatch.filters, &terminal)
            .run(&mut ctx)
            .await?;

        self.write_response(&operation, &mut ctx, writer, cancellation)
            .await?;
        Ok(Metadata::new())
    }

    fn read_header(&self, metadata: &Metadata, shape: &MessageShape) -> Result<Message, Status> {
        let header = self
            .marshaller
            .read_header(metadata)?
            .ok_or_else(|| Status::invalid_argument("missing request header"))?;
        header.conform(shape)?;
        Ok(header)
    }

    async fn write_response(
        &self,
        operation: &OperationDescriptor,
        ctx: &mut CallContext,
        writer: &mut dyn ResponseWriter,
        cancellation: &CancellationToken,
    ) -> Result<(), Status> {
        let body = ctx
            .response
            .body
            .take()
            .ok_or_else(|| Status::internal("operation produced no response"))?;

        let mut headers = ctx.response_metadata().clone();
        match (operation.response_header(), ctx.response.header.take()) {
            (Some(shape), Some(header)) => {
                header.conform(shape).map_err(as_internal)?;
                self.marshaller.write_header(&mut headers, &header)?;
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(Status::internal("operation produced no response header"));
            }
            (None, Some(_)) => {
                return Err(Status::internal(format!(
                    "{} does not declare a response header",
                    operation.path()
                )));
            }
        }
        if stopped(writer.send_headers(headers).await, cancellation)? {
            return Ok(());
        }

        match (operation.shape().is_response_streaming(), body) {
            (false, Payload::Unary(message)) => {
                message.conform(operation.response()).map_err(as_internal)?;
                stopped(writer.send(message).await, cancellation)?;
                Ok(())
            }
            (true, Payload::Stream(stream)) => {
                write_stream(stream, operation.response(), writer, cancellation).await
            }
            _ => Err(Status::internal(format!(
                "response does not match the {} shape of {}",
                operation.shape(),
                operation.path()
            ))),
        }
    }
}

/// Pulls the response sequence item by item, stopping once the call is
/// cancelled
async fn write_stream(
    mut stream: MessageStream,
    shape: &MessageShape,
    writer: &mut dyn ResponseWriter,
    cancellation: &CancellationToken,
) -> Result<(), Status> {
    loop {
        if cancellation.is_cancelled() {
            tracing::debug!("call cancelled, abandoning response stream");
            break;
        }
        let item = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                tracing::debug!("call cancelled, abandoning response stream");
                break;
            }
            item = stream.next() => item,
        };
        let Some(item) = item else {
            break;
        };
        let message = item?;
        message.conform(shape).map_err(as_internal)?;
        if stopped(writer.send(message).await, cancellation)? {
            break;
        }
    }
    Ok(())
}

/// Status reported for a finished run
///
/// Once the call is cancelled, failures caused by the cancellation collapse
/// into `CANCELLED` or `DEADLINE_EXCEEDED`. Any other failure keeps its own
/// status.
fn settle(
    method: &str,
    outcome: Result<Metadata, Status>,
    cancelled: bool,
    timed_out: bool,
) -> Result<Metadata, Status> {
    match outcome {
        Err(status) if cancelled && !is_cancellation(&status) => {
            tracing::warn!(
                %method,
                code = %status.code(),
                error = %status,
                "call failed after cancellation"
            );
            Err(status)
        }
        _ if cancelled => {
            let status = if timed_out {
                Status::deadline_exceeded("call exceeded its deadline")
            } else {
                Status::cancelled("call cancelled")
            };
            tracing::debug!(%method, code = %status.code(), "call ended by cancellation");
            Err(status)
        }
        Ok(trailers) => {
            tracing::debug!(%method, "call completed");
            Ok(trailers)
        }
        Err(status) => {
            tracing::warn!(%method, code = %status.code(), error = %status, "call failed");
            Err(status)
        }
    }
}

fn is_cancellation(status: &Status) -> bool {
    matches!(status.code(), Code::Cancelled | Code::DeadlineExceeded)
}

/// `Ok(true)` when the write failed only because the call is gone
fn stopped(
    result: Result<(), TransportError>,
    cancellation: &CancellationToken,
) -> Result<bool, Status> {
    match result {
        Ok(()) => Ok(false),
        Err(e) if e.is_benign() && cancellation.is_cancelled() => {
            tracing::debug!(error = %e, "peer finished after cancellation");
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// A response not matching its declared shape is a server fault
fn as_internal(status: Status) -> Status {
    Status::internal(status.message().unwrap_or("invalid response").to_string())
}

/// Lazily pulled request sequence, checked against `shape` item by item
fn request_stream(
    mut incoming: MessageStream,
    shape: MessageShape,
    cancellation: CancellationToken,
) -> MessageStream {
    stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.cancelled() => Some(Err(Status::cancelled("call cancelled"))),
                next = incoming.next() => next,
            };
            let Some(item) = next else {
                break;
            };
            let item = item.and_then(|message| message.conform(&shape).map(|()| message));
            let failed = item.is_err();
            yield item;
            if failed {
                break;
            }
        }
    }
    .boxed()
}
