// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use shaperpc_contract::MessageShape;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::binding::Payload;
use crate::codec::Marshaller;
use crate::context::{CallContext, Exchange, TransportCall};
use crate::deadline;
use crate::filter::Handler;
use crate::metadata::Metadata;
use crate::status::Status;
use crate::transport::{Channel, ClientCall, MessageStream, RequestWriter, ResponseReader};
use crate::value::Message;

/// Per-call client options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub metadata: Metadata,
    pub timeout: Option<Duration>,
    /// Cancelling this token cancels the call
    pub cancellation: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// First failure of the request side of a call
type Failure = Arc<Mutex<Option<Status>>>;

fn aborted(failure: &Failure) -> Status {
    failure
        .lock()
        .take()
        .unwrap_or_else(|| Status::cancelled("call cancelled"))
}

/// Client side call adapter, the terminal step of the client pipeline
///
/// Writes the request header and deadline into call metadata, pumps the
/// request body into the transport and exposes the response as
/// [`Exchange`] of the call context.
#[derive(Clone)]
pub struct ClientAdapter {
    channel: Arc<dyn Channel>,
    marshaller: Arc<dyn Marshaller>,
}

impl ClientAdapter {
    pub fn new(channel: Arc<dyn Channel>, marshaller: Arc<dyn Marshaller>) -> Self {
        Self {
            channel,
            marshaller,
        }
    }

    fn request_metadata(&self, ctx: &mut CallContext) -> Result<Metadata, Status> {
        let mut metadata = ctx.request_metadata().clone();
        if let Some(deadline) = ctx.deadline() {
            deadline::write_deadline(&mut metadata, deadline);
        }
        match (ctx.operation().request_header().cloned(), ctx.request.header.take()) {
            (Some(shape), Some(header)) => {
                header.conform(&shape)?;
                self.marshaller.write_header(&mut metadata, &header)?;
            }
            (None, None) => {}
            (Some(_), None) => return Err(Status::invalid_argument("missing request header")),
            (None, Some(_)) => {
                return Err(Status::invalid_argument(format!(
                    "{} does not take a request header",
                    ctx.path()
                )));
            }
        }
        Ok(metadata)
    }

    fn response_header(
        &self,
        ctx: &CallContext,
        headers: &Metadata,
    ) -> Result<Option<Message>, Status> {
        let Some(shape) = ctx.operation().response_header() else {
            return Ok(None);
        };
        let header = self
            .marshaller
            .read_header(headers)?
            .ok_or_else(|| Status::internal("missing response header"))?;
        header.conform(shape)?;
        Ok(Some(header))
    }
}

#[async_trait]
impl Handler for ClientAdapter {
    async fn handle(&self, ctx: &mut CallContext) -> Result<(), Status> {
        let metadata = self.request_metadata(ctx)?;
        let body = ctx
            .request
            .body
            .take()
            .ok_or_else(|| Status::internal("request body already consumed"))?;
        let operation = ctx.operation().clone();
        let cancellation = ctx.cancellation().clone();
        let failure = Failure::default();

        match (&body, operation.shape().is_request_streaming()) {
            (Payload::Unary(message), false) => message.conform(operation.request())?,
            (Payload::Stream(_), true) => {}
            _ => {
                return Err(Status::invalid_argument(format!(
                    "{} is a {} operation",
                    ctx.path(),
                    operation.shape()
                )));
            }
        }

        let ClientCall {
            mut requests,
            mut responses,
        } = self
            .channel
            .start_call(ctx.path(), metadata.clone(), cancellation.clone())
            .await?;
        let path = ctx.path().to_string();
        ctx.set_transport(TransportCall::new(path, metadata));

        // the pump lives as long as the response side of the call
        let pump_task = match body {
            Payload::Unary(message) => {
                requests.send(message).await?;
                requests.close().await?;
                None
            }
            Payload::Stream(stream) => Some(AbortOnDropHandle::new(tokio::spawn(pump(
                stream,
                requests,
                operation.request().clone(),
                cancellation.clone(),
                failure.clone(),
            )))),
        };

        let headers = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(aborted(&failure)),
            headers = responses.headers() => headers?,
        };
        let header = self.response_header(ctx, &headers)?;
        ctx.response_metadata_mut().merge(headers);

        let payload = if operation.shape().is_response_streaming() {
            Payload::Stream(response_stream(
                responses,
                operation.response().clone(),
                cancellation,
                failure,
                pump_task,
            ))
        } else {
            let message = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(aborted(&failure)),
                message = responses.message() => message?,
            };
            let message = message.ok_or_else(|| Status::internal("missing response message"))?;
            message.conform(operation.response())?;
            responses.trailers().await?;
            drop(pump_task);
            Payload::Unary(message)
        };

        ctx.response = Exchange::new(header, payload);
        Ok(())
    }
}

/// Forwards the caller's request sequence to the transport
///
/// A failing or malformed item aborts the call; the failure is reported on
/// the response side.
async fn pump(
    mut stream: MessageStream,
    mut requests: Box<dyn RequestWriter>,
    shape: MessageShape,
    cancellation: CancellationToken,
    failure: Failure,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return,
            next = stream.next() => next,
        };
        let Some(item) = next else {
            break;
        };
        let message = match item.and_then(|m| m.conform(&shape).map(|()| m)) {
            Ok(message) => message,
            Err(status) => {
                tracing::debug!(error = %status, "aborting call on request stream failure");
                *failure.lock() = Some(status);
                cancellation.cancel();
                return;
            }
        };
        if let Err(e) = requests.send(message).await {
            // the outcome of the call arrives on the response side
            tracing::debug!(error = %e, "request stream interrupted");
            return;
        }
    }
    if let Err(e) = requests.close().await {
        tracing::debug!(error = %e, "failed to close request stream");
    }
}

fn response_stream(
    mut responses: ResponseReader,
    shape: MessageShape,
    cancellation: CancellationToken,
    failure: Failure,
    pump_task: Option<AbortOnDropHandle<()>>,
) -> MessageStream {
    stream! {
        let _pump_task = pump_task;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.cancelled() => Err(aborted(&failure)),
                next = responses.message() => next,
            };
            match next {
                Ok(Some(message)) => match message.conform(&shape) {
                    Ok(()) => yield Ok(message),
                    Err(status) => {
                        yield Err(status);
                        break;
                    }
                },
                Ok(None) => break,
                Err(status) => {
                    yield Err(status);
                    break;
                }
            }
        }
    }
    .boxed()
}
