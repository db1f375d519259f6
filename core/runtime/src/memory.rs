// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! In-process transport
//!
//! Each call spawns the server side as a task connected to the client by two
//! bounded mpsc channels. Statuses cross in wire form, exactly as a remote
//! peer would see them.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::metadata::Metadata;
use crate::status::Status;
use crate::transport::{
    CallHandler, Channel, ClientCall, RequestWriter, ResponseFrame, ResponseReader,
    ResponseWriter, ServerCall, TransportError,
};
use crate::value::Message;

const DEFAULT_BUFFER: usize = 128;

#[derive(Clone)]
pub struct MemoryChannel {
    handler: Arc<dyn CallHandler>,
    buffer: usize,
}

impl MemoryChannel {
    pub fn new(handler: Arc<dyn CallHandler>) -> Self {
        Self {
            handler,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Capacity of each direction, at least 1
    pub fn with_buffer(self, buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            ..self
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn start_call(
        &self,
        method: &str,
        metadata: Metadata,
        cancellation: CancellationToken,
    ) -> Result<ClientCall, Status> {
        let (req_tx, req_rx) = mpsc::channel(self.buffer);
        let (resp_tx, resp_rx) = mpsc::channel(self.buffer);

        let call = ServerCall {
            method: method.to_string(),
            metadata,
            incoming: ReceiverStream::new(req_rx).map(Ok).boxed(),
            writer: Box::new(MemoryResponseWriter { tx: Some(resp_tx) }),
            cancellation: cancellation.child_token(),
        };

        debug!(%method, "starting in-process call");
        let handler = self.handler.clone();
        tokio::spawn(async move {
            handler.handle(call).await;
        });

        Ok(ClientCall {
            requests: Box::new(MemoryRequestWriter { tx: Some(req_tx) }),
            responses: ResponseReader::new(ReceiverStream::new(resp_rx).boxed()),
        })
    }
}

struct MemoryResponseWriter {
    tx: Option<mpsc::Sender<ResponseFrame>>,
}

impl MemoryResponseWriter {
    async fn push(&mut self, frame: ResponseFrame) -> Result<(), TransportError> {
        let Some(tx) = &self.tx else {
            return Err(TransportError::StreamFinished);
        };
        tx.send(frame)
            .await
            .map_err(|_| TransportError::PeerFinished)
    }
}

#[async_trait]
impl ResponseWriter for MemoryResponseWriter {
    async fn send_headers(&mut self, metadata: Metadata) -> Result<(), TransportError> {
        self.push(ResponseFrame::Headers(metadata)).await
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.push(ResponseFrame::Message(message)).await
    }

    async fn finish(&mut self, outcome: Result<Metadata, Status>) -> Result<(), TransportError> {
        let result = self
            .push(ResponseFrame::Trailers(outcome.map_err(Status::into_wire)))
            .await;
        self.tx = None;
        result
    }
}

struct MemoryRequestWriter {
    tx: Option<mpsc::Sender<Message>>,
}

#[async_trait]
impl RequestWriter for MemoryRequestWriter {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let Some(tx) = &self.tx else {
            return Err(TransportError::StreamFinished);
        };
        tx.send(message)
            .await
            .map_err(|_| TransportError::PeerFinished)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}
