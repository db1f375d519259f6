// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction
//!
//! The call adapters only need an incoming message sequence, an outgoing
//! sink, metadata in both directions and a cancellation signal. Any wire
//! protocol that can provide those can carry shaperpc calls.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::metadata::Metadata;
use crate::status::Status;
use crate::value::Message;

pub type MessageStream = BoxStream<'static, Result<Message, Status>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("the peer already finished the call")]
    PeerFinished,
    #[error("the stream is already finished")]
    StreamFinished,
    #[error("transport closed: {0}")]
    Closed(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Errors that are expected once a call has been cancelled
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            TransportError::PeerFinished | TransportError::StreamFinished
        )
    }
}

impl From<TransportError> for Status {
    fn from(error: TransportError) -> Self {
        Status::unavailable(error.to_string()).with_source(Arc::new(error))
    }
}

/// Server side of the outgoing direction
#[async_trait]
pub trait ResponseWriter: Send {
    async fn send_headers(&mut self, metadata: Metadata) -> Result<(), TransportError>;

    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Completes the call with trailers or a failure status
    async fn finish(&mut self, outcome: Result<Metadata, Status>) -> Result<(), TransportError>;
}

/// One incoming call as handed over by a transport
pub struct ServerCall {
    /// Operation path, `/{service}/{operation}`
    pub method: String,
    pub metadata: Metadata,
    pub incoming: MessageStream,
    pub writer: Box<dyn ResponseWriter>,
    pub cancellation: CancellationToken,
}

/// Entry point of a server for incoming calls
#[async_trait]
pub trait CallHandler: Send + Sync {
    async fn handle(&self, call: ServerCall);
}

/// Client side of the outgoing direction
#[async_trait]
pub trait RequestWriter: Send {
    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Signals the end of the request stream
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug)]
pub enum ResponseFrame {
    Headers(Metadata),
    Message(Message),
    Trailers(Result<Metadata, Status>),
}

/// Client side of the incoming direction
///
/// Headers are optional on the wire: a message or trailers arriving first
/// imply empty headers.
pub struct ResponseReader {
    frames: BoxStream<'static, ResponseFrame>,
    headers: Option<Metadata>,
    buffered: Option<Message>,
    trailers: Option<Result<Metadata, Status>>,
}

impl ResponseReader {
    pub fn new(frames: BoxStream<'static, ResponseFrame>) -> Self {
        Self {
            frames,
            headers: None,
            buffered: None,
            trailers: None,
        }
    }

    async fn pull(&mut self) {
        match self.frames.next().await {
            Some(ResponseFrame::Headers(metadata)) => {
                if self.headers.is_none() {
                    self.headers = Some(metadata);
                }
            }
            Some(ResponseFrame::Message(message)) => {
                self.headers.get_or_insert_with(Metadata::new);
                self.buffered = Some(message);
            }
            Some(ResponseFrame::Trailers(outcome)) => self.trailers = Some(outcome),
            None => {
                self.trailers = Some(Err(Status::unknown("call ended without a status")));
            }
        }
    }

    /// Response headers, or the failure that ended the call before them
    pub async fn headers(&mut self) -> Result<Metadata, Status> {
        loop {
            if let Some(headers) = &self.headers {
                return Ok(headers.clone());
            }
            if let Some(trailers) = &self.trailers {
                return trailers.clone().map(|_| Metadata::new());
            }
            self.pull().await;
        }
    }

    /// Next response message; `Ok(None)` once the call completed successfully
    pub async fn message(&mut self) -> Result<Option<Message>, Status> {
        loop {
            if let Some(message) = self.buffered.take() {
                return Ok(Some(message));
            }
            if let Some(trailers) = &self.trailers {
                return trailers.clone().map(|_| None);
            }
            self.pull().await;
        }
    }

    /// Skips remaining messages and returns the final outcome
    pub async fn trailers(&mut self) -> Result<Metadata, Status> {
        loop {
            self.buffered = None;
            if let Some(trailers) = &self.trailers {
                return trailers.clone();
            }
            self.pull().await;
        }
    }
}

pub struct ClientCall {
    pub requests: Box<dyn RequestWriter>,
    pub responses: ResponseReader,
}

/// Client entry point of a transport
#[async_trait]
pub trait Channel: Send + Sync {
    async fn start_call(
        &self,
        method: &str,
        metadata: Metadata,
        cancellation: CancellationToken,
    ) -> Result<ClientCall, Status>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message;
    use crate::status::Code;
    use futures::stream;

    fn reader(frames: Vec<ResponseFrame>) -> ResponseReader {
        ResponseReader::new(stream::iter(frames).boxed())
    }

    #[tokio::test]
    async fn test_reader_sequence() {
        let mut headers = Metadata::new();
        headers.insert("h", "1");
        let mut r = reader(vec![
            ResponseFrame::Headers(headers.clone()),
            ResponseFrame::Message(message![1i32]),
            ResponseFrame::Message(message![2i32]),
            ResponseFrame::Trailers(Ok(Metadata::new())),
        ]);

        assert_eq!(r.headers().await.unwrap(), headers);
        assert_eq!(r.message().await.unwrap(), Some(message![1i32]));
        assert_eq!(r.message().await.unwrap(), Some(message![2i32]));
        assert_eq!(r.message().await.unwrap(), None);
        // completion is sticky
        assert_eq!(r.message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_without_headers() {
        let mut r = reader(vec![
            ResponseFrame::Message(message!["x"]),
            ResponseFrame::Trailers(Ok(Metadata::new())),
        ]);
        assert!(r.headers().await.unwrap().is_empty());
        assert_eq!(r.message().await.unwrap(), Some(message!["x"]));
        assert!(r.trailers().await.is_ok());
    }

    #[tokio::test]
    async fn test_reader_failure_before_headers() {
        let mut r = reader(vec![ResponseFrame::Trailers(Err(Status::not_found("gone")))]);
        assert_eq!(r.headers().await.unwrap_err().code(), Code::NotFound);
        assert_eq!(r.message().await.unwrap_err().code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_reader_truncated_call() {
        let mut r = reader(vec![ResponseFrame::Message(message![1i32])]);
        assert!(r.message().await.unwrap().is_some());
        assert_eq!(r.message().await.unwrap_err().code(), Code::Unknown);
    }

    #[test]
    fn test_benign_errors() {
        assert!(TransportError::PeerFinished.is_benign());
        assert!(TransportError::StreamFinished.is_benign());
        assert!(!TransportError::Closed("reset".into()).is_benign());
        assert!(!TransportError::Other("boom".into()).is_benign());

        let status: Status = TransportError::PeerFinished.into();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(status.cause::<TransportError>().is_some());
    }
}
