//! # Streaming Transport Seam
//!
//! The remote engine is reached through `Transport`: one request in, one
//! stream of events out, plus a controller that abandons the stream.
//! Network, retry and auth machinery live behind this trait.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};

use super::errors::{ExecutionError, ExecutionResult};
use crate::serializer::WirePipeline;
use crate::value::{Blob, WireValue};

/// One execution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutePipelineRequest {
    /// Database resource name
    pub database: String,
    pub pipeline: WirePipeline,
    /// Execution options (pagination parameters among them)
    pub options: BTreeMap<String, WireValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Blob>,
}

/// One returned row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowPayload {
    /// Document resource name, when the row maps to a stored document
    pub name: Option<String>,
    /// `None` when the document does not exist
    pub fields: Option<BTreeMap<String, WireValue>>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

/// A batch of rows sharing one execution time
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseBatch {
    pub execution_time: Option<DateTime<Utc>>,
    pub results: Vec<RowPayload>,
}

/// Signal delivered by a transport stream
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Response(ResponseBatch),
    Error(ExecutionError),
    Complete,
}

/// Remote execution seam.
///
/// The executor cancels the stream's controller once it has accepted a
/// terminal signal; producers stop sending when `StreamSender::send`
/// returns `false`.
pub trait Transport: Send + Sync {
    /// Starts a streaming call and returns without waiting for rows
    fn submit(&self, request: ExecutePipelineRequest) -> ExecutionResult<TransportStream>;
}

#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Abandons an in-flight stream
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    signal: Arc<CancelSignal>,
}

impl StreamController {
    pub fn cancel(&self) {
        if !self.signal.cancelled.swap(true, Ordering::SeqCst) {
            self.signal.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.signal.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Receiving side of a transport stream
#[derive(Debug)]
pub struct TransportStream {
    events: mpsc::Receiver<StreamEvent>,
    controller: StreamController,
}

impl TransportStream {
    /// Bounded channel pair; the sender side is handed to the producer
    pub fn channel(capacity: usize) -> (StreamSender, TransportStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let controller = StreamController::default();
        (
            StreamSender {
                events: tx,
                controller: controller.clone(),
            },
            TransportStream {
                events: rx,
                controller,
            },
        )
    }

    pub fn controller(&self) -> StreamController {
        self.controller.clone()
    }

    /// Next event, `None` once the producer is gone
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }
}

/// Producing side of a transport stream
#[derive(Debug, Clone)]
pub struct StreamSender {
    events: mpsc::Sender<StreamEvent>,
    controller: StreamController,
}

impl StreamSender {
    /// Sends an event; `false` when the consumer is gone or cancelled
    pub async fn send(&self, event: StreamEvent) -> bool {
        if self.controller.is_cancelled() {
            return false;
        }
        self.events.send(event).await.is_ok()
    }

    pub async fn respond(&self, batch: ResponseBatch) -> bool {
        self.send(StreamEvent::Response(batch)).await
    }

    pub async fn fail(&self, error: ExecutionError) -> bool {
        self.send(StreamEvent::Error(error)).await
    }

    pub async fn complete(&self) -> bool {
        self.send(StreamEvent::Complete).await
    }

    pub fn is_cancelled(&self) -> bool {
        self.controller.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (tx, mut rx) = TransportStream::channel(4);
        assert!(tx.respond(ResponseBatch::default()).await);
        assert!(tx.complete().await);
        drop(tx);

        assert!(matches!(rx.next_event().await, Some(StreamEvent::Response(_))));
        assert!(matches!(rx.next_event().await, Some(StreamEvent::Complete)));
        assert!(rx.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_sender() {
        let (tx, rx) = TransportStream::channel(4);
        let controller = rx.controller();
        controller.cancel();
        controller.cancelled().await;
        assert!(tx.is_cancelled());
        assert!(!tx.complete().await);
    }
}
