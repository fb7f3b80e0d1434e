//! Scripted transport for execution tests
//!
//! Replays a fixed list of stream events for every submitted request and
//! records the requests it received.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use docpipe::config::ExecutorConfig;
use docpipe::execution::{
    ExecutePipelineRequest, ExecutionError, ExecutionResult, PipelineExecutor, ResponseBatch,
    RowPayload, StreamEvent, Transport, TransportStream,
};
use docpipe::observability::{Logger, Severity};
use docpipe::value::WireValue;

pub const DATABASE: &str = "projects/test/databases/(default)";

pub struct ScriptedTransport {
    events: Vec<StreamEvent>,
    hold_open: bool,
    requests: Mutex<Vec<ExecutePipelineRequest>>,
    producers_done: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    /// Sends `events`, then closes the stream
    pub fn new(events: Vec<StreamEvent>) -> Arc<Self> {
        Arc::new(Self {
            events,
            hold_open: false,
            requests: Mutex::new(Vec::new()),
            producers_done: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Sends `events`, then keeps the stream open until it is cancelled
    pub fn held_open(events: Vec<StreamEvent>) -> Arc<Self> {
        Arc::new(Self {
            events,
            hold_open: true,
            requests: Mutex::new(Vec::new()),
            producers_done: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn requests(&self) -> Vec<ExecutePipelineRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of submitted streams whose producer has stopped
    pub fn producers_done(&self) -> usize {
        self.producers_done.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn submit(&self, request: ExecutePipelineRequest) -> ExecutionResult<TransportStream> {
        self.requests.lock().unwrap().push(request);
        let (tx, stream) = TransportStream::channel(16);
        let events = self.events.clone();
        let hold_open = self.hold_open;
        let producers_done = Arc::clone(&self.producers_done);
        tokio::spawn(async move {
            for event in events {
                if !tx.send(event).await {
                    producers_done.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            }
            if hold_open {
                while !tx.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            producers_done.fetch_add(1, Ordering::SeqCst);
        });
        Ok(stream)
    }
}

/// Transport whose calls fail before any stream exists
pub struct UnreachableTransport;

impl Transport for UnreachableTransport {
    fn submit(&self, _request: ExecutePipelineRequest) -> ExecutionResult<TransportStream> {
        Err(ExecutionError::Transport("connection refused".into()))
    }
}

pub fn executor(transport: Arc<dyn Transport>) -> (PipelineExecutor, Logger) {
    let logger = Logger::in_memory(Severity::Trace);
    let executor = PipelineExecutor::new(transport, ExecutorConfig::for_database(DATABASE))
        .with_logger(logger.clone());
    (executor, logger)
}

pub fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

pub fn row(path: &str, fields: Vec<(&str, WireValue)>) -> RowPayload {
    RowPayload {
        name: Some(format!("{}/documents/{}", DATABASE, path)),
        fields: Some(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

pub fn batch(execution_time: i64, results: Vec<RowPayload>) -> StreamEvent {
    StreamEvent::Response(ResponseBatch {
        execution_time: Some(ts(execution_time)),
        results,
    })
}

pub fn server_error(code: &str) -> StreamEvent {
    StreamEvent::Error(ExecutionError::Server {
        code: code.into(),
        message: "scripted failure".into(),
    })
}

/// Polls `check` until it holds or a second has passed
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
