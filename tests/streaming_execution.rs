//! Streaming Execution Tests
//!
//! - Buffered, push and pull consumption
//! - First terminal signal wins; later ones are ignored
//! - Failures never yield partial results
//! - Rejected pipelines never reach the transport

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use docpipe::execution::{
    ExecuteOptions, ExecutionError, ExecutionHandle, PipelineResult, ResultSubscriber,
    StreamEvent,
};
use docpipe::expr::{equal, field, ExprMethods};
use docpipe::pipeline::{Pipeline, PipelineSource};
use docpipe::value::WireValue;

use support::*;

fn books() -> Pipeline {
    PipelineSource::collection("books")
        .unwrap()
        .filter(equal("genre", "fiction"))
        .sort([field("rating").descending()])
        .unwrap()
}

fn three_rows() -> Vec<StreamEvent> {
    vec![
        batch(
            100,
            vec![
                row("books/a", vec![("rating", WireValue::Integer(5))]),
                row("books/b", vec![("rating", WireValue::Integer(4))]),
            ],
        ),
        batch(101, vec![row("books/c", vec![("rating", WireValue::Integer(3))])]),
    ]
}

// =============================================================================
// Buffered Mode
// =============================================================================

#[tokio::test]
async fn test_buffered_collects_all_rows_in_order() {
    let mut events = three_rows();
    events.push(StreamEvent::Complete);
    let transport = ScriptedTransport::new(events);
    let (executor, _) = executor(transport.clone());

    let snapshot = executor.execute(&books()).await.unwrap();

    let ids: Vec<_> = snapshot.iter().filter_map(PipelineResult::id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(snapshot.results()[1].get_i64("rating"), Some(4));
    assert_eq!(snapshot.execution_time(), Some(ts(100)));
    // Rows of the later batch keep the time of the first response
    assert!(snapshot
        .iter()
        .all(|result| result.execution_time() == Some(ts(100))));
    assert_eq!(snapshot.pipeline(), &books());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].database, DATABASE);
    assert_eq!(requests[0].pipeline, books().to_wire().unwrap());
}

/// A second completion after the first must not change the result.
#[tokio::test]
async fn test_duplicate_completion_is_ignored() {
    let mut events = three_rows();
    events.push(StreamEvent::Complete);
    events.push(StreamEvent::Complete);
    let (executor, logger) = executor(ScriptedTransport::new(events));

    let snapshot = executor.execute(&books()).await.unwrap();
    assert_eq!(snapshot.len(), 3);

    assert!(eventually(|| executor.metrics().duplicate_signals == 1).await);
    assert_eq!(executor.metrics().completed, 1);
    assert!(logger
        .captured()
        .iter()
        .any(|line| line.contains("DUPLICATE_SIGNAL_IGNORED")));
}

/// Rows after completion are discarded and an error after completion is
/// not surfaced.
#[tokio::test]
async fn test_signals_after_completion_are_dropped() {
    let mut events = three_rows();
    events.push(StreamEvent::Complete);
    events.push(batch(102, vec![row("books/late", vec![])]));
    events.push(server_error("INTERNAL"));
    let (executor, _) = executor(ScriptedTransport::new(events));

    let snapshot = executor.execute(&books()).await.unwrap();
    assert_eq!(snapshot.len(), 3);
    assert!(eventually(|| executor.metrics().duplicate_signals == 1).await);
    assert_eq!(executor.metrics().rows_received, 3);
    assert_eq!(executor.metrics().failed, 0);
}

/// The producer is released once completion is accepted, even when the
/// transport keeps its end of the stream open.
#[tokio::test]
async fn test_completion_cancels_open_transport_stream() {
    let mut events = three_rows();
    events.push(StreamEvent::Complete);
    let transport = ScriptedTransport::held_open(events);
    let (executor, _) = executor(transport.clone());

    let snapshot = executor.execute(&books()).await.unwrap();
    assert_eq!(snapshot.len(), 3);

    assert!(eventually(|| transport.producers_done() == 1).await);
    assert_eq!(executor.metrics().cancelled, 0);
    assert_eq!(executor.metrics().completed, 1);
}

#[tokio::test]
async fn test_error_after_rows_fails_without_partial_result() {
    let events = vec![
        batch(100, vec![row("books/a", vec![])]),
        server_error("UNAVAILABLE"),
    ];
    let (executor, logger) = executor(ScriptedTransport::new(events));

    let err = executor.execute(&books()).await.unwrap_err();
    match &err {
        ExecutionError::Server { code, .. } => assert_eq!(code, "UNAVAILABLE"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());
    assert_eq!(executor.metrics().failed, 1);
    assert!(logger
        .captured()
        .iter()
        .any(|line| line.contains("PIPELINE_FAILED")));
}

#[tokio::test]
async fn test_stream_closed_without_terminal_signal_is_an_error() {
    let events = vec![batch(100, vec![row("books/a", vec![])])];
    let (executor, _) = executor(ScriptedTransport::new(events));

    let err = executor.execute(&books()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::StreamClosed));
}

#[tokio::test]
async fn test_undecodable_row_fails_execution() {
    let mut bad = row("books/a", vec![]);
    bad.name = Some("books".into());
    let events = vec![batch(100, vec![bad]), StreamEvent::Complete];
    let (executor, _) = executor(ScriptedTransport::new(events));

    let err = executor.execute(&books()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::Decode(_)));
}

#[tokio::test]
async fn test_empty_result_completes() {
    let (executor, _) = executor(ScriptedTransport::new(vec![StreamEvent::Complete]));

    let snapshot = executor.execute(&books()).await.unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.execution_time(), None);
}

// =============================================================================
// Rejection Before I/O
// =============================================================================

#[tokio::test]
async fn test_pipeline_without_source_never_reaches_transport() {
    let transport = ScriptedTransport::new(vec![StreamEvent::Complete]);
    let (executor, logger) = executor(transport.clone());

    let err = executor.execute(&Pipeline::default()).await.unwrap_err();

    assert!(matches!(err, ExecutionError::Rejected(_)));
    assert!(transport.requests().is_empty());
    assert_eq!(executor.metrics().rejected, 1);
    assert_eq!(executor.metrics().submitted, 0);
    assert!(logger
        .captured()
        .iter()
        .any(|line| line.contains("PIPELINE_REJECTED")));
}

#[tokio::test]
async fn test_read_time_and_transaction_are_exclusive() {
    let transport = ScriptedTransport::new(vec![StreamEvent::Complete]);
    let (executor, _) = executor(transport.clone());
    let options = ExecuteOptions::default()
        .with_read_time(ts(50))
        .with_transaction(b"tx".to_vec());

    let result = executor.submit(&books(), &options);

    assert!(matches!(result, Err(ExecutionError::Rejected(_))));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_read_time_is_forwarded() {
    let transport = ScriptedTransport::new(vec![StreamEvent::Complete]);
    let (executor, _) = executor(transport.clone());
    let options = ExecuteOptions::default().with_read_time(ts(50));

    executor.submit(&books(), &options).unwrap().await.unwrap();

    assert_eq!(transport.requests()[0].read_time, Some(ts(50)));
    assert!(transport.requests()[0].transaction.is_none());
}

#[tokio::test]
async fn test_transport_failure_is_returned_synchronously() {
    let (executor, _) = executor(Arc::new(UnreachableTransport));

    let result = executor.submit(&books(), &ExecuteOptions::default());

    assert!(matches!(result, Err(ExecutionError::Transport(_))));
    assert_eq!(executor.metrics().failed, 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_resolves_with_cancelled() {
    let transport = ScriptedTransport::held_open(vec![batch(100, vec![row("books/a", vec![])])]);
    let (executor, logger) = executor(transport);

    let pending = executor.submit(&books(), &ExecuteOptions::default()).unwrap();
    assert!(pending.cancel());
    assert!(pending.handle().is_finished());
    assert!(!pending.cancel());

    let err = pending.await.unwrap_err();
    assert!(matches!(err, ExecutionError::Cancelled));
    assert!(eventually(|| executor.metrics().cancelled == 1).await);
    assert!(logger
        .captured()
        .iter()
        .any(|line| line.contains("PIPELINE_CANCELLED")));
}

#[tokio::test]
async fn test_cancel_after_completion_is_a_no_op() {
    let (executor, _) = executor(ScriptedTransport::new(vec![StreamEvent::Complete]));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = executor
        .execute_with(&books(), &ExecuteOptions::default(), Recorder(tx))
        .unwrap();

    assert!(matches!(rx.recv().await, Some(Signal::Completed(_))));
    assert!(!handle.cancel());
}

// =============================================================================
// Push Mode
// =============================================================================

#[derive(Debug)]
enum Signal {
    Row(String),
    Error(ExecutionError),
    Completed(Option<DateTime<Utc>>),
}

struct Recorder(mpsc::UnboundedSender<Signal>);

impl ResultSubscriber for Recorder {
    fn on_next(&mut self, result: PipelineResult) {
        let id = result.id().unwrap_or_default().to_string();
        let _ = self.0.send(Signal::Row(id));
    }

    fn on_error(&mut self, error: ExecutionError) {
        let _ = self.0.send(Signal::Error(error));
    }

    fn on_completed(&mut self, execution_time: Option<DateTime<Utc>>) {
        let _ = self.0.send(Signal::Completed(execution_time));
    }
}

#[tokio::test]
async fn test_subscriber_sees_rows_then_one_completion() {
    let mut events = three_rows();
    events.push(StreamEvent::Complete);
    events.push(server_error("INTERNAL"));
    let (executor, _) = executor(ScriptedTransport::new(events));

    let (tx, mut rx) = mpsc::unbounded_channel();
    executor
        .execute_with(&books(), &ExecuteOptions::default(), Recorder(tx))
        .unwrap();

    let mut rows = Vec::new();
    loop {
        match rx.recv().await {
            Some(Signal::Row(id)) => rows.push(id),
            Some(Signal::Completed(time)) => {
                assert_eq!(time, Some(ts(100)));
                break;
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }
    assert_eq!(rows, vec!["a", "b", "c"]);

    // The subscriber is dropped once the stream drains; nothing else arrives
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_subscriber_receives_single_error() {
    let events = vec![
        batch(100, vec![row("books/a", vec![])]),
        server_error("INTERNAL"),
        server_error("INTERNAL"),
        StreamEvent::Complete,
    ];
    let (executor, _) = executor(ScriptedTransport::new(events));

    let (tx, mut rx) = mpsc::unbounded_channel();
    executor
        .execute_with(&books(), &ExecuteOptions::default(), Recorder(tx))
        .unwrap();

    assert!(matches!(rx.recv().await, Some(Signal::Row(_))));
    assert!(matches!(rx.recv().await, Some(Signal::Error(ExecutionError::Server { .. }))));
    assert!(rx.recv().await.is_none());
    assert!(eventually(|| executor.metrics().duplicate_signals == 2).await);
}

/// Cancels its own execution from inside `on_next`
struct CancellingRecorder {
    signals: mpsc::UnboundedSender<Signal>,
    handle: Arc<Mutex<Option<ExecutionHandle>>>,
}

impl ResultSubscriber for CancellingRecorder {
    fn on_next(&mut self, result: PipelineResult) {
        let id = result.id().unwrap_or_default().to_string();
        let _ = self.signals.send(Signal::Row(id));
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            assert!(handle.cancel());
        }
    }

    fn on_error(&mut self, error: ExecutionError) {
        let _ = self.signals.send(Signal::Error(error));
    }

    fn on_completed(&mut self, execution_time: Option<DateTime<Utc>>) {
        let _ = self.signals.send(Signal::Completed(execution_time));
    }
}

#[tokio::test]
async fn test_subscriber_cancelling_in_on_next_stops_delivery() {
    let transport = ScriptedTransport::held_open(three_rows());
    let (executor, logger) = executor(transport.clone());

    let slot = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscriber = CancellingRecorder {
        signals: tx,
        handle: Arc::clone(&slot),
    };
    let handle = executor
        .execute_with(&books(), &ExecuteOptions::default(), subscriber)
        .unwrap();
    *slot.lock().unwrap() = Some(handle);

    assert!(matches!(rx.recv().await, Some(Signal::Row(id)) if id == "a"));
    assert!(matches!(
        rx.recv().await,
        Some(Signal::Error(ExecutionError::Cancelled))
    ));
    assert!(rx.recv().await.is_none());

    assert_eq!(executor.metrics().cancelled, 1);
    assert_eq!(executor.metrics().completed, 0);
    assert!(eventually(|| transport.producers_done() == 1).await);
    assert!(logger
        .captured()
        .iter()
        .any(|line| line.contains("PIPELINE_CANCELLED")));
}

// =============================================================================
// Pull Mode
// =============================================================================

#[tokio::test]
async fn test_stream_yields_rows_then_ends() {
    let mut events = three_rows();
    events.push(StreamEvent::Complete);
    let (executor, _) = executor(ScriptedTransport::new(events));

    let stream = executor.stream(&books(), &ExecuteOptions::default()).unwrap();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_stream_ends_with_error_item() {
    let events = vec![
        batch(100, vec![row("books/a", vec![])]),
        server_error("ABORTED"),
    ];
    let (executor, _) = executor(ScriptedTransport::new(events));

    let items: Vec<_> = executor
        .stream(&books(), &ExecuteOptions::default())
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(ExecutionError::Server { .. })));
}

/// Rows already buffered when the stream is cancelled are not yielded.
#[tokio::test]
async fn test_cancelled_stream_yields_only_cancelled() {
    let (executor, _) = executor(ScriptedTransport::held_open(three_rows()));

    let stream = executor.stream(&books(), &ExecuteOptions::default()).unwrap();
    assert!(eventually(|| executor.metrics().rows_received == 3).await);
    assert!(stream.cancel());
    assert!(!stream.cancel());

    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(ExecutionError::Cancelled)));
    assert!(eventually(|| executor.metrics().cancelled == 1).await);
}

#[tokio::test]
async fn test_dropping_stream_cancels_execution() {
    let rows: Vec<_> = (0..64)
        .map(|i| row(&format!("books/b{}", i), vec![]))
        .collect();
    let transport = ScriptedTransport::held_open(vec![batch(100, rows)]);
    let logger = docpipe::observability::Logger::in_memory(
        docpipe::observability::Severity::Info,
    );
    let config = docpipe::config::ExecutorConfig {
        stream_buffer: 1,
        ..docpipe::config::ExecutorConfig::for_database(DATABASE)
    };
    let executor =
        docpipe::execution::PipelineExecutor::new(transport, config).with_logger(logger);

    let mut stream = executor.stream(&books(), &ExecuteOptions::default()).unwrap();
    assert!(stream.next().await.unwrap().is_ok());
    drop(stream);

    assert!(eventually(|| executor.metrics().cancelled == 1).await);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(executor.metrics().completed, 0);
}

// =============================================================================
// Logging
// =============================================================================

#[tokio::test]
async fn test_request_logged_at_trace_when_enabled() {
    let transport = ScriptedTransport::new(vec![StreamEvent::Complete]);
    let logger = docpipe::observability::Logger::in_memory(
        docpipe::observability::Severity::Trace,
    );
    let config = docpipe::config::ExecutorConfig {
        log_requests: true,
        ..docpipe::config::ExecutorConfig::for_database(DATABASE)
    };
    let executor = docpipe::execution::PipelineExecutor::new(transport, config)
        .with_logger(logger.clone());

    executor.execute(&books()).await.unwrap();

    let lines = logger.captured();
    let request = lines
        .iter()
        .find(|line| line.contains("PIPELINE_REQUEST"))
        .expect("request line");
    assert!(request.contains("TRACE"));
    assert!(lines.iter().any(|line| line.contains("PIPELINE_SUBMITTED")));
    assert!(lines.iter().any(|line| line.contains("PIPELINE_COMPLETED")));
}

#[tokio::test]
async fn test_executes_field_expression_pipeline() {
    let events = vec![
        batch(
            100,
            vec![row("books/a", vec![("total", WireValue::Double(12.5))])],
        ),
        StreamEvent::Complete,
    ];
    let (executor, _) = executor(ScriptedTransport::new(events));
    let pipeline = books()
        .add_fields([field("price").multiply(field("qty")).alias("total")])
        .unwrap();

    let snapshot = executor.execute(&pipeline).await.unwrap();
    assert_eq!(snapshot.results()[0].get_f64("total"), Some(12.5));
}
