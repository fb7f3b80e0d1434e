//! # Streaming Execution Driver
//!
//! One spawned task per execution consumes the transport stream. It is the
//! single producer for the consumer side, so buffering needs no lock.
//!
//! ## Terminal signals
//! Completion, error and cancellation race through `StreamState`: the first
//! one to move the state out of `Streaming` wins. Signals already queued
//! behind the winner are logged and counted, never delivered, and the
//! transport stream is then cancelled. Rows arriving after the winner are
//! discarded.
//!
//! Every row of one execution carries the execution time of the first
//! response.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::errors::{ExecutionError, ExecutionResult};
use super::result::{ExecutionContext, PipelineResult, PipelineSnapshot};
use super::transport::{
    ExecutePipelineRequest, ResponseBatch, StreamController, StreamEvent, Transport,
    TransportStream,
};
use super::{ExecuteOptions, Executable};
use crate::config::ExecutorConfig;
use crate::errors::BuildError;
use crate::observability::{Event, ExecutionMetrics, Logger, MetricsSnapshot, Severity};
use crate::pipeline::Pipeline;

/// Push-mode consumer.
///
/// Exactly one of `on_error` / `on_completed` is called, after which the
/// subscriber receives nothing more.
pub trait ResultSubscriber: Send + 'static {
    fn on_next(&mut self, result: PipelineResult);
    fn on_error(&mut self, error: ExecutionError);
    fn on_completed(&mut self, execution_time: Option<DateTime<Utc>>);
}

const STREAMING: u8 = 0;
const COMPLETED: u8 = 1;
const FAILED: u8 = 2;
const CANCELLED: u8 = 3;

/// Once-only terminal transition
#[derive(Debug, Default)]
struct StreamState(AtomicU8);

impl StreamState {
    fn is_streaming(&self) -> bool {
        self.0.load(Ordering::SeqCst) == STREAMING
    }

    fn current(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }

    /// Moves to `terminal`; `false` if another signal got there first
    fn finish(&self, terminal: u8) -> bool {
        self.0
            .compare_exchange(STREAMING, terminal, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Where decoded rows go
enum Delivery {
    Push(Box<dyn ResultSubscriber>),
    Buffer {
        results: Vec<PipelineResult>,
        done: oneshot::Sender<ExecutionResult<PipelineSnapshot>>,
        pipeline: Pipeline,
    },
    Channel(mpsc::Sender<ExecutionResult<PipelineResult>>),
}

impl Delivery {
    /// Hands over one row; `false` when the consumer has gone away
    async fn next(&mut self, result: PipelineResult) -> bool {
        match self {
            Delivery::Push(subscriber) => {
                subscriber.on_next(result);
                true
            }
            Delivery::Buffer { results, done, .. } => {
                if done.is_closed() {
                    return false;
                }
                results.push(result);
                true
            }
            Delivery::Channel(tx) => tx.send(Ok(result)).await.is_ok(),
        }
    }

    async fn fail(self, error: ExecutionError) {
        match self {
            Delivery::Push(mut subscriber) => subscriber.on_error(error),
            Delivery::Buffer { done, .. } => {
                let _ = done.send(Err(error));
            }
            Delivery::Channel(tx) => {
                let _ = tx.send(Err(error)).await;
            }
        }
    }

    fn complete(self, execution_time: Option<DateTime<Utc>>) {
        match self {
            Delivery::Push(mut subscriber) => subscriber.on_completed(execution_time),
            Delivery::Buffer {
                results,
                done,
                pipeline,
            } => {
                let _ = done.send(Ok(PipelineSnapshot::new(results, execution_time, pipeline)));
            }
            // Dropping the sender ends the stream
            Delivery::Channel(_) => {}
        }
    }
}

/// Caller-side control over a running execution
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    execution_id: Uuid,
    state: Arc<StreamState>,
    controller: StreamController,
}

impl ExecutionHandle {
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Abandons the stream. No rows and no completion are delivered after a
    /// successful cancel; the consumer observes `ExecutionError::Cancelled`.
    ///
    /// Returns `false` if the stream had already ended.
    pub fn cancel(&self) -> bool {
        if self.state.finish(CANCELLED) {
            self.controller.cancel();
            true
        } else {
            false
        }
    }

    pub fn is_finished(&self) -> bool {
        !self.state.is_streaming()
    }
}

/// Buffered execution in flight; resolves to the full snapshot
#[derive(Debug)]
pub struct PendingExecution {
    receiver: oneshot::Receiver<ExecutionResult<PipelineSnapshot>>,
    handle: ExecutionHandle,
}

impl PendingExecution {
    pub fn handle(&self) -> &ExecutionHandle {
        &self.handle
    }

    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }
}

impl Future for PendingExecution {
    type Output = ExecutionResult<PipelineSnapshot>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(ExecutionError::Runtime(
                    "driver task ended without a result".into(),
                ))
            })
        })
    }
}

/// Pull-mode results backed by a bounded channel
#[derive(Debug)]
pub struct ResultStream {
    receiver: mpsc::Receiver<ExecutionResult<PipelineResult>>,
    handle: ExecutionHandle,
    cancel_reported: bool,
}

impl ResultStream {
    pub fn handle(&self) -> &ExecutionHandle {
        &self.handle
    }

    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }
}

impl Stream for ResultStream {
    type Item = ExecutionResult<PipelineResult>;

    /// After a successful cancel, rows still buffered in the channel are
    /// discarded and the stream ends with a single `Cancelled` item.
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.handle.state.current() == CANCELLED {
            if self.cancel_reported {
                return Poll::Ready(None);
            }
            self.cancel_reported = true;
            self.receiver.close();
            return Poll::Ready(Some(Err(ExecutionError::Cancelled)));
        }
        self.receiver.poll_recv(cx)
    }
}

/// Runs pipelines against a transport
pub struct PipelineExecutor {
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
    metrics: Arc<ExecutionMetrics>,
    logger: Logger,
}

impl PipelineExecutor {
    pub fn new(transport: Arc<dyn Transport>, config: ExecutorConfig) -> Self {
        let logger = Logger::console(config.log_level);
        Self {
            transport,
            config,
            metrics: Arc::new(ExecutionMetrics::new()),
            logger,
        }
    }

    /// Replaces the console logger
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Runs to completion and returns every row in delivery order
    pub async fn execute<E: Executable + ?Sized>(
        &self,
        executable: &E,
    ) -> ExecutionResult<PipelineSnapshot> {
        self.submit(executable, &ExecuteOptions::default())?.await
    }

    /// Starts a buffered execution; await the returned value for the snapshot
    pub fn submit<E: Executable + ?Sized>(
        &self,
        executable: &E,
        options: &ExecuteOptions,
    ) -> ExecutionResult<PendingExecution> {
        let (done, receiver) = oneshot::channel();
        let delivery = Delivery::Buffer {
            results: Vec::new(),
            done,
            pipeline: executable.pipeline().clone(),
        };
        let handle = self.start(executable, options, delivery)?;
        Ok(PendingExecution { receiver, handle })
    }

    /// Starts a push-mode execution delivering rows to `subscriber`
    pub fn execute_with<E, S>(
        &self,
        executable: &E,
        options: &ExecuteOptions,
        subscriber: S,
    ) -> ExecutionResult<ExecutionHandle>
    where
        E: Executable + ?Sized,
        S: ResultSubscriber,
    {
        self.start(executable, options, Delivery::Push(Box::new(subscriber)))
    }

    /// Starts a pull-mode execution
    pub fn stream<E: Executable + ?Sized>(
        &self,
        executable: &E,
        options: &ExecuteOptions,
    ) -> ExecutionResult<ResultStream> {
        let (tx, receiver) = mpsc::channel(self.config.stream_buffer.max(1));
        let handle = self.start(executable, options, Delivery::Channel(tx))?;
        Ok(ResultStream {
            receiver,
            handle,
            cancel_reported: false,
        })
    }

    fn build_request<E: Executable + ?Sized>(
        &self,
        executable: &E,
        options: &ExecuteOptions,
    ) -> Result<ExecutePipelineRequest, BuildError> {
        if options.read_time.is_some() && options.transaction.is_some() {
            return Err(BuildError::invalid_argument(
                "read_time and transaction cannot be combined",
            ));
        }
        Ok(ExecutePipelineRequest {
            database: self.config.database.clone(),
            pipeline: executable.pipeline().to_wire()?,
            options: executable.execution_options()?,
            read_time: options.read_time,
            transaction: options.transaction.clone(),
        })
    }

    fn start<E: Executable + ?Sized>(
        &self,
        executable: &E,
        options: &ExecuteOptions,
        delivery: Delivery,
    ) -> ExecutionResult<ExecutionHandle> {
        let request = match self.build_request(executable, options) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.increment_rejected();
                self.logger.warn(
                    Event::PipelineRejected,
                    &[("code", e.code().code()), ("message", e.message())],
                );
                return Err(ExecutionError::Rejected(e));
            }
        };

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ExecutionError::Runtime(e.to_string()))?;

        let context = Arc::new(ExecutionContext::new(request.database.as_str()));
        let execution_id = context.execution_id.to_string();

        if self.config.log_requests && self.logger.enabled(Severity::Trace) {
            let body = serde_json::to_string(&request).unwrap_or_default();
            self.logger.trace(
                Event::PipelineRequest,
                &[("execution_id", &execution_id), ("request", &body)],
            );
        }

        let stages = request.pipeline.stages.len().to_string();
        let fingerprint = request.pipeline.fingerprint().unwrap_or_default();

        let stream = match self.transport.submit(request) {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.increment_failed();
                self.logger.error(
                    Event::PipelineFailed,
                    &[
                        ("error", &e.to_string()),
                        ("execution_id", &execution_id),
                        ("kind", e.kind()),
                    ],
                );
                return Err(e);
            }
        };

        self.metrics.increment_submitted();
        self.logger.info(
            Event::PipelineSubmitted,
            &[
                ("database", &self.config.database),
                ("execution_id", &execution_id),
                ("fingerprint", &fingerprint),
                ("stages", &stages),
            ],
        );

        let state = Arc::new(StreamState::default());
        let handle = ExecutionHandle {
            execution_id: context.execution_id,
            state: Arc::clone(&state),
            controller: stream.controller(),
        };

        let driver = StreamDriver {
            state,
            context,
            metrics: Arc::clone(&self.metrics),
            logger: self.logger.clone(),
            execution_id,
        };
        runtime.spawn(driver.run(stream, delivery));

        Ok(handle)
    }
}

enum Step {
    Event(Option<StreamEvent>),
    Cancelled,
}

/// State owned by the per-execution task
struct StreamDriver {
    state: Arc<StreamState>,
    context: Arc<ExecutionContext>,
    metrics: Arc<ExecutionMetrics>,
    logger: Logger,
    execution_id: String,
}

impl StreamDriver {
    async fn run(self, mut stream: TransportStream, delivery: Delivery) {
        let controller = stream.controller();
        let mut delivery = Some(delivery);
        let mut execution_time: Option<DateTime<Utc>> = None;
        let mut seen_response = false;
        let mut rows: u64 = 0;

        loop {
            let step = tokio::select! {
                biased;
                _ = controller.cancelled() => Step::Cancelled,
                event = stream.next_event() => Step::Event(event),
            };

            match step {
                Step::Cancelled => {
                    if self.state.current() == CANCELLED {
                        if let Some(delivery) = delivery.take() {
                            self.metrics.increment_cancelled();
                            self.logger.info(
                                Event::PipelineCancelled,
                                &[
                                    ("execution_id", &self.execution_id),
                                    ("rows", &rows.to_string()),
                                ],
                            );
                            delivery.fail(ExecutionError::Cancelled).await;
                        }
                    }
                    return;
                }
                Step::Event(Some(StreamEvent::Response(batch))) => {
                    if !self.state.is_streaming() {
                        continue;
                    }
                    if !seen_response {
                        seen_response = true;
                        execution_time = batch.execution_time;
                        self.logger.info(
                            Event::PipelineFirstResponse,
                            &[("execution_id", &self.execution_id)],
                        );
                    }
                    rows += self
                        .deliver_batch(batch, execution_time, &mut delivery, &controller)
                        .await;
                }
                Step::Event(Some(StreamEvent::Error(error))) => {
                    if self.state.finish(FAILED) {
                        self.record_failure(&error);
                        if let Some(delivery) = delivery.take() {
                            delivery.fail(error).await;
                        }
                        self.drain_after_terminal(&mut stream, &controller);
                        return;
                    }
                    self.ignore_duplicate("error");
                }
                Step::Event(Some(StreamEvent::Complete)) => {
                    if self.state.finish(COMPLETED) {
                        self.metrics.increment_completed();
                        self.logger.info(
                            Event::PipelineCompleted,
                            &[
                                ("execution_id", &self.execution_id),
                                ("rows", &rows.to_string()),
                            ],
                        );
                        if let Some(delivery) = delivery.take() {
                            delivery.complete(execution_time);
                        }
                        self.drain_after_terminal(&mut stream, &controller);
                        return;
                    }
                    self.ignore_duplicate("complete");
                }
                Step::Event(None) => {
                    if self.state.finish(FAILED) {
                        let error = ExecutionError::StreamClosed;
                        self.record_failure(&error);
                        if let Some(delivery) = delivery.take() {
                            delivery.fail(error).await;
                        }
                    }
                    return;
                }
            }
        }
    }

    /// Decodes and forwards one batch; returns the number of rows delivered
    async fn deliver_batch(
        &self,
        batch: ResponseBatch,
        execution_time: Option<DateTime<Utc>>,
        delivery: &mut Option<Delivery>,
        controller: &StreamController,
    ) -> u64 {
        let mut delivered = 0;
        for payload in batch.results {
            if !self.state.is_streaming() {
                break;
            }
            let Some(sink) = delivery.as_mut() else {
                break;
            };
            match PipelineResult::decode(payload, execution_time, Arc::clone(&self.context)) {
                Ok(result) => {
                    self.metrics.add_rows(1);
                    let sent = tokio::select! {
                        biased;
                        _ = controller.cancelled() => None,
                        sent = sink.next(result) => Some(sent),
                    };
                    match sent {
                        Some(true) => {
                            delivered += 1;
                            continue;
                        }
                        Some(false) => {}
                        // Cancelled while waiting for channel capacity
                        None => break,
                    }
                    // Consumer dropped its end
                    delivery.take();
                    if self.state.finish(CANCELLED) {
                        self.metrics.increment_cancelled();
                        self.logger.info(
                            Event::PipelineCancelled,
                            &[
                                ("execution_id", &self.execution_id),
                                ("reason", "consumer_dropped"),
                            ],
                        );
                        controller.cancel();
                    }
                    break;
                }
                Err(error) => {
                    if self.state.finish(FAILED) {
                        self.record_failure(&error);
                        controller.cancel();
                        if let Some(sink) = delivery.take() {
                            sink.fail(error).await;
                        }
                    }
                    break;
                }
            }
        }
        delivered
    }

    /// Accounts for signals already queued behind the terminal one, then
    /// cancels the transport stream so the producer stops
    fn drain_after_terminal(&self, stream: &mut TransportStream, controller: &StreamController) {
        while let Some(event) = stream.try_next_event() {
            match event {
                StreamEvent::Response(_) => {}
                StreamEvent::Error(_) => self.ignore_duplicate("error"),
                StreamEvent::Complete => self.ignore_duplicate("complete"),
            }
        }
        controller.cancel();
    }

    fn record_failure(&self, error: &ExecutionError) {
        self.metrics.increment_failed();
        self.logger.error(
            Event::PipelineFailed,
            &[
                ("error", &error.to_string()),
                ("execution_id", &self.execution_id),
                ("kind", error.kind()),
            ],
        );
    }

    fn ignore_duplicate(&self, signal: &str) {
        self.metrics.increment_duplicate_signals();
        self.logger.warn(
            Event::DuplicateSignalIgnored,
            &[("execution_id", &self.execution_id), ("signal", signal)],
        );
    }
}
