//! Pipeline execution
//!
//! A pipeline (or one page of a paginated pipeline) is serialized, handed to
//! the transport as a single streaming request, and every returned row is
//! decoded into a `PipelineResult`. Rows are either buffered until the
//! stream completes, pushed to a subscriber, or pulled through a `Stream`.
//!
//! Serialization failures surface before any I/O. Once a stream has ended,
//! later signals are ignored.

mod driver;
mod errors;
mod pagination;
mod result;
mod transport;

pub use driver::{
    ExecutionHandle, PendingExecution, PipelineExecutor, ResultStream, ResultSubscriber,
};
pub use errors::{ExecutionError, ExecutionResult};
pub use pagination::{Cursor, PageDirection, PageRequest, PaginatingPipeline, PAGINATION_OPTION};
pub use result::{ExecutionContext, PipelineResult, PipelineSnapshot};
pub use transport::{
    ExecutePipelineRequest, ResponseBatch, RowPayload, StreamController, StreamEvent,
    StreamSender, Transport, TransportStream,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::errors::BuildResult;
use crate::pipeline::Pipeline;
use crate::value::{Blob, WireValue};

/// Something the executor can run.
///
/// Implemented by complete pipelines and page requests only; the two-phase
/// grouping and joining builders are not executable.
pub trait Executable {
    fn pipeline(&self) -> &Pipeline;

    /// Options sent alongside the serialized pipeline
    fn execution_options(&self) -> BuildResult<BTreeMap<String, WireValue>> {
        Ok(BTreeMap::new())
    }
}

impl Executable for Pipeline {
    fn pipeline(&self) -> &Pipeline {
        self
    }
}

/// Per-request read settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteOptions {
    /// Read a consistent snapshot as of this time
    pub read_time: Option<DateTime<Utc>>,
    /// Run inside an existing transaction
    pub transaction: Option<Blob>,
}

impl ExecuteOptions {
    pub fn with_read_time(mut self, read_time: DateTime<Utc>) -> Self {
        self.read_time = Some(read_time);
        self
    }

    pub fn with_transaction(mut self, transaction: impl Into<Vec<u8>>) -> Self {
        self.transaction = Some(Blob::from_bytes(transaction));
        self
    }
}
