//! docpipe - Typed query pipelines for a document database
//!
//! Pipelines are built from a source stage and a chain of transformation
//! stages, serialized into the wire protocol, and executed as a single
//! streaming request.
//!
//! ```no_run
//! use docpipe::prelude::*;
//!
//! # fn build() -> docpipe::errors::BuildResult<Pipeline> {
//! let pipeline = PipelineSource::collection("books")?
//!     .filter(equal("genre", "fiction"))
//!     .sort([field("rating").descending()])?
//!     .limit(10)?;
//! # Ok(pipeline)
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod execution;
pub mod expr;
pub mod observability;
pub mod pipeline;
pub mod serializer;
pub mod stage;
pub mod value;

/// Everything needed to build and run pipelines
pub mod prelude {
    pub use crate::config::ExecutorConfig;
    pub use crate::errors::{BuildError, BuildErrorCode, BuildResult};
    pub use crate::execution::{
        Cursor, ExecuteOptions, ExecutionError, ExecutionResult, PaginatingPipeline,
        PipelineExecutor, PipelineResult, PipelineSnapshot, ResultSubscriber, Transport,
    };
    pub use crate::expr::*;
    pub use crate::pipeline::{Pipeline, PipelineSource, StructuredQuery};
    pub use crate::stage::{
        DistanceMeasure, FindNearestOptions, JoinKind, MergeMode, SampleSize, SortDensity,
        SortTruncation, UnnestOptions,
    };
    pub use crate::value::{Blob, DocumentReference, GeoPoint, WireValue};
}
