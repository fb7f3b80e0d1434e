//! Observable pipeline execution events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events of the execution driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Serialized pipeline handed to the transport
    PipelineSubmitted,
    /// Serialized request body (TRACE, opt-in)
    PipelineRequest,
    /// First response batch received
    PipelineFirstResponse,
    /// Completion signal accepted
    PipelineCompleted,
    /// Error signal accepted
    PipelineFailed,
    /// Caller abandoned the stream
    PipelineCancelled,
    /// Serialization failed; nothing was sent
    PipelineRejected,
    /// A terminal signal arrived after the stream had already ended
    DuplicateSignalIgnored,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PipelineSubmitted => "PIPELINE_SUBMITTED",
            Event::PipelineRequest => "PIPELINE_REQUEST",
            Event::PipelineFirstResponse => "PIPELINE_FIRST_RESPONSE",
            Event::PipelineCompleted => "PIPELINE_COMPLETED",
            Event::PipelineFailed => "PIPELINE_FAILED",
            Event::PipelineCancelled => "PIPELINE_CANCELLED",
            Event::PipelineRejected => "PIPELINE_REJECTED",
            Event::DuplicateSignalIgnored => "DUPLICATE_SIGNAL_IGNORED",
        }
    }

    /// Returns true if the event ends an execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::PipelineCompleted
                | Event::PipelineFailed
                | Event::PipelineCancelled
                | Event::PipelineRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
