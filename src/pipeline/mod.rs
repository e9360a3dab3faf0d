//! Real-time captioning pipeline.
//!
//! Capture, coordination and engine work run on separate threads connected
//! by bounded crossbeam channels; the broadcast hub fans finished captions
//! out to subscribers.

pub mod coordinator;
pub mod error;
pub mod types;
pub(crate) mod worker;

pub use coordinator::{
    ControlMsg, CoordinatorConfig, Pipeline, PipelineController, PipelineHandle,
};
pub use error::{ErrorReporter, LogReporter, PipelineError};
pub use types::AudioChunk;
