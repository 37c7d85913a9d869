//! Transcode engine: cancellation, progress aggregation and the sample pump

pub mod cancel;
pub mod pipeline;
pub mod progress;

pub use cancel::CancellationFlag;
pub use pipeline::{PipelineResult, TranscodePipeline};
pub use progress::{
    ConsoleProgressCallback, JsonProgressCallback, NoOpProgressCallback, ProgressAggregator,
    ProgressCallback,
};
