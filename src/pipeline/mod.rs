//! Inbound email handoff pipeline.

pub mod receive;

pub use receive::{
    Authorization, PipelineDeps, PipelineSettings, ReceiveOutcome, ReceivePipeline, authorize,
};
