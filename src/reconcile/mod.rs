//! Refreshing mirrored status fields from the marketplace.

pub mod pipeline;

pub use pipeline::{
    PipelineSettings, RefreshPipeline, RefreshReport, SkippedFetch, StatusUpdate,
};
