// Library interface for trendscope modules
// This allows tests and the binary to import modules

pub mod adapters;
pub mod error;
pub mod extraction;
pub mod gaps;
pub mod llm;
pub mod opportunities;
pub mod pipeline;
pub mod relationships;
pub mod storage;
pub mod tracker;
pub mod trend;

pub use error::{PipelineError, Result};
