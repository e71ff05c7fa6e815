pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use config::{DimensionWeights, PipelineConfig, ServiceConfig};
pub use error::{AtlasError, SourceError};
pub use types::*;
