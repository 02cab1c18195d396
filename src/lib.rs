//! Downsample the textures of `.glb` files in bulk and optionally Draco-compress
//! them with the external `gltf-pipeline` tool.

pub mod compress;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scene;
pub mod texture;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{FailureKind, PipelineError};

pub mod prelude {
    pub use crate::compress::{DracoCompressor, DracoSettings};
    pub use crate::config::{PipelineConfig, Variant};
    pub use crate::error::{FailureKind, PipelineError};
    pub use crate::pipeline::{BatchReport, run_batch, shrink_file};
    pub use crate::scene::Scene;
    pub use crate::texture::{TextureSize, downsample_scene};
}
