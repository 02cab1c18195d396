use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::ExitStatus,
};

use crate::texture::TextureError;

/// Coarse failure category reported per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Io,
    Import,
    Export,
    ExternalTool,
    Config,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Io => "io",
            FailureKind::Import => "import",
            FailureKind::Export => "export",
            FailureKind::ExternalTool => "external-tool",
            FailureKind::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to import {}: {source}", .path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("failed to export {}: {message}", .path.display())]
    Export { path: PathBuf, message: String },

    #[error("failed to resize image {image}: {source}")]
    Texture {
        image: usize,
        #[source]
        source: TextureError,
    },

    #[error("compressor `{program}` not found: {source}")]
    ToolNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("compressor `{program}` failed ({status}): {stderr}")]
    ExternalTool {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("compressor `{program}` exited successfully but wrote no {}", .output.display())]
    ToolProducedNothing { program: String, output: PathBuf },

    #[error("invalid config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Io { .. } => FailureKind::Io,
            PipelineError::Import { .. } => FailureKind::Import,
            PipelineError::Export { .. } | PipelineError::Texture { .. } => FailureKind::Export,
            PipelineError::ToolNotFound { .. }
            | PipelineError::ExternalTool { .. }
            | PipelineError::ToolProducedNothing { .. } => FailureKind::ExternalTool,
            PipelineError::Config { .. } | PipelineError::InvalidConfig(_) => FailureKind::Config,
        }
    }
}
