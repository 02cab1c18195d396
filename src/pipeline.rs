//! Batch driver and per-file processing.

use std::path::{Path, PathBuf};

use crate::{
    compress::DracoCompressor,
    config::{PipelineConfig, Variant},
    error::PipelineError,
    scene::Scene,
    texture::{self, DownsampleReport, TextureSize},
    workspace::{self, ScratchDir},
};

#[derive(Debug)]
pub struct ProcessedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub textures: DownsampleReport,
}

#[derive(Debug)]
pub struct FailedFile {
    pub source: PathBuf,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<ProcessedFile>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }
}

/// How a rewritten scratch file reaches the output directory.
enum Finish {
    Move,
    Compress(DracoCompressor),
}

/// Process every matching file of the input directory once.
///
/// A failing file is logged and recorded; the batch carries on with the next
/// one. The scratch directory is gone when this returns.
pub fn run_batch(config: &PipelineConfig) -> Result<BatchReport, PipelineError> {
    config.validate()?;

    let inputs = workspace::list_inputs(&config.input_dir, &config.extension)?;
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| PipelineError::io(&config.output_dir, e))?;
    let scratch = ScratchDir::create(&config.scratch_dir)?;

    let finish = match config.variant {
        Variant::Pipeline => Finish::Compress(DracoCompressor::new(config.draco.clone())),
        Variant::TexturesOnly => Finish::Move,
    };

    tracing::debug!(
        "Processing {} file(s) from {} ({})",
        inputs.len(),
        config.input_dir.display(),
        config.variant
    );

    let mut report = BatchReport::default();

    for source in inputs {
        let name = display_name(&source);
        match process_file(&source, &scratch, config, &finish) {
            Ok(processed) => {
                tracing::info!("Processed: {name}");
                report.processed.push(processed);
            }
            Err(error) => {
                tracing::error!("Failed: {name} [{}]: {error}", error.kind());
                report.failed.push(FailedFile { source, error });
            }
        }
    }

    scratch.close()?;
    tracing::info!("Temporary files cleaned up.");

    Ok(report)
}

fn process_file(
    source: &Path,
    scratch: &ScratchDir,
    config: &PipelineConfig,
    finish: &Finish,
) -> Result<ProcessedFile, PipelineError> {
    let staged = scratch.stage(source)?;

    let textures = {
        let mut scene = Scene::import(&staged)?;
        let textures = texture::downsample_scene(&mut scene, config.texture_size)?;
        scene.export(&staged)?;
        textures
    };

    let output = workspace::output_path(&config.output_dir, config.variant.output_prefix(), source);

    match finish {
        Finish::Move => workspace::move_file(&staged, &output)?,
        Finish::Compress(compressor) => {
            let result = compressor.compress(&staged, &output);
            // keep the scratch directory empty between files
            let cleanup = workspace::remove_file_if_exists(&staged);
            if let Err(e) = &cleanup {
                tracing::warn!("{e}");
            }
            let tool_output = result?;
            cleanup?;
            if !tool_output.stdout.trim().is_empty() {
                tracing::debug!("{}", tool_output.stdout.trim());
            }
        }
    }

    Ok(ProcessedFile {
        source: source.to_path_buf(),
        output,
        textures,
    })
}

/// Downsample a single file from `input` into `output` without the batch layout.
pub fn shrink_file(
    input: &Path,
    output: &Path,
    size: TextureSize,
) -> Result<DownsampleReport, PipelineError> {
    size.validate()?;
    let mut scene = Scene::import(input)?;
    let report = texture::downsample_scene(&mut scene, size)?;
    scene.export(output)?;
    Ok(report)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
