//! glb-shrink - batch texture downsampler for glTF binaries

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use glb_shrink::prelude::*;

#[derive(Parser)]
#[command(name = "glb-shrink")]
#[command(about = "Downsample glb textures and optionally Draco-compress the result")]
#[command(version)]
struct Cli {
    /// Log per-image and per-tool details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    /// Downsample, then compress with gltf-pipeline (simplified_*)
    Pipeline,
    /// Downsample only (reduced_texture_*)
    TexturesOnly,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Pipeline => Variant::Pipeline,
            VariantArg::TexturesOnly => Variant::TexturesOnly,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every model of the input directory
    Run {
        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        variant: Option<VariantArg>,

        /// Input directory (default: original_models)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory (default: models)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scratch directory, deleted after the run (default: temp)
        #[arg(long)]
        scratch: Option<PathBuf>,

        /// Square texture size in pixels (default: 128)
        #[arg(long)]
        texture_size: Option<u32>,

        /// Compressor executable (default: gltf-pipeline)
        #[arg(long)]
        compressor: Option<String>,
    },

    /// Downsample the textures of a single file
    File {
        input: PathBuf,

        output: PathBuf,

        /// Square texture size in pixels
        #[arg(long, default_value_t = 128)]
        texture_size: u32,
    },

    /// List material textures and their image sizes
    Inspect { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match cli.command {
        Commands::Run {
            config,
            variant,
            input,
            output,
            scratch,
            texture_size,
            compressor,
        } => {
            let mut cfg = match &config {
                Some(path) => PipelineConfig::load(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(variant) = variant {
                cfg.variant = variant.into();
            }
            if let Some(input) = input {
                cfg.input_dir = input;
            }
            if let Some(output) = output {
                cfg.output_dir = output;
            }
            if let Some(scratch) = scratch {
                cfg.scratch_dir = scratch;
            }
            if let Some(size) = texture_size {
                cfg.texture_size = TextureSize::square(size);
            }
            if let Some(program) = compressor {
                cfg.draco.program = program;
            }

            let report = run_batch(&cfg)?;
            if !report.is_success() {
                for failed in &report.failed {
                    eprintln!("  {}: {}", failed.source.display(), failed.error);
                }
                anyhow::bail!(
                    "{} of {} file(s) failed",
                    report.failed.len(),
                    report.total()
                );
            }
        }

        Commands::File {
            input,
            output,
            texture_size,
        } => {
            tracing::info!("Converting {:?} -> {:?}", input, output);
            let report = shrink_file(&input, &output, TextureSize::square(texture_size))?;
            tracing::info!(
                "Done! {} image(s) resized, {} skipped",
                report.resized,
                report.skipped
            );
        }

        Commands::Inspect { file } => {
            let scene = Scene::import(&file)?;
            let bindings = scene.image_bindings();
            if bindings.is_empty() {
                println!("No material textures in {}", file.display());
            }
            for binding in bindings {
                let material = binding
                    .material_name
                    .clone()
                    .unwrap_or_else(|| format!("#{}", binding.material));
                match binding.image {
                    Some(image) => {
                        let size = scene
                            .image_dimensions(image)
                            .map(|(w, h)| format!("{w}x{h}"))
                            .unwrap_or_else(|| "?".to_string());
                        println!(
                            "{material} {} -> image {image} ({}, {size})",
                            binding.slot,
                            scene.mime_type(image).unwrap_or("unknown")
                        );
                    }
                    None => println!("{material} {} -> missing image", binding.slot),
                }
            }
        }
    }

    Ok(())
}
