//! Run configuration, loaded from an optional TOML file.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{compress::DracoSettings, error::PipelineError, texture::TextureSize};

/// What happens to a file after its textures are downsampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Draco-compress with the external tool.
    #[default]
    Pipeline,
    /// Move the rewritten file straight to the output directory.
    TexturesOnly,
}

impl Variant {
    pub fn output_prefix(self) -> &'static str {
        match self {
            Variant::Pipeline => "simplified_",
            Variant::TexturesOnly => "reduced_texture_",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Pipeline => f.write_str("pipeline"),
            Variant::TexturesOnly => f.write_str("textures-only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub output_dir: PathBuf,
    /// File extension without the leading dot.
    pub extension: String,
    pub variant: Variant,
    pub texture_size: TextureSize,
    pub draco: DracoSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("original_models"),
            scratch_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("models"),
            extension: "glb".to_string(),
            variant: Variant::default(),
            texture_size: TextureSize::default(),
            draco: DracoSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        toml::from_str(&contents).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.texture_size.validate()?;

        if self.extension.trim_start_matches('.').is_empty() {
            return Err(PipelineError::InvalidConfig(
                "extension must not be empty".to_string(),
            ));
        }

        // the scratch directory is wiped at the start and end of a run
        let scratch = resolve(&self.scratch_dir);
        for (name, dir) in [("input", &self.input_dir), ("output", &self.output_dir)] {
            let dir = resolve(dir);
            if scratch.starts_with(&dir) || dir.starts_with(&scratch) {
                return Err(PipelineError::InvalidConfig(format!(
                    "scratch directory {} must not contain or lie inside the {name} directory {}",
                    self.scratch_dir.display(),
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Absolute form of `path` with symlinks resolved as far as it exists on disk.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return absolute.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.input_dir, Path::new("original_models"));
        assert_eq!(config.scratch_dir, Path::new("temp"));
        assert_eq!(config.output_dir, Path::new("models"));
        assert_eq!(config.texture_size, TextureSize::square(128));
        assert_eq!(config.variant, Variant::Pipeline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrink.toml");
        fs::write(
            &path,
            r#"
variant = "textures-only"
texture_size = [256, 64]

[draco]
program = "/opt/bin/gltf-pipeline"
simplify = false
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.variant, Variant::TexturesOnly);
        assert_eq!(config.texture_size, TextureSize { width: 256, height: 64 });
        assert_eq!(config.draco.program, "/opt/bin/gltf-pipeline");
        assert!(!config.draco.simplify);
        assert_eq!(config.draco.compression_level, 10);
        assert_eq!(config.input_dir, Path::new("original_models"));
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrink.toml");
        fs::write(&path, "variant = \"everything\"").unwrap();

        let err = PipelineConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Config);
    }

    #[test]
    fn test_validate_rejects_scratch_over_output() {
        let config = PipelineConfig {
            scratch_dir: PathBuf::from("models"),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let config = PipelineConfig {
            texture_size: TextureSize::square(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nested_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir_all(work.join("original_models")).unwrap();

        let enclosing_input = PipelineConfig {
            input_dir: work.join("original_models"),
            scratch_dir: work.clone(),
            output_dir: dir.path().join("models"),
            ..Default::default()
        };
        assert!(matches!(
            enclosing_input.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        // neither side exists yet
        let enclosing_output = PipelineConfig {
            input_dir: work.join("original_models"),
            scratch_dir: dir.path().join("temp"),
            output_dir: dir.path().join("temp").join("models"),
            ..Default::default()
        };
        assert!(enclosing_output.validate().is_err());

        let inside_input = PipelineConfig {
            input_dir: work.clone(),
            scratch_dir: work.join("original_models").join("..").join("temp"),
            output_dir: dir.path().join("models"),
            ..Default::default()
        };
        assert!(inside_input.validate().is_err());

        let siblings = PipelineConfig {
            input_dir: work.join("original_models"),
            scratch_dir: work.join("original_models_tmp"),
            output_dir: work.join("models"),
            ..Default::default()
        };
        assert!(siblings.validate().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_sees_through_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("original_models");
        fs::create_dir(&input).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("link")).unwrap();

        let config = PipelineConfig {
            input_dir: input,
            scratch_dir: dir.path().join("link"),
            output_dir: dir.path().join("models"),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_texture_size() {
        let config = PipelineConfig {
            texture_size: TextureSize::square(100_000),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let config = PipelineConfig {
            texture_size: TextureSize {
                width: crate::texture::MAX_TEXTURE_SIZE,
                height: 1,
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_prefixes() {
        assert_eq!(Variant::Pipeline.output_prefix(), "simplified_");
        assert_eq!(Variant::TexturesOnly.output_prefix(), "reduced_texture_");
    }
}
