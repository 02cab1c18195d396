//! Draco compression through the external `gltf-pipeline` tool.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use serde::Deserialize;

use crate::{error::PipelineError, workspace};

pub const DEFAULT_PROGRAM: &str = "gltf-pipeline";

/// Fixed compression parameters handed to the compressor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DracoSettings {
    /// Executable name (looked up on `PATH`) or path.
    pub program: String,
    pub compression_level: u8,
    pub position_bits: u8,
    pub normal_bits: u8,
    pub texcoord_bits: u8,
    pub color_bits: u8,
    pub generic_bits: u8,
    pub simplify: bool,
}

impl Default for DracoSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            compression_level: 10,
            position_bits: 6,
            normal_bits: 4,
            texcoord_bits: 4,
            color_bits: 4,
            generic_bits: 4,
            simplify: true,
        }
    }
}

/// Captured result of one successful compressor run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct DracoCompressor {
    settings: DracoSettings,
}

impl DracoCompressor {
    pub fn new(settings: DracoSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DracoSettings {
        &self.settings
    }

    /// Full argument list for compressing `input` into `output`.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let s = &self.settings;
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
        ];

        let flags = [
            ("--draco.compressionLevel", s.compression_level),
            ("--draco.quantizePositionBits", s.position_bits),
            ("--draco.quantizeNormalBits", s.normal_bits),
            ("--draco.quantizeTexcoordBits", s.texcoord_bits),
            ("--draco.quantizeColorBits", s.color_bits),
            ("--draco.quantizeGenericBits", s.generic_bits),
        ];
        for (flag, value) in flags {
            args.push(flag.into());
            args.push(value.to_string().into());
        }

        if s.simplify {
            args.push("--optimize.simplify".into());
        }

        args
    }

    /// Locate the compressor executable.
    pub fn resolve(&self) -> Result<PathBuf, PipelineError> {
        which::which(&self.settings.program).map_err(|source| PipelineError::ToolNotFound {
            program: self.settings.program.clone(),
            source,
        })
    }

    /// Run the compressor and block until it exits.
    ///
    /// A non-zero exit or a missing output file is an error. Any file already at
    /// `output` is deleted first so it cannot pass for the tool's result.
    pub fn compress(&self, input: &Path, output: &Path) -> Result<ToolOutput, PipelineError> {
        let program = self.resolve()?;
        workspace::remove_file_if_exists(output)?;
        let args = self.args(input, output);
        tracing::debug!("Running {} {:?}", program.display(), args);

        let out = Command::new(&program)
            .args(&args)
            .output()
            .map_err(|e| PipelineError::io(&program, e))?;

        let result = ToolOutput {
            status: out.status,
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };

        if !result.status.success() {
            return Err(PipelineError::ExternalTool {
                program: self.settings.program.clone(),
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }

        if !output.is_file() {
            return Err(PipelineError::ToolProducedNothing {
                program: self.settings.program.clone(),
                output: output.to_path_buf(),
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_default_args_match_fixed_parameters() {
        let compressor = DracoCompressor::new(DracoSettings::default());
        let args = compressor.args(Path::new("temp/a.glb"), Path::new("models/simplified_a.glb"));

        assert_eq!(
            strings(&args),
            [
                "-i",
                "temp/a.glb",
                "-o",
                "models/simplified_a.glb",
                "--draco.compressionLevel",
                "10",
                "--draco.quantizePositionBits",
                "6",
                "--draco.quantizeNormalBits",
                "4",
                "--draco.quantizeTexcoordBits",
                "4",
                "--draco.quantizeColorBits",
                "4",
                "--draco.quantizeGenericBits",
                "4",
                "--optimize.simplify",
            ]
        );
    }

    #[test]
    fn test_simplify_can_be_disabled() {
        let compressor = DracoCompressor::new(DracoSettings {
            simplify: false,
            ..Default::default()
        });
        let args = strings(&compressor.args(Path::new("in.glb"), Path::new("out.glb")));
        assert!(!args.iter().any(|a| a == "--optimize.simplify"));
    }

    #[test]
    fn test_missing_program_is_reported() {
        let compressor = DracoCompressor::new(DracoSettings {
            program: "glb-shrink-no-such-compressor".to_string(),
            ..Default::default()
        });

        let err = compressor
            .compress(Path::new("in.glb"), Path::new("out.glb"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolNotFound { .. }));
        assert_eq!(err.kind(), FailureKind::ExternalTool);
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> DracoCompressor {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        DracoCompressor::new(DracoSettings {
            program: path.to_string_lossy().into_owned(),
            ..Default::default()
        })
    }

    // One test, so no other test thread forks while a script is open for writing.
    #[cfg(unix)]
    #[test]
    fn test_tool_failures_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.glb");
        let output = dir.path().join("out.glb");

        let failing = script(
            dir.path(),
            "failing-compressor",
            "#!/bin/sh\necho 'draco exploded' >&2\nexit 3\n",
        );
        match failing.compress(&input, &output).unwrap_err() {
            PipelineError::ExternalTool { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "draco exploded");
            }
            other => panic!("unexpected error: {other}"),
        }

        let lazy = script(dir.path(), "lazy-compressor", "#!/bin/sh\nexit 0\n");
        let err = lazy.compress(&input, &output).unwrap_err();
        assert!(matches!(err, PipelineError::ToolProducedNothing { .. }));

        // output left over from an earlier run
        std::fs::write(&output, b"stale").unwrap();
        let err = lazy.compress(&input, &output).unwrap_err();
        assert!(matches!(err, PipelineError::ToolProducedNothing { .. }));
        assert!(!output.exists());

        let copying = script(dir.path(), "copying-compressor", "#!/bin/sh\ncp \"$2\" \"$4\"\n");
        std::fs::write(&input, b"glb").unwrap();
        let result = copying.compress(&input, &output).unwrap();
        assert!(result.status.success());
        assert_eq!(std::fs::read(&output).unwrap(), b"glb");
    }
}
