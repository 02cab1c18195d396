//! Directory layout: input listing, scratch lifecycle, output naming and moves.

use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use crate::error::PipelineError;

/// Regular files in `dir` whose name ends with `.{extension}`, sorted by name.
///
/// The suffix match is case-sensitive and works on raw names, so files whose
/// names are not valid UTF-8 are still picked up.
pub fn list_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut inputs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();

        let matches = path
            .file_name()
            .is_some_and(|n| n.as_encoded_bytes().ends_with(suffix.as_bytes()));
        if matches && path.is_file() {
            inputs.push(path);
        }
    }

    inputs.sort();
    Ok(inputs)
}

/// `prefix` + the file name of `input`, inside `output_dir`.
pub fn output_path(output_dir: &Path, prefix: &str, input: &Path) -> PathBuf {
    let mut name = OsString::from(prefix);
    if let Some(file_name) = input.file_name() {
        name.push(file_name);
    }
    output_dir.join(name)
}

/// Delete `path` if it exists; a missing file is not an error.
pub fn remove_file_if_exists(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(path, e)),
    }
}

/// Move a file, falling back to copy and delete across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    fs::copy(from, to).map_err(|e| PipelineError::io(to, e))?;
    fs::remove_file(from).map_err(|e| PipelineError::io(from, e))
}

/// Scratch directory that exists, empty, for the lifetime of the value.
///
/// Dropping it removes the directory and everything in it.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create the directory, clearing leftovers from an interrupted run.
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        match fs::remove_dir_all(path) {
            Ok(()) => tracing::debug!("Cleared stale scratch directory {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(path, e)),
        }
        fs::create_dir_all(path).map_err(|e| PipelineError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `source` into the scratch directory under its own name, overwriting.
    pub fn stage(&self, source: &Path) -> Result<PathBuf, PipelineError> {
        let name = source.file_name().ok_or_else(|| {
            PipelineError::io(
                source,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
        let staged = self.path.join(name);
        fs::copy(source, &staged).map_err(|e| PipelineError::io(&staged, e))?;
        Ok(staged)
    }

    /// Remove the directory, reporting failure instead of ignoring it.
    pub fn close(mut self) -> Result<(), PipelineError> {
        self.removed = true;
        fs::remove_dir_all(&self.path).map_err(|e| PipelineError::io(&self.path, e))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
