// Barcode image directory
// One PNG per full barcode value, named after the value

use std::fs;
use std::path::{Path, PathBuf};

use crate::barcode::FullCode;
use crate::error::{AttendanceError, Result};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image for `code` lives, whether or not it exists yet
    pub fn path_for(&self, code: &FullCode) -> PathBuf {
        self.dir.join(code.file_name())
    }

    /// Write the image, creating the directory on first use.
    /// An existing file for the same code is replaced.
    pub fn write(&self, code: &FullCode, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(code);
        let artifact_error = |source| AttendanceError::Artifact {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(artifact_error)?;
        fs::write(&path, bytes).map_err(artifact_error)?;

        Ok(path)
    }
}
