// Wires config, store and both services together for the front ends

use std::path::Path;

use crate::artifacts::ArtifactStore;
use crate::attendance::{AttendanceResult, AttendanceService};
use crate::barcode::{BarcodeDecoder, BarcodeRenderer, Ean13PngRenderer, ImageFileDecoder};
use crate::config::Config;
use crate::db::Store;
use crate::error::Result;
use crate::registration::{BarcodeArtifact, RegistrationService};

pub struct AttendanceSystem<R = Ean13PngRenderer, D = ImageFileDecoder> {
    store: Store,
    registration: RegistrationService<R>,
    attendance: AttendanceService<D>,
}

impl AttendanceSystem {
    /// Production wiring: database file, PNG renderer, rxing decoder
    pub fn open(config: &Config) -> Result<Self> {
        let store = Store::open(&config.database_path)?;
        tracing::debug!(db = %config.database_path.display(), "Database opened");

        Ok(Self::with_parts(
            store,
            Ean13PngRenderer::new(config.barcode_height),
            ImageFileDecoder,
            ArtifactStore::new(&config.barcode_dir),
        ))
    }
}

impl<R: BarcodeRenderer, D: BarcodeDecoder> AttendanceSystem<R, D> {
    pub fn with_parts(store: Store, renderer: R, decoder: D, artifacts: ArtifactStore) -> Self {
        Self {
            store,
            registration: RegistrationService::new(renderer, artifacts),
            attendance: AttendanceService::new(decoder),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn register(&self, name: &str, matric_number: &str, code: &str) -> Result<BarcodeArtifact> {
        self.registration.register(&self.store, name, matric_number, code)
    }

    pub fn scan(&self, image_path: &Path) -> Result<AttendanceResult> {
        self.attendance.scan(&self.store, image_path)
    }

    pub fn mark_attendance(&self, decoded_value: &str) -> Result<AttendanceResult> {
        self.attendance.mark_attendance(&self.store, decoded_value)
    }

    /// Summaries of the latest marks, newest first
    pub fn recent_marks(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .store
            .recent_attendance(limit)?
            .into_iter()
            .map(|r| format!("{} ({}) marked present", r.student.name, r.student.matric_number))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::barcode::FullCode;
    use std::path::PathBuf;

    /// Renderer that writes the code text instead of an image
    pub struct TextRenderer;

    impl BarcodeRenderer for TextRenderer {
        fn render(&self, code: &FullCode) -> Result<Vec<u8>> {
            Ok(code.as_str().as_bytes().to_vec())
        }
    }

    /// Decoder that reads the file's text content as the single barcode,
    /// or reports nothing for an empty file
    pub struct TextDecoder;

    impl BarcodeDecoder for TextDecoder {
        fn decode(&self, image_path: &Path) -> Result<Vec<String>> {
            let text = std::fs::read_to_string(image_path).map_err(|e| {
                crate::error::AttendanceError::Decode {
                    path: PathBuf::from(image_path),
                    message: e.to_string(),
                }
            })?;
            Ok(text.split_whitespace().map(str::to_string).collect())
        }
    }

    pub fn text_system(dir: &Path) -> AttendanceSystem<TextRenderer, TextDecoder> {
        AttendanceSystem::with_parts(
            Store::open_in_memory().unwrap(),
            TextRenderer,
            TextDecoder,
            ArtifactStore::new(dir.join("barcodes")),
        )
    }
}
