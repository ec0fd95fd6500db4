// Registration Service
// Validate → compute full code → render → insert student → write image

use serde::Serialize;
use std::path::PathBuf;

use crate::artifacts::ArtifactStore;
use crate::barcode::{BarcodeRenderer, FullCode};
use crate::db::{self, Store, Student};
use crate::error::Result;
use crate::validation::validate_registration;

/// What a successful registration produced
#[derive(Debug, Clone, Serialize)]
pub struct BarcodeArtifact {
    pub student: Student,
    pub full_code: FullCode,
    pub path: PathBuf,
}

pub struct RegistrationService<R> {
    renderer: R,
    artifacts: ArtifactStore,
}

impl<R: BarcodeRenderer> RegistrationService<R> {
    pub fn new(renderer: R, artifacts: ArtifactStore) -> Self {
        Self { renderer, artifacts }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Register a student and produce their barcode image.
    ///
    /// Nothing is written for invalid input. The image is rendered in memory
    /// first and written only after the insert succeeds; the insert is rolled
    /// back if the write fails, so a student row always has its image.
    pub fn register(
        &self,
        store: &Store,
        name: &str,
        matric_number: &str,
        code: &str,
    ) -> Result<BarcodeArtifact> {
        let input = validate_registration(name, matric_number, code).map_err(|e| {
            tracing::warn!(field = e.field(), "Registration rejected: {}", e);
            e
        })?;

        let full_code = FullCode::from_payload(&input.payload);
        let image = self.renderer.render(&full_code)?;

        let (student, path) = store.with_transaction(|conn| {
            let student = db::insert_student(conn, &input.name, &input.matric_number, &full_code)?;
            let path = self.artifacts.write(&full_code, &image)?;
            Ok((student, path))
        })?;

        tracing::info!(
            student_id = student.id,
            barcode = %full_code,
            path = %path.display(),
            "Registered {}",
            student.name
        );

        Ok(BarcodeArtifact {
            student,
            full_code,
            path,
        })
    }
}
