// Attendance Service
// Decoded barcode → student lookup → append attendance event

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::barcode::BarcodeDecoder;
use crate::db::{self, Store};
use crate::error::{AttendanceError, Result};

/// Outcome of a successful attendance mark
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceResult {
    pub event_id: i64,
    pub student_id: i64,
    pub name: String,
    pub matric_number: String,
    pub barcode: String,
    pub timestamp: DateTime<Utc>,
}

impl AttendanceResult {
    /// Log line shown by the front ends
    pub fn summary(&self) -> String {
        format!("{} ({}) marked present", self.name, self.matric_number)
    }
}

/// Mark attendance for whoever owns `decoded_value`.
///
/// Matching is exact: no trimming, no case folding, no prefix matching.
/// Lookup and insert share one transaction.
pub fn mark_attendance(store: &Store, decoded_value: &str) -> Result<AttendanceResult> {
    let result = store.with_transaction(|conn| {
        let student = db::find_student_by_barcode(conn, decoded_value)?.ok_or_else(|| {
            AttendanceError::StudentNotFound {
                barcode: decoded_value.to_string(),
            }
        })?;

        let event = db::insert_attendance_event(conn, student.id)?;

        Ok(AttendanceResult {
            event_id: event.id,
            student_id: student.id,
            name: student.name,
            matric_number: student.matric_number,
            barcode: student.barcode,
            timestamp: event.timestamp,
        })
    });

    match &result {
        Ok(marked) => tracing::info!(
            student_id = marked.student_id,
            timestamp = %marked.timestamp,
            "{}",
            marked.summary()
        ),
        Err(AttendanceError::StudentNotFound { barcode }) => {
            tracing::warn!(barcode = %barcode, "No student found for scanned barcode")
        }
        Err(_) => {}
    }

    result
}

/// Scans image files and marks attendance for the decoded barcode
pub struct AttendanceService<D> {
    decoder: D,
}

impl<D: BarcodeDecoder> AttendanceService<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// Decode `image_path` and mark attendance for the first barcode found.
    /// Later barcodes in the same image are ignored.
    pub fn scan(&self, store: &Store, image_path: &Path) -> Result<AttendanceResult> {
        let decoded = self.decoder.decode(image_path)?;

        let value = decoded.into_iter().next().ok_or_else(|| {
            tracing::warn!(path = %image_path.display(), "No barcode detected");
            AttendanceError::NoBarcodeDetected {
                path: image_path.to_path_buf(),
            }
        })?;

        tracing::debug!(path = %image_path.display(), "Scanned barcode data: {}", value);

        mark_attendance(store, &value)
    }

    pub fn mark_attendance(&self, store: &Store, decoded_value: &str) -> Result<AttendanceResult> {
        mark_attendance(store, decoded_value)
    }
}
