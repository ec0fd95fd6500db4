// Error taxonomy shared by the library, the CLI and the HTTP server

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Barcode {barcode} is already registered to another student")]
    DuplicateBarcode { barcode: String },

    #[error("No barcode detected in {}", path.display())]
    NoBarcodeDetected { path: PathBuf },

    #[error("No student found for barcode {barcode}")]
    StudentNotFound { barcode: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Could not write barcode image {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not render barcode {barcode}: {message}")]
    Render { barcode: String, message: String },

    #[error("Could not read barcode from {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AttendanceError {
    /// Stable identifier for the failed precondition
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::Validation(_) => "validation",
            AttendanceError::DuplicateBarcode { .. } => "duplicate_barcode",
            AttendanceError::NoBarcodeDetected { .. } => "no_barcode_detected",
            AttendanceError::StudentNotFound { .. } => "student_not_found",
            AttendanceError::Storage(_) => "storage",
            AttendanceError::Artifact { .. } => "artifact",
            AttendanceError::Render { .. } => "render",
            AttendanceError::Decode { .. } => "decode",
            AttendanceError::Config { .. } => "config",
            AttendanceError::Internal { .. } => "internal",
        }
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            AttendanceError::Validation(_) | AttendanceError::Config { .. } => 2,
            AttendanceError::DuplicateBarcode { .. } => 3,
            AttendanceError::NoBarcodeDetected { .. } => 4,
            AttendanceError::StudentNotFound { .. } => 5,
            AttendanceError::Storage(_)
            | AttendanceError::Artifact { .. }
            | AttendanceError::Render { .. }
            | AttendanceError::Decode { .. }
            | AttendanceError::Internal { .. } => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
