// Barcode Attendance - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod artifacts;
pub mod attendance;
pub mod barcode;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod registration;
pub mod system;
pub mod validation;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use artifacts::ArtifactStore;
pub use attendance::{mark_attendance, AttendanceResult, AttendanceService};
pub use barcode::{
    checksum_digit, BarcodeDecoder, BarcodeRenderer, Ean13PngRenderer, FullCode, ImageFileDecoder,
};
pub use config::Config;
pub use db::{AttendanceEvent, AttendanceRecord, Store, Student};
pub use error::{AttendanceError, Result};
pub use registration::{BarcodeArtifact, RegistrationService};
pub use system::AttendanceSystem;
pub use validation::{validate_registration, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
