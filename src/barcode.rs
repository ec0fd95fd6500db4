// EAN-13 codec layer
// Checksum arithmetic plus pluggable image rendering and decoding

use std::fmt;
use std::path::{Path, PathBuf};

use std::io::Cursor;

use barcoders::sym::ean13::EAN13;
use image::{GrayImage, ImageFormat, Luma};
use rxing::Exceptions;
use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, Result};
use crate::validation::PAYLOAD_LEN;

/// Length of a full barcode value (payload + checksum digit)
pub const FULL_CODE_LEN: usize = PAYLOAD_LEN + 1;

/// Default rendered bar height in pixels
pub const DEFAULT_BAR_HEIGHT: u32 = 80;

/// Pixels per barcode module
const MODULE_WIDTH: u32 = 3;

/// Blank modules either side of the symbol; scanners need at least 11 left and 7 right
const QUIET_ZONE_MODULES: u32 = 12;

/// Blank pixels above and below the bars
const VERTICAL_MARGIN: u32 = 10;

// ============================================================================
// CHECKSUM
// ============================================================================

/// EAN-13 check digit: weights 1,3,1,3,... from the leftmost payload digit
pub fn checksum_digit(payload: &[u8; PAYLOAD_LEN]) -> u8 {
    let sum: u32 = payload
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d as u32 } else { d as u32 * 3 })
        .sum();

    ((10 - sum % 10) % 10) as u8
}

/// A 13-digit barcode value: the 12-digit payload followed by its check digit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullCode(String);

impl FullCode {
    pub fn from_payload(payload: &[u8; PAYLOAD_LEN]) -> Self {
        let mut code = String::with_capacity(FULL_CODE_LEN);
        for d in payload {
            code.push(char::from(b'0' + d));
        }
        code.push(char::from(b'0' + checksum_digit(payload)));
        FullCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digits the student supplied
    pub fn payload(&self) -> &str {
        &self.0[..PAYLOAD_LEN]
    }

    pub fn check_digit(&self) -> char {
        self.0.as_bytes()[PAYLOAD_LEN] as char
    }

    /// Artifact file name, derived only from the code so regenerating
    /// the same code always targets the same file
    pub fn file_name(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl fmt::Display for FullCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FullCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Turns a full code into encoded image bytes
pub trait BarcodeRenderer {
    fn render(&self, code: &FullCode) -> Result<Vec<u8>>;
}

/// Extracts zero or more barcode strings from an image file
pub trait BarcodeDecoder {
    fn decode(&self, image_path: &Path) -> Result<Vec<String>>;
}

/// PNG renderer: `barcoders` encodes the modules, `image` draws them
/// with a quiet zone so the result scans
#[derive(Debug, Clone, Copy)]
pub struct Ean13PngRenderer {
    height: u32,
}

impl Ean13PngRenderer {
    pub fn new(height: u32) -> Self {
        Self { height }
    }
}

impl Default for Ean13PngRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_BAR_HEIGHT)
    }
}

impl BarcodeRenderer for Ean13PngRenderer {
    fn render(&self, code: &FullCode) -> Result<Vec<u8>> {
        let render_error = |message: String| AttendanceError::Render {
            barcode: code.to_string(),
            message,
        };

        // barcoders computes its own check digit from the payload
        let symbol = EAN13::new(code.payload().to_string())
            .map_err(|e| render_error(format!("{:?}", e)))?;
        let modules = symbol.encode();

        let margin = QUIET_ZONE_MODULES * MODULE_WIDTH;
        let width = modules.len() as u32 * MODULE_WIDTH + 2 * margin;
        let height = self.height + 2 * VERTICAL_MARGIN;
        let mut canvas = GrayImage::from_pixel(width, height, Luma([255]));

        for (i, &module) in modules.iter().enumerate() {
            if module != 1 {
                continue;
            }
            let left = margin + i as u32 * MODULE_WIDTH;
            for x in left..left + MODULE_WIDTH {
                for y in VERTICAL_MARGIN..VERTICAL_MARGIN + self.height {
                    canvas.put_pixel(x, y, Luma([0]));
                }
            }
        }

        let mut bytes = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| render_error(e.to_string()))?;

        Ok(bytes)
    }
}

/// Image file decoder backed by `rxing`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileDecoder;

impl BarcodeDecoder for ImageFileDecoder {
    fn decode(&self, image_path: &Path) -> Result<Vec<String>> {
        let decode_error = |message: String| AttendanceError::Decode {
            path: PathBuf::from(image_path),
            message,
        };

        if !image_path.is_file() {
            return Err(decode_error("file does not exist".to_string()));
        }

        let path_str = image_path
            .to_str()
            .ok_or_else(|| decode_error("path is not valid UTF-8".to_string()))?;

        match rxing::helpers::detect_multiple_in_file(path_str) {
            Ok(results) => Ok(results.iter().map(|r| r.getText().to_string()).collect()),
            Err(Exceptions::NotFoundException(_)) => Ok(Vec::new()),
            Err(e) => Err(decode_error(format!("{:?}", e))),
        }
    }
}
