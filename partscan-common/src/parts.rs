//! Part records and scan counters shared between the intake pipeline and
//! anything consuming its events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of machine-readable code a detection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeType {
    Qr,
    Barcode,
    Other,
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Qr => "QR",
            Self::Barcode => "BARCODE",
            Self::Other => "OTHER",
        };
        f.write_str(tag)
    }
}

/// Result of resolving one part number
///
/// `found == false` records a negative lookup so later scans of the same
/// unknown part do not query the catalog again. Records are immutable once
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: String,
    #[serde(rename = "Quantity")]
    pub quantity: String,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "DataSheet")]
    pub datasheet_url: Option<String>,
    #[serde(rename = "ImagePath")]
    pub image_path: Option<String>,
    #[serde(rename = "Found")]
    pub found: bool,
}

impl ResolvedPart {
    /// Negative result: the part number is unknown upstream (or the lookup failed)
    pub fn not_found(part_number: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            part_number: part_number.into(),
            quantity: quantity.into(),
            description: None,
            datasheet_url: None,
            image_path: None,
            found: false,
        }
    }
}

/// Session scan counters as reported to presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    pub total_scanned: u64,
    pub found: u64,
    pub not_found: u64,
}
