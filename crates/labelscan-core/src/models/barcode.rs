//! Barcode scan result models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Barcode symbology.
///
/// Serialized as the upper-case label used on the wire (`"CODE128"`, `"EAN13"`, ...).
/// The set is open: new symbologies are added as new variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Symbology {
    /// Code 128 (sets A, B and C, GS1-128).
    #[serde(rename = "CODE128")]
    Code128,
    /// Code 39 (standard 43-character set).
    #[serde(rename = "CODE39")]
    Code39,
    /// Interleaved 2 of 5.
    #[serde(rename = "ITF")]
    Itf,
    /// Codabar (NW-7).
    #[serde(rename = "CODABAR")]
    Codabar,
    /// EAN-13.
    #[serde(rename = "EAN13")]
    Ean13,
    /// EAN-8.
    #[serde(rename = "EAN8")]
    Ean8,
    /// UPC-A (EAN-13 with a leading zero).
    #[serde(rename = "UPCA")]
    UpcA,
    /// UPC-E (zero-suppressed UPC).
    #[serde(rename = "UPCE")]
    UpcE,
    /// Code 93.
    #[serde(rename = "CODE93")]
    Code93,
    /// QR Code.
    #[serde(rename = "QR")]
    QrCode,
    /// Data Matrix (ECC 200).
    #[serde(rename = "DATAMATRIX")]
    DataMatrix,
    /// PDF417.
    #[serde(rename = "PDF417")]
    Pdf417,
    /// Aztec.
    #[serde(rename = "AZTEC")]
    Aztec,
}

impl Symbology {
    /// Every symbology the scanner can decode.
    pub const ALL: [Symbology; 13] = [
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Itf,
        Symbology::Codabar,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::QrCode,
        Symbology::DataMatrix,
        Symbology::Pdf417,
        Symbology::Aztec,
    ];

    /// Wire label of the symbology.
    pub fn label(&self) -> &'static str {
        match self {
            Symbology::Code128 => "CODE128",
            Symbology::Code39 => "CODE39",
            Symbology::Itf => "ITF",
            Symbology::Codabar => "CODABAR",
            Symbology::Ean13 => "EAN13",
            Symbology::Ean8 => "EAN8",
            Symbology::UpcA => "UPCA",
            Symbology::UpcE => "UPCE",
            Symbology::Code93 => "CODE93",
            Symbology::QrCode => "QR",
            Symbology::DataMatrix => "DATAMATRIX",
            Symbology::Pdf417 => "PDF417",
            Symbology::Aztec => "AZTEC",
        }
    }

    /// Whether the symbology is a row of bars read along one axis.
    pub fn is_linear(&self) -> bool {
        !matches!(
            self,
            Symbology::QrCode | Symbology::DataMatrix | Symbology::Pdf417 | Symbology::Aztec
        )
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Symbology {
    type Err = String;

    /// Parse a symbology name, ignoring case, `-`, `_` and spaces (`"code-128"`, `"EAN_13"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let symbology = match normalized.as_str() {
            "I25" | "I2OF5" | "INTERLEAVED2OF5" => Symbology::Itf,
            "NW7" => Symbology::Codabar,
            "QRCODE" => Symbology::QrCode,
            "DM" | "ECC200" => Symbology::DataMatrix,
            other => Symbology::ALL
                .into_iter()
                .find(|s| s.label() == other)
                .ok_or_else(|| format!("unknown symbology: {}", s))?,
        };
        Ok(symbology)
    }
}

/// Axis-aligned bounding box in page pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a box from inclusive-exclusive corner coordinates.
    pub fn from_corners(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Whether the boxes overlap once both are grown by `margin` pixels on every side.
    pub fn touches(&self, other: &BoundingBox, margin: u32) -> bool {
        let margin = margin as u64;
        let (ax0, ay0) = (self.x as u64, self.y as u64);
        let (ax1, ay1) = (self.right() as u64 + margin, self.bottom() as u64 + margin);
        let (bx0, by0) = (other.x as u64, other.y as u64);
        let (bx1, by1) = (other.right() as u64 + margin, other.bottom() as u64 + margin);

        ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
    }

    /// Whether the box is non-empty and fits inside a `width` x `height` page.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }
}

/// A decoded barcode on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeMatch {
    /// Barcode symbology.
    #[serde(rename = "type")]
    pub symbology: Symbology,

    /// Decoded payload text.
    #[serde(rename = "data")]
    pub payload: String,

    /// Bounding box of the bars on the page.
    pub location: BoundingBox,

    /// Page number (1-indexed), present only for multi-page sources.
    #[serde(rename = "page", default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl BarcodeMatch {
    pub fn new(symbology: Symbology, payload: impl Into<String>, location: BoundingBox) -> Self {
        Self {
            symbology,
            payload: payload.into(),
            location,
            page: None,
        }
    }
}

/// A page that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    /// Page number (1-indexed), absent for single-image sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Human-readable failure description.
    pub message: String,
}

/// Barcodes found across all pages of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Matches in page order, detection order within a page.
    pub barcodes: Vec<BarcodeMatch>,

    /// Pages that failed to scan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PageError>,
}

impl ScanResult {
    /// Create an empty result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no barcodes were found.
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    /// Number of barcodes found.
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    /// Matches found on the given page.
    pub fn on_page(&self, page: u32) -> impl Iterator<Item = &BarcodeMatch> {
        self.barcodes.iter().filter(move |m| m.page == Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_match_wire_shape() {
        let mut m = BarcodeMatch::new(Symbology::Code128, "ABC-123", BoundingBox::new(10, 20, 200, 80));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "CODE128",
                "data": "ABC-123",
                "location": {"x": 10, "y": 20, "width": 200, "height": 80}
            })
        );

        m.page = Some(2);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["page"], 2);
    }

    #[test]
    fn test_empty_result_serializes_as_empty_list() {
        let json = serde_json::to_string(&ScanResult::empty()).unwrap();
        assert_eq!(json, r#"{"barcodes":[]}"#);
    }

    #[test]
    fn test_symbology_from_str() {
        assert_eq!("code-128".parse::<Symbology>(), Ok(Symbology::Code128));
        assert_eq!("EAN_13".parse::<Symbology>(), Ok(Symbology::Ean13));
        assert_eq!("i2of5".parse::<Symbology>(), Ok(Symbology::Itf));
        assert_eq!("qr".parse::<Symbology>(), Ok(Symbology::QrCode));
        assert_eq!("DataMatrix".parse::<Symbology>(), Ok(Symbology::DataMatrix));
        assert_eq!("pdf-417".parse::<Symbology>(), Ok(Symbology::Pdf417));
        assert!("maxicode".parse::<Symbology>().is_err());
    }

    #[test]
    fn test_two_dimensional_wire_labels() {
        assert_eq!(serde_json::to_value(Symbology::QrCode).unwrap(), "QR");
        assert_eq!(serde_json::to_value(Symbology::DataMatrix).unwrap(), "DATAMATRIX");
        assert!(!Symbology::Pdf417.is_linear());
        assert!(Symbology::Code93.is_linear());
    }

    #[test]
    fn test_bounding_box_union_and_touch() {
        let a = BoundingBox::new(10, 10, 50, 20);
        let b = BoundingBox::new(65, 12, 30, 20);
        assert!(!a.touches(&b, 0));
        assert!(a.touches(&b, 8));
        assert_eq!(a.union(&b), BoundingBox::new(10, 10, 85, 22));
        assert!(a.fits_within(60, 30));
        assert!(!a.fits_within(59, 30));
    }
}
