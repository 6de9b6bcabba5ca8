//! Barcode scanner: detects and decodes the barcodes of one raster page.
//!
//! A page is binarized once, then every registered [`Detector`] runs over it.
//! Detections are deduplicated and sorted into reading order.

pub mod binarize;
pub mod decode;
pub mod extent;

pub use binarize::{Binarizer, PageImage};
pub use decode::{SymbologyDetector, symbology_detectors};

use image::GrayImage;
use tracing::debug;

use crate::error::ScanFailure;
use crate::models::barcode::{BarcodeMatch, BoundingBox, Symbology};
use crate::models::config::ScannerConfig;
use crate::raster::RasterPage;

/// A decoded barcode found by a detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub symbology: Symbology,
    pub payload: String,
    pub location: BoundingBox,
}

impl From<Detection> for BarcodeMatch {
    fn from(detection: Detection) -> Self {
        BarcodeMatch::new(detection.symbology, detection.payload, detection.location)
    }
}

/// A strategy that finds barcodes on a page.
pub trait Detector: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Find all barcodes on the page.
    fn detect(&self, page: &PageImage) -> Vec<Detection>;
}

/// Scans raster pages with a set of detectors.
///
/// Immutable once built; share it behind an `Arc`.
pub struct BarcodeScanner {
    binarizer: Binarizer,
    detectors: Vec<Box<dyn Detector>>,
    dedup_tolerance: u32,
    reading_order_band: u32,
}

impl BarcodeScanner {
    /// Create a scanner with detectors for the configured symbologies.
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            binarizer: Binarizer::from_config(config),
            detectors: symbology_detectors(config),
            dedup_tolerance: config.dedup_tolerance,
            reading_order_band: config.reading_order_band.max(1),
        }
    }

    /// Register an additional detector, run after the existing ones.
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Names of the registered detectors.
    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Scan one page.
    ///
    /// Fails only when the page raster cannot be decoded; a page without
    /// barcodes yields an empty list.
    pub fn scan(&self, page: &RasterPage) -> Result<Vec<BarcodeMatch>, ScanFailure> {
        let image = page.luma()?;
        let matches = self.scan_image(&image);
        debug!(
            "Page {}: {} barcode(s)",
            page.index.map_or_else(|| "-".to_string(), |i| i.to_string()),
            matches.len()
        );
        Ok(matches)
    }

    /// Scan decoded grayscale pixels.
    pub fn scan_image(&self, image: &GrayImage) -> Vec<BarcodeMatch> {
        let (width, height) = image.dimensions();
        let page = self.binarizer.binarize(image);

        let mut detections = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(&page);
            debug!("Detector {} found {} barcode(s)", detector.name(), found.len());
            detections.extend(found);
        }

        let mut matches: Vec<BarcodeMatch> = self
            .deduplicate(detections)
            .into_iter()
            .filter(|d| d.location.fits_within(width, height))
            .map(BarcodeMatch::from)
            .collect();
        self.sort_by_reading_order(&mut matches);
        matches
    }

    /// Merge detections of the same barcode; the first occurrence keeps its position.
    fn deduplicate(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let mut unique: Vec<Detection> = Vec::with_capacity(detections.len());
        for detection in detections {
            let existing = unique.iter_mut().find(|u| {
                u.symbology == detection.symbology
                    && u.payload == detection.payload
                    && u.location.touches(&detection.location, self.dedup_tolerance)
            });
            match existing {
                Some(existing) => existing.location = existing.location.union(&detection.location),
                None => unique.push(detection),
            }
        }
        unique
    }

    /// Sort matches top to bottom in row bands, then left to right.
    fn sort_by_reading_order(&self, matches: &mut [BarcodeMatch]) {
        let band = self.reading_order_band;
        matches.sort_by_key(|m| (m.location.y / band, m.location.x));
    }
}

impl Default for BarcodeScanner {
    fn default() -> Self {
        Self::new(&ScannerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Canvas, encode_png};
    use pretty_assertions::assert_eq;
    use rxing::BarcodeFormat;

    #[test]
    fn test_blank_page_yields_no_barcodes() {
        let scanner = BarcodeScanner::default();
        let page = RasterPage::from_luma(GrayImage::from_pixel(300, 200, image::Luma([255])));
        assert_eq!(scanner.scan(&page).unwrap(), Vec::new());
    }

    #[test]
    fn test_location_is_pixel_accurate() {
        let mut canvas = Canvas::new(400, 200);
        let drawn = canvas.draw(BarcodeFormat::CODE_128, "PKG-0042", 37, 51, 2, 60);
        assert_eq!((drawn.x, drawn.y, drawn.height), (37, 51, 60));

        let matches = BarcodeScanner::default().scan_image(&canvas.image());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].symbology, Symbology::Code128);
        assert_eq!(matches[0].payload, "PKG-0042");
        assert_eq!(matches[0].location, drawn);
    }

    #[test]
    fn test_qr_code_on_an_uploaded_png() {
        let mut canvas = Canvas::new(320, 320);
        let drawn = canvas.draw(BarcodeFormat::QR_CODE, "1Z999AA10123456784", 60, 60, 6, 0);
        let page = crate::raster::RasterSource::new()
            .to_pages(Some("image/png"), &encode_png(&canvas.image()))
            .unwrap()
            .remove(0);

        let matches = BarcodeScanner::default().scan(&page).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].symbology, Symbology::QrCode);
        assert_eq!(matches[0].payload, "1Z999AA10123456784");
        assert_eq!(matches[0].location, drawn);
    }

    #[test]
    fn test_matrix_symbologies() {
        let mut canvas = Canvas::new(520, 360);
        let data_matrix = canvas.draw(BarcodeFormat::DATA_MATRIX, "DM-7781", 40, 40, 5, 0);
        let pdf417 = canvas.draw(BarcodeFormat::PDF_417, "PDF-417 LABEL", 40, 200, 2, 0);

        let matches = BarcodeScanner::default().scan_image(&canvas.image());
        let found: Vec<(Symbology, &str)> = matches
            .iter()
            .map(|m| (m.symbology, m.payload.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![(Symbology::DataMatrix, "DM-7781"), (Symbology::Pdf417, "PDF-417 LABEL")]
        );
        assert!(matches[0].location.touches(&data_matrix, 0));
        assert!(matches[1].location.touches(&pdf417, 0));
    }

    #[test]
    fn test_linear_symbologies_on_one_page_in_reading_order() {
        let mut canvas = Canvas::new(760, 440);
        canvas.draw(BarcodeFormat::EAN_13, "400638133393", 420, 20, 2, 70);
        canvas.draw(BarcodeFormat::CODE_128, "SHIP-1", 30, 24, 2, 70);
        canvas.draw(BarcodeFormat::CODE_39, "AB12", 30, 160, 2, 70);
        canvas.draw(BarcodeFormat::ITF, "12345670", 420, 160, 2, 70);
        canvas.draw(BarcodeFormat::CODABAR, "A9876B", 30, 300, 2, 70);

        let matches = BarcodeScanner::default().scan_image(&canvas.image());
        let found: Vec<(Symbology, &str)> = matches
            .iter()
            .map(|m| (m.symbology, m.payload.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (Symbology::Code128, "SHIP-1"),
                (Symbology::Ean13, "4006381333931"),
                (Symbology::Code39, "AB12"),
                (Symbology::Itf, "12345670"),
                (Symbology::Codabar, "9876"),
            ]
        );
    }

    #[test]
    fn test_rotated_and_upside_down_barcodes() {
        let mut canvas = Canvas::new(300, 300);
        canvas.draw(BarcodeFormat::CODE_128, "ROT-90", 40, 60, 2, 50);
        let rotated = image::imageops::rotate90(&canvas.image());
        let matches = BarcodeScanner::default().scan_image(&rotated);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload, "ROT-90");
        assert!(matches[0].location.height > matches[0].location.width);

        let upside_down = image::imageops::rotate180(&canvas.image());
        let matches = BarcodeScanner::default().scan_image(&upside_down);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].payload, "ROT-90");
    }

    struct Duplicate(Box<dyn Detector>);

    impl Detector for Duplicate {
        fn name(&self) -> &str {
            "duplicate"
        }

        // Same barcode, box shifted by a few pixels.
        fn detect(&self, page: &PageImage) -> Vec<Detection> {
            self.0
                .detect(page)
                .into_iter()
                .map(|mut d| {
                    d.location.x += 3;
                    d
                })
                .collect()
        }
    }

    fn code128_only() -> ScannerConfig {
        ScannerConfig {
            symbologies: vec![Symbology::Code128],
            ..ScannerConfig::default()
        }
    }

    #[test]
    fn test_two_passes_yield_one_match() {
        let config = code128_only();
        let extra = SymbologyDetector::new(Symbology::Code128, &config);
        let scanner = BarcodeScanner::new(&config).with_detector(Box::new(Duplicate(Box::new(extra))));
        assert_eq!(scanner.detector_names(), vec!["CODE128", "duplicate"]);

        let mut canvas = Canvas::new(300, 120);
        let drawn = canvas.draw(BarcodeFormat::CODE_128, "DUP", 20, 20, 2, 40);
        let matches = scanner.scan_image(&canvas.image());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location.x, 20);
        assert_eq!(matches[0].location.width, drawn.width + 3);
    }

    #[test]
    fn test_same_payload_far_apart_is_kept_twice() {
        let mut canvas = Canvas::new(400, 300);
        canvas.draw(BarcodeFormat::CODE_128, "SAME", 20, 20, 2, 40);
        canvas.draw(BarcodeFormat::CODE_128, "SAME", 20, 200, 2, 40);
        let matches = BarcodeScanner::new(&code128_only()).scan_image(&canvas.image());
        assert_eq!(matches.len(), 2);
        assert!(matches[0].location.y < matches[1].location.y);
    }

    #[test]
    fn test_scan_is_deterministic() {
        let mut canvas = Canvas::new(400, 260);
        canvas.draw(BarcodeFormat::CODE_39, "DET", 30, 30, 2, 50);
        canvas.draw(BarcodeFormat::QR_CODE, "DET", 30, 120, 4, 0);
        let image = canvas.image();

        let scanner = BarcodeScanner::default();
        assert_eq!(scanner.scan_image(&image), scanner.scan_image(&image));
    }

    #[test]
    fn test_disabled_symbology_is_ignored() {
        let mut canvas = Canvas::new(400, 120);
        canvas.draw(BarcodeFormat::CODE_39, "OFF", 30, 30, 2, 50);
        assert!(BarcodeScanner::new(&code128_only()).scan_image(&canvas.image()).is_empty());
    }

    #[test]
    fn test_unreadable_page_is_a_scan_failure() {
        let page = RasterPage {
            index: Some(2),
            width: 10,
            height: 10,
            raster: crate::raster::PageRaster::Unreadable("broken".to_string()),
        };
        assert_eq!(
            BarcodeScanner::default().scan(&page),
            Err(ScanFailure::Unreadable("broken".to_string()))
        );
    }
}
