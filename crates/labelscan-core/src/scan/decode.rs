//! Symbology detectors backed by the `rxing` decoders.
//!
//! One detector per enabled symbology. Each pass asks the decoder for a single
//! symbol of its format; the symbol is then painted over and the page decoded
//! again, so repeated barcodes with the same payload are all found.

use image::GrayImage;
use image::imageops;
use rxing::{BarcodeFormat, RXingResult};
use tracing::{debug, trace};

use super::binarize::PageImage;
use super::extent::symbol_extent;
use super::{Detection, Detector};
use crate::models::barcode::{BoundingBox, Symbology};
use crate::models::config::ScannerConfig;

/// Pixels of white border painted around a found symbol before the next pass.
const MASK_MARGIN: u32 = 4;

/// Decoder format for a symbology.
pub fn barcode_format(symbology: Symbology) -> BarcodeFormat {
    match symbology {
        Symbology::Code128 => BarcodeFormat::CODE_128,
        Symbology::Code39 => BarcodeFormat::CODE_39,
        Symbology::Code93 => BarcodeFormat::CODE_93,
        Symbology::Itf => BarcodeFormat::ITF,
        Symbology::Codabar => BarcodeFormat::CODABAR,
        Symbology::Ean13 => BarcodeFormat::EAN_13,
        Symbology::Ean8 => BarcodeFormat::EAN_8,
        Symbology::UpcA => BarcodeFormat::UPC_A,
        Symbology::UpcE => BarcodeFormat::UPC_E,
        Symbology::QrCode => BarcodeFormat::QR_CODE,
        Symbology::DataMatrix => BarcodeFormat::DATA_MATRIX,
        Symbology::Pdf417 => BarcodeFormat::PDF_417,
        Symbology::Aztec => BarcodeFormat::AZTEC,
    }
}

/// Symbology of a decoder format, `None` for formats the scanner does not report.
pub fn symbology_of(format: &BarcodeFormat) -> Option<Symbology> {
    let symbology = match format {
        BarcodeFormat::CODE_128 => Symbology::Code128,
        BarcodeFormat::CODE_39 => Symbology::Code39,
        BarcodeFormat::CODE_93 => Symbology::Code93,
        BarcodeFormat::ITF => Symbology::Itf,
        BarcodeFormat::CODABAR => Symbology::Codabar,
        BarcodeFormat::EAN_13 => Symbology::Ean13,
        BarcodeFormat::EAN_8 => Symbology::Ean8,
        BarcodeFormat::UPC_A => Symbology::UpcA,
        BarcodeFormat::UPC_E => Symbology::UpcE,
        BarcodeFormat::QR_CODE => Symbology::QrCode,
        BarcodeFormat::DATA_MATRIX => Symbology::DataMatrix,
        BarcodeFormat::PDF_417 => Symbology::Pdf417,
        BarcodeFormat::AZTEC => Symbology::Aztec,
        _ => return None,
    };
    Some(symbology)
}

/// Result filters that depend on the scanner configuration.
#[derive(Debug, Clone, Copy)]
struct PayloadRules {
    itf_min_length: usize,
    upca_from_ean13: bool,
}

/// Finds every barcode of one symbology on a page.
pub struct SymbologyDetector {
    symbology: Symbology,
    format: BarcodeFormat,
    max_symbols: usize,
    rotate: bool,
    rules: PayloadRules,
}

impl SymbologyDetector {
    pub fn new(symbology: Symbology, config: &ScannerConfig) -> Self {
        Self {
            symbology,
            format: barcode_format(symbology),
            max_symbols: config.max_symbols_per_type.max(1),
            rotate: config.rotate_linear && symbology.is_linear(),
            rules: PayloadRules {
                itf_min_length: config.itf_min_length,
                upca_from_ean13: config.upca_from_ean13 && config.is_enabled(Symbology::UpcA),
            },
        }
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    /// Decode one symbol of this detector's format.
    fn decode_once(&self, image: &GrayImage) -> Option<RXingResult> {
        let (width, height) = image.dimensions();
        match rxing::helpers::detect_in_luma(image.as_raw().clone(), width, height, Some(self.format.clone())) {
            Ok(result) => Some(result),
            Err(e) => {
                trace!("{}: no symbol ({})", self.symbology, e);
                None
            }
        }
    }

    /// Turn a decoder result into a detection in page coordinates.
    ///
    /// `unrotate` maps points of the scanned image back onto the page.
    fn to_detection(
        &self,
        result: &RXingResult,
        page: &PageImage,
        unrotate: impl Fn(f32, f32) -> (f32, f32),
    ) -> Option<Detection> {
        let (symbology, payload) = self.normalize(result)?;

        let points: Vec<(f32, f32)> = result.getPoints().iter().map(|p| unrotate(p.x, p.y)).collect();
        let location = symbol_extent(page, &points, symbology.is_linear())?;

        Some(Detection {
            symbology,
            payload,
            location,
        })
    }

    fn normalize(&self, result: &RXingResult) -> Option<(Symbology, String)> {
        let symbology = symbology_of(result.getBarcodeFormat())?;
        let text = result.getText();

        match symbology {
            Symbology::Itf if text.len() < self.rules.itf_min_length => {
                debug!("Dropping ITF payload shorter than {} digits", self.rules.itf_min_length);
                None
            }
            Symbology::Ean13 if self.rules.upca_from_ean13 && text.len() == 13 && text.starts_with('0') => {
                Some((Symbology::UpcA, text[1..].to_string()))
            }
            _ => Some((symbology, text.to_string())),
        }
    }

    /// Repeatedly decode and paint over symbols of one orientation of the page.
    ///
    /// `work` is the page in scan orientation; `page_box` maps a detection back
    /// into that orientation for masking.
    fn sweep(
        &self,
        work: &mut GrayImage,
        page: &PageImage,
        found: &mut Vec<Detection>,
        unrotate: impl Fn(f32, f32) -> (f32, f32),
        page_box: impl Fn(&BoundingBox) -> BoundingBox,
    ) {
        let mut skipped = 0;
        while found.len() < self.max_symbols && skipped <= self.max_symbols {
            let Some(result) = self.decode_once(work) else {
                break;
            };

            match self.to_detection(&result, page, &unrotate) {
                Some(detection) => {
                    mask(work, &page_box(&detection.location));
                    found.push(detection);
                }
                None => {
                    // Decoded, but nothing to report; paint over the decoder's own points and go on.
                    skipped += 1;
                    let points: Vec<(f32, f32)> = result.getPoints().iter().map(|p| (p.x, p.y)).collect();
                    if !mask_points(work, &points) {
                        break;
                    }
                }
            }
        }
    }
}

impl Detector for SymbologyDetector {
    fn name(&self) -> &str {
        self.symbology.label()
    }

    fn detect(&self, page: &PageImage) -> Vec<Detection> {
        let mut found = Vec::new();
        let mut work = page.gray().clone();
        self.sweep(&mut work, page, &mut found, |x, y| (x, y), |b| *b);

        if self.rotate && found.len() < self.max_symbols {
            // Clockwise quarter turn: page (x, y) lands on (h - 1 - y, x).
            let height = page.height() as f32;
            let page_height = page.height();
            let mut rotated = imageops::rotate90(&work);
            self.sweep(
                &mut rotated,
                page,
                &mut found,
                move |x, y| (y, height - 1.0 - x),
                move |b| BoundingBox::new(page_height - b.bottom(), b.x, b.height, b.width),
            );
        }

        found
    }
}

/// Paint a box white, grown by [`MASK_MARGIN`].
fn mask(image: &mut GrayImage, location: &BoundingBox) {
    let (width, height) = image.dimensions();
    let x0 = location.x.saturating_sub(MASK_MARGIN);
    let y0 = location.y.saturating_sub(MASK_MARGIN);
    let x1 = (location.right() + MASK_MARGIN).min(width);
    let y1 = (location.bottom() + MASK_MARGIN).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, image::Luma([255]));
        }
    }
}

/// Paint the box spanned by decoder points white; `false` when the points cover nothing.
fn mask_points(image: &mut GrayImage, points: &[(f32, f32)]) -> bool {
    let xs = points.iter().map(|&(x, _)| x.max(0.0) as u32);
    let ys = points.iter().map(|&(_, y)| y.max(0.0) as u32);
    match (xs.clone().min(), xs.max(), ys.clone().min(), ys.max()) {
        (Some(x0), Some(x1), Some(y0), Some(y1)) => {
            mask(image, &BoundingBox::from_corners(x0, y0, x1 + 1, y1 + 1));
            true
        }
        _ => false,
    }
}

/// One detector per enabled symbology, in configuration order.
pub fn symbology_detectors(config: &ScannerConfig) -> Vec<Box<dyn Detector>> {
    let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
    for &symbology in &config.symbologies {
        if detectors.iter().any(|d| d.name() == symbology.label()) {
            continue;
        }
        detectors.push(Box::new(SymbologyDetector::new(symbology, config)));
    }
    detectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::BinarizerKind;
    use crate::scan::binarize::Binarizer;
    use crate::testing::Canvas;
    use pretty_assertions::assert_eq;

    fn page(canvas: &Canvas) -> PageImage {
        Binarizer::new(BinarizerKind::Global).binarize(&canvas.image())
    }

    #[test]
    fn test_every_symbology_maps_to_a_format_and_back() {
        for symbology in Symbology::ALL {
            assert_eq!(symbology_of(&barcode_format(symbology)), Some(symbology));
        }
        assert_eq!(symbology_of(&BarcodeFormat::MAXICODE), None);
    }

    #[test]
    fn test_repeated_payload_is_found_at_each_position() {
        let mut canvas = Canvas::new(480, 360);
        let first = canvas.draw(BarcodeFormat::CODE_128, "SAME", 30, 20, 2, 60);
        let second = canvas.draw(BarcodeFormat::CODE_128, "SAME", 30, 220, 2, 60);

        let detector = SymbologyDetector::new(Symbology::Code128, &ScannerConfig::default());
        let mut found = detector.detect(&page(&canvas));
        found.sort_by_key(|d| d.location.y);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].location, first);
        assert_eq!(found[1].location, second);
    }

    #[test]
    fn test_symbol_cap_limits_passes() {
        let mut canvas = Canvas::new(480, 360);
        canvas.draw(BarcodeFormat::CODE_128, "ONE", 30, 20, 2, 60);
        canvas.draw(BarcodeFormat::CODE_128, "TWO", 30, 220, 2, 60);

        let config = ScannerConfig {
            max_symbols_per_type: 1,
            ..ScannerConfig::default()
        };
        let found = SymbologyDetector::new(Symbology::Code128, &config).detect(&page(&canvas));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_upca_is_reported_from_ean13_decoder() {
        let mut canvas = Canvas::new(400, 160);
        canvas.draw(BarcodeFormat::UPC_A, "03600029145", 30, 30, 2, 70);

        let detector = SymbologyDetector::new(Symbology::Ean13, &ScannerConfig::default());
        let found = detector.detect(&page(&canvas));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].symbology, Symbology::UpcA);
        assert_eq!(found[0].payload, "036000291452");
    }

    #[test]
    fn test_quarter_turned_linear_code_maps_to_page_coordinates() {
        let mut canvas = Canvas::new(300, 300);
        canvas.draw(BarcodeFormat::CODE_39, "TURN", 40, 60, 2, 50);
        let turned = imageops::rotate90(&canvas.image());
        let page = Binarizer::new(BinarizerKind::Global).binarize(&turned);

        let found = SymbologyDetector::new(Symbology::Code39, &ScannerConfig::default()).detect(&page);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload, "TURN");
        let location = found[0].location;
        assert!(location.height > location.width);
        assert!(location.fits_within(300, 300));
    }
}
