//! WASM bindings for barcode scanning.
//!
//! Scans PNG, JPEG and PDF bytes held in memory, for use in browsers and Node.js.
//! Rendering ZPL needs the network renderer and is not exposed here.

use wasm_bindgen::prelude::*;

use labelscan_core::pipeline::{check_upload, scan_document};
use labelscan_core::{
    BarcodeScanner, LabelscanConfig, LabelscanError, PdfBackend, PdfConfig, RasterSource, Symbology, Upload,
};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Wire labels of every symbology the scanner decodes.
#[wasm_bindgen(js_name = supportedSymbologies)]
pub fn supported_symbologies() -> js_sys::Array {
    Symbology::ALL
        .iter()
        .map(|s| JsValue::from_str(s.label()))
        .collect()
}

/// Scan a document with the default configuration.
///
/// Returns `{barcodes: [...], errors?: [...]}`. When `media_type` is omitted the
/// type is sniffed from the bytes.
#[wasm_bindgen(js_name = scanDocument)]
pub fn scan_document_bytes(bytes: &[u8], media_type: Option<String>) -> Result<JsValue, JsValue> {
    LabelScanner::default().scan(bytes, media_type)
}

fn to_js_error(error: LabelscanError) -> JsValue {
    JsValue::from_str(&error.to_response().error)
}

/// Configured scanner for repeated scans.
#[wasm_bindgen]
pub struct LabelScanner {
    scanner: BarcodeScanner,
    source: RasterSource,
    max_upload_bytes: usize,
}

#[wasm_bindgen]
impl LabelScanner {
    /// Create a scanner from a configuration object (same shape as the JSON config file).
    /// `undefined` or `null` selects the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<LabelScanner, JsValue> {
        let config: LabelscanConfig = if config.is_undefined() || config.is_null() {
            LabelscanConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("invalid configuration: {}", e)))?
        };
        Ok(Self::from_config(&config))
    }

    /// Names of the registered detectors.
    #[wasm_bindgen(getter)]
    pub fn detectors(&self) -> js_sys::Array {
        self.scanner
            .detector_names()
            .into_iter()
            .map(JsValue::from_str)
            .collect()
    }

    /// Scan an image or PDF.
    #[wasm_bindgen]
    pub fn scan(&self, bytes: &[u8], media_type: Option<String>) -> Result<JsValue, JsValue> {
        let upload = Upload {
            bytes: bytes.to_vec(),
            media_type,
            filename: None,
        };
        let upload = check_upload(Some(&upload), self.max_upload_bytes).map_err(to_js_error)?;
        let result = scan_document(&self.scanner, &self.source, upload).map_err(to_js_error)?;

        serde_wasm_bindgen::to_value(&result).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl LabelScanner {
    fn from_config(config: &LabelscanConfig) -> Self {
        Self {
            scanner: BarcodeScanner::new(&config.scanner),
            // No Pdfium in the browser; PDF pages are read from their embedded images.
            source: RasterSource::new()
                .with_max_pages(config.pipeline.max_pages)
                .with_pdf(PdfConfig {
                    backend: PdfBackend::Embedded,
                    ..config.pdf.clone()
                }),
            max_upload_bytes: config.pipeline.max_upload_bytes,
        }
    }
}

impl Default for LabelScanner {
    fn default() -> Self {
        Self::from_config(&LabelscanConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelscan_core::ScanResult;
    use std::io::Cursor;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn blank_png() -> Vec<u8> {
        let image = image::GrayImage::from_pixel(60, 40, image::Luma([255]));
        let mut data = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        data
    }

    #[wasm_bindgen_test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[wasm_bindgen_test]
    fn test_supported_symbologies() {
        let labels = supported_symbologies();
        assert_eq!(labels.length(), Symbology::ALL.len() as u32);
        assert_eq!(labels.get(0).as_string().as_deref(), Some("CODE128"));
        let all: Vec<String> = labels.iter().filter_map(|l| l.as_string()).collect();
        assert!(all.iter().any(|l| l == "QR"));
        assert!(all.iter().any(|l| l == "DATAMATRIX"));
    }

    #[wasm_bindgen_test]
    fn test_blank_image_scans_to_empty_result() {
        let value = scan_document_bytes(&blank_png(), Some("image/png".to_string())).unwrap();
        let result: ScanResult = serde_wasm_bindgen::from_value(value).unwrap();
        assert!(result.is_empty());
        assert!(result.errors.is_empty());
    }

    #[wasm_bindgen_test]
    fn test_unsupported_type_is_rejected() {
        let err = scan_document_bytes(b"hello", Some("text/plain".to_string())).unwrap_err();
        assert!(err.as_string().unwrap().contains("text/plain"));
    }

    #[wasm_bindgen_test]
    fn test_configured_scanner() {
        let config = serde_wasm_bindgen::to_value(&code39_only_config()).unwrap();
        let scanner = LabelScanner::new(config).unwrap();
        assert_eq!(scanner.detectors().length(), 1);

        let err = scanner.scan(&[], None).unwrap_err();
        assert_eq!(err.as_string().as_deref(), Some("uploaded file is empty"));
    }

    fn code39_only_config() -> LabelscanConfig {
        let mut config = LabelscanConfig::default();
        config.scanner.symbologies = vec![Symbology::Code39];
        config
    }
}
