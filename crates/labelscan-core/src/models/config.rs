//! Configuration structures for the rendering and scanning pipeline.

use serde::{Deserialize, Serialize};

use super::barcode::Symbology;

/// Main configuration for the labelscan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelscanConfig {
    /// Label renderer configuration.
    pub renderer: RendererConfig,

    /// Barcode scanner configuration.
    pub scanner: ScannerConfig,

    /// Request pipeline configuration.
    pub pipeline: PipelineConfig,

    /// PDF rasterization configuration.
    pub pdf: PdfConfig,
}

/// Remote ZPL renderer configuration (Labelary-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Base URL of the rendering service.
    pub base_url: String,

    /// Print density in dots per millimetre (6, 8, 12 or 24).
    pub dpmm: u32,

    /// Label width in inches.
    pub label_width: f32,

    /// Label height in inches.
    pub label_height: f32,

    /// Index of the label to render when the ZPL holds several.
    pub label_index: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.labelary.com".to_string(),
            dpmm: 8,
            label_width: 4.0,
            label_height: 6.0,
            label_index: 0,
            timeout_secs: 30,
        }
    }
}

/// How a page is turned into black and white when measuring symbol extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarizerKind {
    /// One Otsu threshold for the whole page.
    Global,
    /// Local mean threshold, for unevenly lit scans and photos.
    Adaptive,
}

/// Barcode scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Symbologies to decode.
    pub symbologies: Vec<Symbology>,

    /// Maximum number of barcodes of one symbology decoded per page.
    pub max_symbols_per_type: usize,

    /// Also scan a 90 degree rotated copy of the page for linear symbologies.
    pub rotate_linear: bool,

    /// Tolerance in pixels for merging duplicate detections.
    pub dedup_tolerance: u32,

    /// Row band height in pixels used for reading-order sorting.
    pub reading_order_band: u32,

    /// Binarization strategy.
    pub binarizer: BinarizerKind,

    /// Block size (pixels) for the adaptive binarizer.
    pub adaptive_block_size: u32,

    /// Offset subtracted from the local mean by the adaptive binarizer.
    pub adaptive_offset: i32,

    /// Minimum number of digits for Interleaved 2 of 5.
    pub itf_min_length: usize,

    /// Report EAN-13 codes with a leading zero as UPC-A.
    pub upca_from_ean13: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbologies: Symbology::ALL.to_vec(),
            max_symbols_per_type: 8,
            rotate_linear: true,
            dedup_tolerance: 8,
            reading_order_band: 20,
            binarizer: BinarizerKind::Global,
            adaptive_block_size: 31,
            adaptive_offset: 10,
            itf_min_length: 6,
            upca_from_ean13: true,
        }
    }
}

impl ScannerConfig {
    /// Whether a symbology is enabled.
    pub fn is_enabled(&self, symbology: Symbology) -> bool {
        self.symbologies.contains(&symbology)
    }
}

/// Request pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of pages of one request scanned concurrently.
    pub max_concurrent_pages: usize,

    /// Maximum pages to scan per document (0 = unlimited).
    pub max_pages: usize,

    /// Maximum accepted upload size in bytes (0 = unlimited).
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages: 4,
            max_pages: 0,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Which engine turns PDF pages into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfBackend {
    /// Pdfium when the library can be loaded, embedded images otherwise.
    Auto,
    /// Render every page with Pdfium; fail when the library is missing.
    Pdfium,
    /// Use the largest embedded image of each page.
    Embedded,
}

/// PDF rasterization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Rasterization engine.
    pub backend: PdfBackend,

    /// Render resolution in dots per inch.
    pub dpi: f32,

    /// Path to the Pdfium shared library; the system library is used when unset.
    pub pdfium_library: Option<String>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            backend: PdfBackend::Auto,
            dpi: 203.0,
            pdfium_library: None,
        }
    }
}

impl LabelscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Renderer endpoint for the configured printer and label size.
    pub fn render_url(&self) -> String {
        let r = &self.renderer;
        format!(
            "{}/v1/printers/{}dpmm/labels/{}x{}/{}/",
            r.base_url.trim_end_matches('/'),
            r.dpmm,
            r.label_width,
            r.label_height,
            r.label_index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_render_url() {
        let config = LabelscanConfig::default();
        assert_eq!(
            config.render_url(),
            "http://api.labelary.com/v1/printers/8dpmm/labels/4x6/0/"
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LabelscanConfig =
            serde_json::from_str(r#"{"scanner": {"dedup_tolerance": 3, "symbologies": ["CODE128"]}}"#)
                .unwrap();
        assert_eq!(config.scanner.dedup_tolerance, 3);
        assert!(config.scanner.is_enabled(Symbology::Code128));
        assert!(!config.scanner.is_enabled(Symbology::Ean13));
        assert_eq!(config.scanner.max_symbols_per_type, 8);
        assert_eq!(config.pdf.backend, PdfBackend::Auto);
        assert_eq!(config.pipeline.max_concurrent_pages, 4);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = LabelscanConfig::default();
        config.pipeline.max_pages = 3;
        config.scanner.binarizer = BinarizerKind::Adaptive;
        config.pdf.backend = PdfBackend::Embedded;
        config.save(&path).unwrap();

        let loaded = LabelscanConfig::from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.max_pages, 3);
        assert_eq!(loaded.scanner.binarizer, BinarizerKind::Adaptive);
        assert_eq!(loaded.pdf.backend, PdfBackend::Embedded);
    }
}
