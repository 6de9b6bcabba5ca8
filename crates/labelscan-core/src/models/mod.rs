//! Data models shared by the pipeline stages.

pub mod barcode;
pub mod config;
pub mod label;

pub use barcode::{BarcodeMatch, BoundingBox, PageError, ScanResult, Symbology};
pub use config::{
    BinarizerKind, LabelscanConfig, PdfBackend, PdfConfig, PipelineConfig, RendererConfig, ScannerConfig,
};
pub use label::{RenderRequest, RenderedLabel, ScanRequest, Upload};
