//! Core library for ZPL label rendering and barcode scanning.
//!
//! This crate provides:
//! - Raster sources: rendered labels, PNG/JPEG uploads and multi-page PDFs
//! - PDF pages rendered with Pdfium (`pdfium` feature), or read from their embedded images
//! - Barcode scanning of linear (Code 128, Code 39, Code 93, ITF, Codabar, EAN/UPC)
//!   and 2D (QR, Data Matrix, PDF417, Aztec) symbologies
//! - Page-aware result aggregation
//! - Request orchestration around a remote ZPL renderer (`native` feature)

pub mod aggregate;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod raster;
pub mod scan;

#[cfg(feature = "native")]
pub mod render;
#[cfg(feature = "native")]
pub mod service;

#[cfg(test)]
mod testing;

pub use aggregate::{PageScan, aggregate};
pub use error::{ErrorCategory, ErrorResponse, LabelscanError, RenderError, Result, ScanFailure, SourceError};
pub use models::{
    BarcodeMatch, BinarizerKind, BoundingBox, LabelscanConfig, PageError, PdfBackend, PdfConfig, PipelineConfig,
    RenderRequest, RenderedLabel, RendererConfig, ScanRequest, ScanResult, ScannerConfig, Symbology, Upload,
};
pub use pipeline::scan_document;
pub use raster::{EmbeddedImageRasterizer, MediaType, PdfProcessor, RasterPage, RasterSource};
#[cfg(feature = "pdfium")]
pub use raster::PdfiumRasterizer;
pub use scan::{BarcodeScanner, Detection, Detector, SymbologyDetector};

#[cfg(feature = "native")]
pub use render::{LabelRenderer, LabelaryRenderer};
#[cfg(feature = "native")]
pub use service::LabelService;
