//! Raster source adapter: turns rendered labels, uploaded images and PDFs
//! into an ordered sequence of page rasters.

mod pdf;
#[cfg(feature = "pdfium")]
mod pdfium;

pub use pdf::{EmbeddedImage, EmbeddedImageRasterizer, PdfProcessor};
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

use std::borrow::Cow;
use std::fmt;

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb};
use tracing::{debug, warn};

use crate::error::{PdfError, ScanFailure, SourceError};
use crate::models::config::{PdfBackend, PdfConfig};
use crate::models::label::RenderedLabel;

/// Accepted upload media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
}

impl MediaType {
    /// Resolve the media type of an upload.
    ///
    /// A missing or generic (`application/octet-stream`) declared type is sniffed from the bytes.
    pub fn resolve(declared: Option<&str>, bytes: &[u8]) -> Result<Self, SourceError> {
        let essence = declared
            .and_then(|d| d.split(';').next())
            .map(|d| d.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if essence.is_empty() || essence == "application/octet-stream" {
            let sniffed = infer::get(bytes)
                .map(|kind| kind.mime_type())
                .unwrap_or("application/octet-stream");
            debug!("Sniffed media type: {}", sniffed);
            return Self::from_mime(sniffed);
        }

        Self::from_mime(&essence)
    }

    /// Map a media type essence onto an accepted type.
    pub fn from_mime(mime: &str) -> Result<Self, SourceError> {
        match mime {
            "application/pdf" => Ok(MediaType::Pdf),
            "image/png" => Ok(MediaType::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(MediaType::Jpeg),
            other => Err(SourceError::UnsupportedType(other.to_string())),
        }
    }

    /// Canonical media type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        }
    }

    fn image_format(&self) -> Option<ImageFormat> {
        match self {
            MediaType::Png => Some(ImageFormat::Png),
            MediaType::Jpeg => Some(ImageFormat::Jpeg),
            MediaType::Pdf => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour model of raw PDF image samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleColor {
    Gray,
    Rgb,
    Cmyk,
}

impl SampleColor {
    fn components(&self) -> usize {
        match self {
            SampleColor::Gray => 1,
            SampleColor::Rgb => 3,
            SampleColor::Cmyk => 4,
        }
    }
}

/// Pixels of one page, possibly still encoded.
#[derive(Debug, Clone)]
pub enum PageRaster {
    /// Decoded 8-bit grayscale pixels.
    Luma(GrayImage),
    /// Encoded image stream (e.g. a JPEG embedded in a PDF), decoded at scan time.
    Encoded { data: Vec<u8>, format: ImageFormat },
    /// Raw PDF image samples, decoded at scan time.
    Samples {
        data: Vec<u8>,
        color: SampleColor,
        bits: u8,
    },
    /// The page has no raster content that can be read.
    Unreadable(String),
}

/// One page of a source document.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// Page number (1-indexed); `None` for single-image sources.
    pub index: Option<u32>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Page pixels.
    pub raster: PageRaster,
}

impl RasterPage {
    /// Single page from decoded pixels.
    pub fn from_luma(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            index: None,
            width,
            height,
            raster: PageRaster::Luma(image),
        }
    }

    /// Single page from an encoded image.
    pub fn from_image_bytes(data: &[u8], format: ImageFormat) -> Result<Self, image::ImageError> {
        let image = image::load_from_memory_with_format(data, format)?;
        Ok(Self::from_luma(image.to_luma8()))
    }

    /// Numbered page with nothing that can be read.
    pub fn unreadable(index: u32, reason: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            width: 0,
            height: 0,
            raster: PageRaster::Unreadable(reason.into()),
        }
    }

    /// Assign the page number.
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Decode the page into grayscale pixels.
    pub fn luma(&self) -> Result<Cow<'_, GrayImage>, ScanFailure> {
        let image = match &self.raster {
            PageRaster::Unreadable(reason) => {
                return Err(ScanFailure::Unreadable(reason.clone()));
            }
            _ if self.width == 0 || self.height == 0 => return Err(ScanFailure::Empty),
            PageRaster::Luma(image) => Cow::Borrowed(image),
            PageRaster::Encoded { data, format } => {
                let decoded = image::load_from_memory_with_format(data, *format)
                    .map_err(|e| ScanFailure::Unreadable(e.to_string()))?;
                Cow::Owned(decoded.to_luma8())
            }
            PageRaster::Samples { data, color, bits } => {
                Cow::Owned(decode_samples(data, *color, *bits, self.width, self.height)?)
            }
        };

        if image.dimensions() != (self.width, self.height) {
            return Err(ScanFailure::DimensionMismatch {
                declared: (self.width, self.height),
                actual: image.dimensions(),
            });
        }

        Ok(image)
    }
}

fn decode_samples(
    data: &[u8],
    color: SampleColor,
    bits: u8,
    width: u32,
    height: u32,
) -> Result<GrayImage, ScanFailure> {
    let (w, h) = (width as usize, height as usize);

    match (color, bits) {
        (SampleColor::Gray, 1) => {
            let stride = w.div_ceil(8);
            check_length(data, stride * h)?;
            Ok(GrayImage::from_fn(width, height, |x, y| {
                let byte = data[y as usize * stride + x as usize / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                Luma([if bit == 1 { 255 } else { 0 }])
            }))
        }
        (SampleColor::Gray, 8) => {
            check_length(data, w * h)?;
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data[..w * h].to_vec())
                .ok_or_else(|| ScanFailure::Unreadable("invalid gray samples".to_string()))
        }
        (SampleColor::Rgb, 8) => {
            check_length(data, w * h * 3)?;
            let rgb = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data[..w * h * 3].to_vec())
                .ok_or_else(|| ScanFailure::Unreadable("invalid RGB samples".to_string()))?;
            Ok(DynamicImage::ImageRgb8(rgb).to_luma8())
        }
        (SampleColor::Cmyk, 8) => {
            check_length(data, w * h * 4)?;
            let pixels = data[..w * h * 4]
                .chunks_exact(4)
                .map(|cmyk| {
                    let ink = 0.3 * cmyk[0] as f32
                        + 0.59 * cmyk[1] as f32
                        + 0.11 * cmyk[2] as f32
                        + cmyk[3] as f32;
                    255 - ink.min(255.0) as u8
                })
                .collect();
            ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels)
                .ok_or_else(|| ScanFailure::Unreadable("invalid CMYK samples".to_string()))
        }
        _ => Err(ScanFailure::Unreadable(format!(
            "unsupported sample layout: {} component(s) at {} bits",
            color.components(),
            bits
        ))),
    }
}

fn check_length(data: &[u8], expected: usize) -> Result<(), ScanFailure> {
    if data.len() < expected {
        return Err(ScanFailure::Unreadable(format!(
            "expected {} bytes of samples, found {}",
            expected,
            data.len()
        )));
    }
    Ok(())
}

/// Normalizes inputs into raster pages.
#[derive(Debug, Clone, Default)]
pub struct RasterSource {
    max_pages: usize,
    pdf: PdfConfig,
}

impl RasterSource {
    /// Create an adapter with no page limit and the default PDF backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of PDF pages returned (0 = unlimited).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set how PDF pages are rasterized.
    pub fn with_pdf(mut self, pdf: PdfConfig) -> Self {
        self.pdf = pdf;
        self
    }

    /// Turn uploaded bytes into pages.
    ///
    /// Images produce exactly one page without an index; PDFs produce one page per
    /// PDF page, numbered from 1 in document order.
    pub fn to_pages(
        &self,
        declared: Option<&str>,
        bytes: &[u8],
    ) -> Result<Vec<RasterPage>, SourceError> {
        let media_type = MediaType::resolve(declared, bytes)?;
        debug!("Rasterizing {} bytes as {}", bytes.len(), media_type);

        match media_type.image_format() {
            Some(format) => Ok(vec![RasterPage::from_image_bytes(bytes, format)?]),
            None => self.pdf_pages(bytes),
        }
    }

    /// Turn a rendered label into its single page.
    pub fn from_rendered(&self, label: &RenderedLabel) -> Result<RasterPage, image::ImageError> {
        RasterPage::from_image_bytes(&label.bytes, ImageFormat::Png)
    }

    fn pdf_pages(&self, bytes: &[u8]) -> Result<Vec<RasterPage>, SourceError> {
        let pages = match self.pdf.backend {
            PdfBackend::Embedded => self.rasterize_with(&EmbeddedImageRasterizer::new(), bytes),
            PdfBackend::Pdfium => self.rendered_pages(bytes),
            PdfBackend::Auto => match self.rendered_pages(bytes) {
                Err(PdfError::Backend(reason)) => {
                    warn!("{}; falling back to embedded page images", reason);
                    self.rasterize_with(&EmbeddedImageRasterizer::new(), bytes)
                }
                other => other,
            },
        }?;
        Ok(pages)
    }

    fn rasterize_with(
        &self,
        processor: &dyn PdfProcessor,
        bytes: &[u8],
    ) -> Result<Vec<RasterPage>, PdfError> {
        debug!("Rasterizing PDF with {}", processor.name());
        processor.rasterize(bytes, self.max_pages)
    }

    #[cfg(feature = "pdfium")]
    fn rendered_pages(&self, bytes: &[u8]) -> Result<Vec<RasterPage>, PdfError> {
        self.rasterize_with(&PdfiumRasterizer::from_config(&self.pdf), bytes)
    }

    #[cfg(not(feature = "pdfium"))]
    fn rendered_pages(&self, _bytes: &[u8]) -> Result<Vec<RasterPage>, PdfError> {
        Err(PdfError::Backend("built without Pdfium support".to_string()))
    }
}
