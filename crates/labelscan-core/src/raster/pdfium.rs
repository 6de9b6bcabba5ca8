//! PDF page rendering with Pdfium.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use image::{GrayImage, Luma};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::RasterPage;
use super::pdf::{PdfProcessor, Result, page_limit};
use crate::error::PdfError;
use crate::models::config::PdfConfig;

/// Pdfium keeps global library state; one document session at a time.
static SESSION: Mutex<()> = Mutex::new(());

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders every PDF page, vector content included, at a fixed resolution.
///
/// Locations found on the result are in the pixel space of the rendered page.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library: Option<PathBuf>,
    dpi: f32,
}

impl PdfiumRasterizer {
    pub fn new(library: Option<PathBuf>, dpi: f32) -> Self {
        Self { library, dpi }
    }

    pub fn from_config(config: &PdfConfig) -> Self {
        Self::new(config.pdfium_library.as_ref().map(PathBuf::from), config.dpi)
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfError::Backend(format!("cannot load Pdfium: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }

    /// Whether the Pdfium library can be loaded.
    pub fn is_available(&self) -> bool {
        let _session = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
        self.bind().is_ok()
    }

    fn render(&self, page: &PdfPage, index: u32, config: &PdfRenderConfig) -> RasterPage {
        let bitmap = match page.render_with_config(config) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!("Page {} could not be rendered: {}", index, e);
                return RasterPage::unreadable(index, format!("page could not be rendered: {}", e));
            }
        };

        match bgra_to_luma(&bitmap.as_raw_bytes(), bitmap.width(), bitmap.height()) {
            Some(image) => RasterPage::from_luma(image).with_index(index),
            None => RasterPage::unreadable(index, "rendered page bitmap is malformed"),
        }
    }
}

/// Convert a packed BGRA bitmap to grayscale.
fn bgra_to_luma(bytes: &[u8], width: i32, height: i32) -> Option<GrayImage> {
    let (width, height) = (u32::try_from(width).ok()?, u32::try_from(height).ok()?);
    let stride = width as usize * 4;
    if stride == 0 || bytes.len() < stride * height as usize {
        return None;
    }

    Some(GrayImage::from_fn(width, height, |x, y| {
        let offset = y as usize * stride + x as usize * 4;
        let (b, g, r) = (bytes[offset] as u32, bytes[offset + 1] as u32, bytes[offset + 2] as u32);
        Luma([((299 * r + 587 * g + 114 * b) / 1000) as u8])
    }))
}

impl PdfProcessor for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn rasterize(&self, data: &[u8], max_pages: usize) -> Result<Vec<RasterPage>> {
        let _session = SESSION.lock().unwrap_or_else(PoisonError::into_inner);
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| PdfError::Parse(e.to_string()))?;
        let pages = document.pages();

        let total = pages.len() as usize;
        if total == 0 {
            return Err(PdfError::NoPages);
        }
        let count = page_limit(total, max_pages);
        debug!("Rendering {} of {} PDF page(s) at {} dpi", count, total, self.dpi);

        let config = PdfRenderConfig::new().scale_page_by_factor(self.dpi / POINTS_PER_INCH);
        Ok(pages
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, page)| self.render(&page, i as u32 + 1, &config))
            .collect())
    }
}
