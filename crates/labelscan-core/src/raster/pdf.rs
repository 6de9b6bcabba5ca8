//! PDF rasterizer seam, plus the fallback that reads embedded page images with lopdf.

use image::ImageFormat;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PageRaster, RasterPage, SampleColor};
use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Form XObjects nested deeper than this are not searched for images.
const MAX_FORM_DEPTH: usize = 4;

/// Turns a PDF document into page rasters.
pub trait PdfProcessor {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Rasterize the first `max_pages` pages (0 = all), numbered from 1 in document order.
    ///
    /// A page that cannot be rendered becomes an unreadable page rather than an error.
    fn rasterize(&self, data: &[u8], max_pages: usize) -> Result<Vec<RasterPage>>;
}

/// Number of pages to rasterize out of `total`.
pub(crate) fn page_limit(total: usize, max_pages: usize) -> usize {
    if max_pages > 0 && total > max_pages {
        warn!("PDF has {} pages, scanning only the first {}", total, max_pages);
        max_pages
    } else {
        total
    }
}

/// An image placed on a PDF page, not yet decoded.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub raster: PageRaster,
}

impl EmbeddedImage {
    fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Fallback rasterizer that uses the largest embedded image of each page as the page raster.
///
/// Vector content is not drawn, and locations are reported in the pixel space
/// of the embedded image. Carrier label PDFs that embed one full-page bitmap
/// per page scan the same as with a full renderer.
pub struct EmbeddedImageRasterizer {
    document: Option<Document>,
}

impl EmbeddedImageRasterizer {
    pub fn new() -> Self {
        Self { document: None }
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    fn collect_images(
        &self,
        doc: &Document,
        resources: &Dictionary,
        depth: usize,
        images: &mut Vec<EmbeddedImage>,
    ) {
        let Ok(xobjects) = resources.get(b"XObject") else {
            return;
        };
        let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) else {
            return;
        };

        for (name, obj_ref) in xobj_dict.iter() {
            let Ok((_, Object::Stream(stream))) = doc.dereference(obj_ref) else {
                continue;
            };

            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => {
                    if let Some(image) = self.image_from_stream(doc, stream) {
                        trace!(
                            "XObject {}: {}x{} image",
                            String::from_utf8_lossy(name),
                            image.width,
                            image.height
                        );
                        images.push(image);
                    }
                }
                Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                    if let Ok((_, Object::Dictionary(form_resources))) = stream
                        .dict
                        .get(b"Resources")
                        .and_then(|r| doc.dereference(r))
                    {
                        self.collect_images(doc, form_resources, depth + 1, images);
                    }
                }
                _ => {}
            }
        }
    }

    fn image_from_stream(&self, doc: &Document, stream: &lopdf::Stream) -> Option<EmbeddedImage> {
        let dict = &stream.dict;
        let width = dict.get(b"Width").and_then(Object::as_i64).ok()?;
        let height = dict.get(b"Height").and_then(Object::as_i64).ok()?;
        let (width, height) = (u32::try_from(width).ok()?, u32::try_from(height).ok()?);

        let raster = match self.image_filter(dict) {
            Some(b"DCTDecode") => PageRaster::Encoded {
                data: stream.content.clone(),
                format: ImageFormat::Jpeg,
            },
            Some(filter @ (b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode")) => {
                PageRaster::Unreadable(format!(
                    "unsupported image filter {}",
                    String::from_utf8_lossy(filter)
                ))
            }
            Some(_) => match stream.decompressed_content() {
                Ok(data) => self.raw_samples(doc, dict, data),
                Err(e) => PageRaster::Unreadable(format!("failed to decompress image: {}", e)),
            },
            None => self.raw_samples(doc, dict, stream.content.clone()),
        };

        Some(EmbeddedImage {
            width,
            height,
            raster,
        })
    }

    /// Last filter of the stream's filter chain, which determines the sample encoding.
    fn image_filter<'a>(&self, dict: &'a Dictionary) -> Option<&'a [u8]> {
        match dict.get(b"Filter").ok()? {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
            _ => None,
        }
    }

    fn raw_samples(&self, doc: &Document, dict: &Dictionary, data: Vec<u8>) -> PageRaster {
        let is_mask = dict
            .get(b"ImageMask")
            .and_then(Object::as_bool)
            .unwrap_or(false);

        let bits = if is_mask {
            1
        } else {
            dict.get(b"BitsPerComponent")
                .and_then(Object::as_i64)
                .unwrap_or(8) as u8
        };

        let color = if is_mask {
            Some(SampleColor::Gray)
        } else {
            dict.get(b"ColorSpace")
                .ok()
                .and_then(|cs| self.color_space(doc, cs))
        };

        match color {
            Some(color) => PageRaster::Samples { data, color, bits },
            None => PageRaster::Unreadable("unsupported image color space".to_string()),
        }
    }

    fn color_space(&self, doc: &Document, object: &Object) -> Option<SampleColor> {
        let (_, object) = doc.dereference(object).ok()?;
        match object {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Some(SampleColor::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(SampleColor::Rgb),
                b"DeviceCMYK" | b"CMYK" => Some(SampleColor::Cmyk),
                _ => None,
            },
            Object::Array(arr) => match arr.first()?.as_name().ok()? {
                b"ICCBased" => {
                    let (_, profile) = doc.dereference(arr.get(1)?).ok()?;
                    let components = profile.as_stream().ok()?.dict.get(b"N").ok()?.as_i64().ok()?;
                    match components {
                        1 => Some(SampleColor::Gray),
                        3 => Some(SampleColor::Rgb),
                        4 => Some(SampleColor::Cmyk),
                        _ => None,
                    }
                }
                _ => self.color_space(doc, arr.first()?),
            },
            _ => None,
        }
    }

    /// Get resources dictionary for a page, handling inheritance.
    fn get_page_resources<'a>(&self, doc: &'a Document, node_id: ObjectId) -> Option<&'a Dictionary> {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict);
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.get_page_resources(doc, *parent_id),
            _ => None,
        }
    }
}

impl Default for EmbeddedImageRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedImageRasterizer {
    /// Load a PDF from bytes.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    /// Get the number of pages in the PDF.
    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    /// Produce the raster of a page (1-indexed).
    pub fn render_page(&self, page: u32) -> Result<RasterPage> {
        let images = self.extract_images(page)?;

        let raster_page = match images.into_iter().max_by_key(EmbeddedImage::area) {
            Some(image) => RasterPage {
                index: Some(page),
                width: image.width,
                height: image.height,
                raster: image.raster,
            },
            None => {
                debug!("Page {} has no embedded image", page);
                RasterPage::unreadable(page, "page has no embedded image")
            }
        };
        Ok(raster_page)
    }

    /// Collect the image rasters placed on a page.
    pub fn extract_images(&self, page: u32) -> Result<Vec<EmbeddedImage>> {
        let doc = self.document()?;

        let pages = doc.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut images = Vec::new();
        if let Some(resources) = self.get_page_resources(doc, *page_id) {
            self.collect_images(doc, resources, 0, &mut images);
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }
}

impl PdfProcessor for EmbeddedImageRasterizer {
    fn name(&self) -> &'static str {
        "embedded-images"
    }

    fn rasterize(&self, data: &[u8], max_pages: usize) -> Result<Vec<RasterPage>> {
        let mut rasterizer = EmbeddedImageRasterizer::new();
        rasterizer.load(data)?;

        let count = page_limit(rasterizer.page_count() as usize, max_pages) as u32;
        (1..=count).map(|page| rasterizer.render_page(page)).collect()
    }
}
