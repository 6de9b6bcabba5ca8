//! Test fixtures: synthetic barcode images and in-memory PDFs.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use lopdf::{Document, Object, Stream, dictionary};
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

use crate::models::barcode::BoundingBox;

/// Dark modules of a symbol, light margins removed. Linear symbols have a single row.
pub fn symbol_modules(format: BarcodeFormat, contents: &str) -> Vec<Vec<bool>> {
    let matrix = MultiFormatWriter::default().encode(contents, &format, 0, 0).unwrap();
    let (width, height) = (matrix.getWidth(), matrix.getHeight());

    let dark: Vec<(u32, u32)> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .filter(|&(x, y)| matrix.get(x, y))
        .collect();
    let x0 = dark.iter().map(|p| p.0).min().unwrap();
    let x1 = dark.iter().map(|p| p.0).max().unwrap();
    let y0 = dark.iter().map(|p| p.1).min().unwrap();
    let y1 = dark.iter().map(|p| p.1).max().unwrap();

    let mut rows: Vec<Vec<bool>> = (y0..=y1)
        .map(|y| (x0..=x1).map(|x| matrix.get(x, y)).collect())
        .collect();
    // 1D writers repeat the bar row for the requested height.
    if !format_is_matrix(format) {
        rows.truncate(1);
    }
    rows
}

fn format_is_matrix(format: BarcodeFormat) -> bool {
    matches!(
        format,
        BarcodeFormat::QR_CODE | BarcodeFormat::DATA_MATRIX | BarcodeFormat::PDF_417 | BarcodeFormat::AZTEC
    )
}

/// Dark rectangles `(x, y, width, height)` of a symbol placed at `(x, y)`.
///
/// Modules are `module` units wide; linear bars are `bar_height` tall, matrix rows `module` tall.
pub fn symbol_rects(
    format: BarcodeFormat,
    contents: &str,
    x: u32,
    y: u32,
    module: u32,
    bar_height: u32,
) -> Vec<(u32, u32, u32, u32)> {
    let rows = symbol_modules(format, contents);
    let row_height = if rows.len() == 1 { bar_height } else { module };

    let mut rects = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        let mut c = 0;
        while c < row.len() {
            if !row[c] {
                c += 1;
                continue;
            }
            let start = c;
            while c < row.len() && row[c] {
                c += 1;
            }
            rects.push((
                x + start as u32 * module,
                y + r as u32 * row_height,
                (c - start) as u32 * module,
                row_height,
            ));
        }
    }
    rects
}

/// Union of rectangles as a bounding box.
pub fn rects_bounds(rects: &[(u32, u32, u32, u32)]) -> BoundingBox {
    let x0 = rects.iter().map(|r| r.0).min().unwrap();
    let y0 = rects.iter().map(|r| r.1).min().unwrap();
    let x1 = rects.iter().map(|r| r.0 + r.2).max().unwrap();
    let y1 = rects.iter().map(|r| r.1 + r.3).max().unwrap();
    BoundingBox::from_corners(x0, y0, x1, y1)
}

/// White drawing surface for barcodes.
pub struct Canvas {
    image: GrayImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([255])),
        }
    }

    /// Draw a symbol with its top-left bar at `(x, y)` and return the box of its ink.
    pub fn draw(
        &mut self,
        format: BarcodeFormat,
        contents: &str,
        x: u32,
        y: u32,
        module: u32,
        bar_height: u32,
    ) -> BoundingBox {
        let rects = symbol_rects(format, contents, x, y, module, bar_height);
        for &(rx, ry, rw, rh) in &rects {
            for px in rx..rx + rw {
                for py in ry..ry + rh {
                    self.image.put_pixel(px, py, Luma([0]));
                }
            }
        }
        rects_bounds(&rects)
    }

    pub fn image(&self) -> GrayImage {
        self.image.clone()
    }

    pub fn png(&self) -> Vec<u8> {
        encode_png(&self.image)
    }
}

pub fn encode_png(image: &GrayImage) -> Vec<u8> {
    let mut data = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .unwrap();
    data
}

/// Image XObject content of one test page.
pub enum TestPageImage {
    /// 8-bit DeviceGray samples, uncompressed.
    Gray(GrayImage),
    /// DCT stream with the given bytes.
    Jpeg { width: u32, height: u32, data: Vec<u8> },
    /// Page without any image.
    Blank,
    /// Filled rectangles `(x, y, width, height)` in points from the top-left corner; no images.
    Vector(Vec<(u32, u32, u32, u32)>),
}

/// Page size in points.
pub const PAGE_WIDTH: u32 = 288;
pub const PAGE_HEIGHT: u32 = 432;

fn image_stream(width: u32, height: u32, data: Vec<u8>, filter: Option<&str>) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => 8_i64,
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    Stream::new(dict, data)
}

/// Build a PDF with one page per entry.
pub fn build_pdf(pages: Vec<TestPageImage>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for page in pages {
        let draw_image = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", PAGE_WIDTH, PAGE_HEIGHT).into_bytes();
        let (stream, content) = match page {
            TestPageImage::Gray(image) => {
                let (w, h) = image.dimensions();
                (Some(image_stream(w, h, image.into_raw(), None)), draw_image)
            }
            TestPageImage::Jpeg {
                width,
                height,
                data,
            } => (Some(image_stream(width, height, data, Some("DCTDecode"))), draw_image),
            TestPageImage::Blank => (None, Vec::new()),
            TestPageImage::Vector(rects) => {
                let mut ops = String::from("0 g\n");
                for (x, y, w, h) in rects {
                    ops.push_str(&format!("{} {} {} {} re f\n", x, PAGE_HEIGHT - y - h, w, h));
                }
                (None, ops.into_bytes())
            }
        };
        let resources = match stream {
            Some(stream) => {
                let image_id = doc.add_object(stream);
                dictionary! { "XObject" => dictionary! { "Im0" => image_id } }
            }
            None => dictionary! {},
        };

        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH as i64),
                Object::Integer(PAGE_HEIGHT as i64),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut data = Vec::new();
    doc.save_to(&mut data).unwrap();
    data
}
