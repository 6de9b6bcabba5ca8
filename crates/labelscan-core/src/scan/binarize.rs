//! Page binarization.

use image::GrayImage;
use tracing::trace;

use crate::models::config::{BinarizerKind, ScannerConfig};

/// One page as grayscale pixels plus a black-and-white view of them.
#[derive(Debug, Clone)]
pub struct PageImage {
    gray: GrayImage,
    dark: Vec<bool>,
}

impl PageImage {
    fn new(gray: GrayImage, dark: Vec<bool>) -> Self {
        Self { gray, dark }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    /// The grayscale pixels the view was built from.
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        self.dark[(y * self.width() + x) as usize]
    }

    /// Whether any pixel of row `y` between `x0` and `x1` (inclusive) is dark.
    pub fn row_has_ink(&self, y: u32, x0: u32, x1: u32) -> bool {
        let start = (y * self.width()) as usize;
        self.dark[start + x0 as usize..=start + x1 as usize].contains(&true)
    }

    /// Whether any pixel of column `x` between `y0` and `y1` (inclusive) is dark.
    pub fn column_has_ink(&self, x: u32, y0: u32, y1: u32) -> bool {
        (y0..=y1).any(|y| self.is_dark(x, y))
    }
}

/// Turns grayscale pages into black and white.
#[derive(Debug, Clone, Copy)]
pub struct Binarizer {
    kind: BinarizerKind,
    block_size: u32,
    offset: i32,
}

impl Binarizer {
    pub fn new(kind: BinarizerKind) -> Self {
        Self {
            kind,
            block_size: 31,
            offset: 10,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            kind: config.binarizer,
            block_size: config.adaptive_block_size.max(3),
            offset: config.adaptive_offset,
        }
    }

    pub fn binarize(&self, image: &GrayImage) -> PageImage {
        match self.kind {
            BinarizerKind::Global => self.global_threshold(image),
            BinarizerKind::Adaptive => self.adaptive_threshold(image),
        }
    }

    fn global_threshold(&self, image: &GrayImage) -> PageImage {
        let dark = match otsu_threshold(image) {
            Some(threshold) => {
                trace!("Otsu threshold: {}", threshold);
                image.pixels().map(|p| p[0] <= threshold).collect()
            }
            // Uniform page
            None => vec![false; image.len()],
        };
        PageImage::new(image.clone(), dark)
    }

    /// Local mean threshold over a `block_size` window, using an integral image.
    fn adaptive_threshold(&self, image: &GrayImage) -> PageImage {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);

        // integral[(y + 1) * (w + 1) + (x + 1)] = sum of pixels above and left of (x, y) inclusive
        let mut integral = vec![0u64; (w + 1) * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
                integral[(y + 1) * (w + 1) + x + 1] = integral[y * (w + 1) + x + 1] + row_sum;
            }
        }

        let half_block = (self.block_size / 2) as usize;
        let mut dark = Vec::with_capacity(w * h);
        for y in 0..h {
            let y0 = y.saturating_sub(half_block);
            let y1 = (y + half_block + 1).min(h);
            for x in 0..w {
                let x0 = x.saturating_sub(half_block);
                let x1 = (x + half_block + 1).min(w);

                let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                    - integral[y0 * (w + 1) + x1]
                    - integral[y1 * (w + 1) + x0];
                let count = ((y1 - y0) * (x1 - x0)) as u64;

                let mean = (sum / count) as i32;
                let pixel_value = image.get_pixel(x as u32, y as u32)[0] as i32;
                dark.push(pixel_value < mean - self.offset);
            }
        }

        PageImage::new(image.clone(), dark)
    }
}

/// Otsu's threshold: pixels `<=` the returned value are dark.
///
/// Returns `None` for images with a single gray level.
pub fn otsu_threshold(image: &GrayImage) -> Option<u8> {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut best: Option<(u8, f64)> = None;
    let mut weight_dark = 0u64;
    let mut sum_dark = 0f64;

    for threshold in 0..255usize {
        weight_dark += histogram[threshold];
        sum_dark += threshold as f64 * histogram[threshold] as f64;

        let weight_light = total - weight_dark;
        if weight_dark == 0 || weight_light == 0 {
            continue;
        }

        let mean_dark = sum_dark / weight_dark as f64;
        let mean_light = (total_sum - sum_dark) / weight_light as f64;
        let between = weight_dark as f64 * weight_light as f64 * (mean_dark - mean_light).powi(2);

        if best.is_none_or(|(_, variance)| between > variance) {
            best = Some((threshold as u8, between));
        }
    }

    best.map(|(threshold, _)| threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_otsu_threshold() {
        let mut image = GrayImage::from_pixel(10, 10, Luma([220]));
        for x in 0..5 {
            for y in 0..10 {
                image.put_pixel(x, y, Luma([30]));
            }
        }
        let threshold = otsu_threshold(&image).unwrap();
        assert!((30..220).contains(&threshold));

        assert_eq!(otsu_threshold(&GrayImage::from_pixel(4, 4, Luma([255]))), None);
    }

    #[test]
    fn test_ink_along_rows_and_columns() {
        let mut image = GrayImage::from_pixel(6, 3, Luma([255]));
        image.put_pixel(1, 0, Luma([0]));
        image.put_pixel(2, 0, Luma([0]));
        image.put_pixel(1, 1, Luma([0]));

        let page = Binarizer::new(BinarizerKind::Global).binarize(&image);
        assert!(page.row_has_ink(0, 0, 5));
        assert!(!page.row_has_ink(0, 3, 5));
        assert!(!page.row_has_ink(2, 0, 5));
        assert!(page.column_has_ink(1, 1, 2));
        assert!(!page.column_has_ink(2, 1, 2));
        assert_eq!(page.gray().get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_blank_page_has_no_dark_pixels() {
        let image = GrayImage::from_pixel(20, 20, Luma([255]));
        for kind in [BinarizerKind::Global, BinarizerKind::Adaptive] {
            let page = Binarizer::new(kind).binarize(&image);
            assert!(!(0..20).any(|y| page.row_has_ink(y, 0, 19)));
        }
    }

    #[test]
    fn test_adaptive_threshold_handles_uneven_lighting() {
        // Left half lit at 240 with a bar at 150, right half shaded at 120 with a bar at 30.
        let image = GrayImage::from_fn(80, 10, |x, _| {
            let base = if x < 40 { 240 } else { 120 };
            if x == 15 || x == 60 { Luma([base - 90]) } else { Luma([base]) }
        });

        let page = Binarizer::new(BinarizerKind::Adaptive).binarize(&image);
        assert!(page.is_dark(15, 5));
        assert!(page.is_dark(60, 5));
        assert!(!page.is_dark(5, 5));
        assert!(!page.is_dark(70, 5));
    }
}
