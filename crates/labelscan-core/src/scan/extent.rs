//! Bounding boxes of decoded symbols, measured on the binarized page.
//!
//! Decoders report a few reference points (finder centres, guard pattern
//! midpoints, a single scan row for linear codes). The box is snapped to the
//! ink those points belong to: light edge lines are trimmed, then each side
//! grows while the next line outward still carries ink.

use crate::models::barcode::BoundingBox;

use super::binarize::PageImage;

/// Linear codes tolerate light gaps up to this fraction of their length while growing along the bars.
const LINEAR_GAP_DIVISOR: u32 = 12;

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

/// Minimal box around the symbol the points belong to.
///
/// Returns `None` for an empty point list or when no ink is found near the points.
pub fn symbol_extent(page: &PageImage, points: &[(f32, f32)], linear: bool) -> Option<BoundingBox> {
    if points.is_empty() || page.width() == 0 || page.height() == 0 {
        return None;
    }

    let clamp = |v: f32, max: u32| v.round().clamp(0.0, (max - 1) as f32) as u32;
    let xs = points.iter().map(|&(x, _)| clamp(x, page.width()));
    let ys = points.iter().map(|&(_, y)| clamp(y, page.height()));
    let mut span = Span {
        x0: xs.clone().min()?,
        x1: xs.max()?,
        y0: ys.clone().min()?,
        y1: ys.max()?,
    };

    let (gap_x, gap_y) = if linear {
        let (dx, dy) = (span.x1 - span.x0, span.y1 - span.y0);
        if dx >= dy {
            ((dx / LINEAR_GAP_DIVISOR).max(2), 1)
        } else {
            (1, (dy / LINEAR_GAP_DIVISOR).max(2))
        }
    } else {
        (1, 1)
    };

    trim(page, &mut span)?;
    grow(page, &mut span, gap_x, gap_y);

    Some(BoundingBox::from_corners(span.x0, span.y0, span.x1 + 1, span.y1 + 1))
}

/// Drop light lines from the edges; `None` when nothing dark is left.
fn trim(page: &PageImage, span: &mut Span) -> Option<()> {
    while !page.column_has_ink(span.x0, span.y0, span.y1) {
        if span.x0 == span.x1 {
            return None;
        }
        span.x0 += 1;
    }
    while !page.column_has_ink(span.x1, span.y0, span.y1) {
        span.x1 -= 1;
    }
    while !page.row_has_ink(span.y0, span.x0, span.x1) {
        span.y0 += 1;
    }
    while !page.row_has_ink(span.y1, span.x0, span.x1) {
        span.y1 -= 1;
    }
    Some(())
}

fn grow(page: &PageImage, span: &mut Span, gap_x: u32, gap_y: u32) {
    let (max_x, max_y) = (page.width() - 1, page.height() - 1);

    loop {
        let mut changed = false;

        if let Some(k) = (1..=gap_x.min(span.x0)).find(|&k| page.column_has_ink(span.x0 - k, span.y0, span.y1)) {
            span.x0 -= k;
            changed = true;
        }
        if let Some(k) =
            (1..=gap_x.min(max_x - span.x1)).find(|&k| page.column_has_ink(span.x1 + k, span.y0, span.y1))
        {
            span.x1 += k;
            changed = true;
        }
        if let Some(k) = (1..=gap_y.min(span.y0)).find(|&k| page.row_has_ink(span.y0 - k, span.x0, span.x1)) {
            span.y0 -= k;
            changed = true;
        }
        if let Some(k) =
            (1..=gap_y.min(max_y - span.y1)).find(|&k| page.row_has_ink(span.y1 + k, span.x0, span.x1))
        {
            span.y1 += k;
            changed = true;
        }

        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::BinarizerKind;
    use crate::scan::binarize::Binarizer;
    use image::{GrayImage, Luma};
    use pretty_assertions::assert_eq;

    fn page_with(rects: &[(u32, u32, u32, u32)]) -> PageImage {
        let mut image = GrayImage::from_pixel(120, 80, Luma([255]));
        for &(x, y, w, h) in rects {
            for px in x..x + w {
                for py in y..y + h {
                    image.put_pixel(px, py, Luma([0]));
                }
            }
        }
        Binarizer::new(BinarizerKind::Global).binarize(&image)
    }

    #[test]
    fn test_linear_row_grows_to_bar_edges() {
        // Bars at x = 20..22, 25..26, 30..34, 40..42, 20 rows tall, separated by narrow spaces.
        let page = page_with(&[(20, 10, 2, 20), (25, 10, 1, 20), (30, 10, 4, 20), (40, 10, 2, 20)]);

        // Reference points at the middle of the first and last bar, on one row.
        let extent = symbol_extent(&page, &[(21.0, 18.0), (41.0, 18.0)], true);
        assert_eq!(extent, Some(BoundingBox::new(20, 10, 22, 20)));
    }

    #[test]
    fn test_matrix_points_inside_symbol_reach_its_border() {
        let page = page_with(&[(30, 20, 24, 24), (90, 5, 5, 5)]);
        let extent = symbol_extent(&page, &[(35.0, 25.0), (48.0, 25.0), (35.0, 38.0)], false);
        assert_eq!(extent, Some(BoundingBox::new(30, 20, 24, 24)));
    }

    #[test]
    fn test_overshooting_points_are_trimmed() {
        let page = page_with(&[(30, 20, 10, 10)]);
        let extent = symbol_extent(&page, &[(25.0, -3.0), (45.0, 90.0)], false);
        assert_eq!(extent, Some(BoundingBox::new(30, 20, 10, 10)));
    }

    #[test]
    fn test_no_ink_near_points() {
        let page = page_with(&[(100, 60, 5, 5)]);
        assert_eq!(symbol_extent(&page, &[(10.0, 10.0), (20.0, 20.0)], false), None);
        assert_eq!(symbol_extent(&page, &[], false), None);
    }
}
