//! Pagination: slices one tall bitmap into page-height strips, keeping the full
//! width. Slice math is pure; `render_pages` turns slices into JPEG pages.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

/// Physical page size in millimetres, portrait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageFormat {
    pub const A4: PageFormat = PageFormat {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    const POINTS_PER_MM: f64 = 72.0 / 25.4;

    pub fn width_pt(&self) -> f64 {
        self.width_mm * Self::POINTS_PER_MM
    }

    pub fn height_pt(&self) -> f64 {
        self.height_mm * Self::POINTS_PER_MM
    }
}

/// A horizontal strip `[y, y + height)` of the source bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub y: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum PaginateError {
    #[error("cannot paginate an empty {width}x{height} bitmap")]
    EmptyBitmap { width: u32, height: u32 },

    #[error("invalid page format {width_mm}x{height_mm} mm")]
    InvalidPage { width_mm: f64, height_mm: f64 },

    #[error("failed to encode page {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: image::ImageError,
    },
}

/// Height of one page in bitmap pixels when the bitmap width maps to the page width.
pub fn page_height_px(bitmap_width: u32, page: &PageFormat) -> f64 {
    f64::from(bitmap_width) * page.height_mm / page.width_mm
}

/// Height of the whole bitmap in millimetres at page width.
pub fn physical_height_mm(bitmap_width: u32, bitmap_height: u32, page: &PageFormat) -> f64 {
    f64::from(bitmap_height) * page.width_mm / f64::from(bitmap_width)
}

/// Pages needed for the bitmap: `ceil(physical height / page height)`.
pub fn page_count(bitmap_width: u32, bitmap_height: u32, page: &PageFormat) -> usize {
    if bitmap_width == 0 || bitmap_height == 0 {
        return 0;
    }
    let ratio = physical_height_mm(bitmap_width, bitmap_height, page) / page.height_mm;
    // An exact multiple must not spill an empty page from rounding noise.
    (ratio - 1e-9).ceil().max(1.0) as usize
}

/// Contiguous, non-empty slices covering `[0, bitmap_height)` exactly once.
/// Every slice but the last is one page tall; the last takes the remainder.
pub fn plan_slices(
    bitmap_width: u32,
    bitmap_height: u32,
    page: &PageFormat,
) -> Result<Vec<Slice>, PaginateError> {
    if bitmap_width == 0 || bitmap_height == 0 {
        return Err(PaginateError::EmptyBitmap {
            width: bitmap_width,
            height: bitmap_height,
        });
    }
    if !(page.width_mm > 0.0 && page.height_mm > 0.0) {
        return Err(PaginateError::InvalidPage {
            width_mm: page.width_mm,
            height_mm: page.height_mm,
        });
    }

    let page_px = page_height_px(bitmap_width, page);
    let count = page_count(bitmap_width, bitmap_height, page);
    let boundary = |i: usize| ((i as f64 * page_px).floor() as u32).min(bitmap_height);

    Ok((0..count)
        .map(|index| {
            let y = boundary(index);
            let end = if index + 1 == count {
                bitmap_height
            } else {
                boundary(index + 1)
            };
            Slice {
                index,
                y,
                height: end - y,
            }
        })
        .collect())
}

/// One encoded page: a full-page canvas with the slice at the top.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub jpeg: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    /// Rows of the canvas taken from the bitmap; the rest is background.
    pub content_height_px: u32,
}

/// Slices `bitmap` and encodes each page as JPEG at `quality` (1..=100).
pub fn render_pages(
    bitmap: &RgbImage,
    page: &PageFormat,
    background: Rgb<u8>,
    quality: u8,
) -> Result<Vec<PageImage>, PaginateError> {
    let (width, height) = bitmap.dimensions();
    let slices = plan_slices(width, height, page)?;
    let canvas_height = page_height_px(width, page).ceil() as u32;

    slices
        .iter()
        .map(|slice| {
            let mut canvas = RgbImage::from_pixel(width, canvas_height, background);
            let strip = imageops::crop_imm(bitmap, 0, slice.y, width, slice.height).to_image();
            imageops::replace(&mut canvas, &strip, 0, 0);

            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut Cursor::new(&mut jpeg), quality)
                .encode_image(&canvas)
                .map_err(|source| PaginateError::Encode {
                    index: slice.index,
                    source,
                })?;
            debug!(
                page = slice.index + 1,
                y = slice.y,
                rows = slice.height,
                bytes = jpeg.len(),
                "Encoded page"
            );
            Ok(PageImage {
                jpeg,
                width_px: width,
                height_px: canvas_height,
                content_height_px: slice.height,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: u32 = 794 * 3;

    fn assert_covers(slices: &[Slice], height: u32) {
        assert!(!slices.is_empty());
        let mut next = 0;
        for (i, s) in slices.iter().enumerate() {
            assert_eq!(s.index, i);
            assert_eq!(s.y, next, "slice {i} is not contiguous");
            assert!(s.height > 0, "slice {i} is empty");
            next = s.y + s.height;
        }
        assert_eq!(next, height);
    }

    #[test]
    fn test_page_height_for_a4_at_3x() {
        let px = page_height_px(WIDTH, &PageFormat::A4);
        assert!((px - 3368.828).abs() < 1e-3);
    }

    #[test]
    fn test_page_count_boundaries() {
        let a4 = PageFormat::A4;
        assert_eq!(page_count(WIDTH, 1, &a4), 1);
        assert_eq!(page_count(WIDTH, 3368, &a4), 1);
        assert_eq!(page_count(WIDTH, 3369, &a4), 2);
        assert_eq!(page_count(WIDTH, 10_000, &a4), 3);
        assert_eq!(page_count(WIDTH, 0, &a4), 0);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_page() {
        let page = PageFormat {
            width_mm: 100.0,
            height_mm: 200.0,
        };
        // page is exactly 200px at width 100
        assert_eq!(page_count(100, 600, &page), 3);
        assert_covers(&plan_slices(100, 600, &page).unwrap(), 600);
    }

    #[test]
    fn test_slices_partition_the_bitmap() {
        for height in [1, 2000, 3368, 3369, 6737, 6738, 10_000, 33_689] {
            let slices = plan_slices(WIDTH, height, &PageFormat::A4).unwrap();
            assert_eq!(slices.len(), page_count(WIDTH, height, &PageFormat::A4));
            assert_covers(&slices, height);
        }
    }

    #[test]
    fn test_full_slices_are_one_page_tall() {
        let slices = plan_slices(WIDTH, 10_000, &PageFormat::A4).unwrap();
        for s in &slices[..slices.len() - 1] {
            assert!(s.height == 3368 || s.height == 3369);
        }
    }

    #[test]
    fn test_empty_bitmap_is_rejected() {
        assert!(matches!(
            plan_slices(WIDTH, 0, &PageFormat::A4),
            Err(PaginateError::EmptyBitmap { .. })
        ));
    }

    #[test]
    fn test_render_pages_pads_last_page_with_background() {
        // 21px wide -> page is 29.7px tall
        let bitmap = RgbImage::from_pixel(21, 70, Rgb([0, 0, 0]));
        let pages = render_pages(&bitmap, &PageFormat::A4, Rgb([255, 255, 255]), 95).unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.width_px == 21 && p.height_px == 30));
        let rows: u32 = pages.iter().map(|p| p.content_height_px).sum();
        assert_eq!(rows, 70);

        let last = image::load_from_memory(&pages[2].jpeg).unwrap().to_rgb8();
        assert_eq!(last.dimensions(), (21, 30));
        // Content rows are dark, padding rows stay light.
        assert!(last.get_pixel(10, 2).0[0] < 60);
        assert!(last.get_pixel(10, 28).0[0] > 200);
    }
}
