//! Rasterizer: paints the main content region of a render tree into a single
//! RGB bitmap at `scale` device pixels per logical pixel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgb, RgbImage, RgbaImage};
use thiserror::Error;
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, Mask, Paint as SkiaPaint, PathBuilder, Pixmap, PixmapPaint,
    Rect, Transform,
};
use tracing::{debug, info};

use super::document::ImageShape;
use super::glyphs::{GlyphBitmap, GlyphSource};
use super::host::RenderTree;
use super::layout::{layout, DisplayList, Paint};

/// Upper bound on bitmap area; roughly 35 A4 pages at 3x.
const MAX_CANVAS_PIXELS: u64 = 600_000_000;

#[derive(Debug, Clone)]
pub struct RasterOptions {
    pub scale: f32,
    pub background: Rgb<u8>,
    /// Draw remote images. When off, image boxes are left empty.
    pub use_remote_images: bool,
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("render tree has no main content region")]
    MissingRoot,

    #[error("bitmap of {width}x{height} exceeds the canvas limit")]
    TooLarge { width: u32, height: u32 },

    #[error("failed to allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },

    #[error("raster task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, tree: &RenderTree, options: &RasterOptions) -> Result<RgbImage, RasterError>;
}

/// CPU rasterizer: tiny-skia for boxes and images, a `GlyphSource` for text coverage.
pub struct SoftwareRasterizer {
    glyphs: Arc<dyn GlyphSource>,
}

impl SoftwareRasterizer {
    pub fn new(glyphs: Arc<dyn GlyphSource>) -> Self {
        Self { glyphs }
    }
}

#[async_trait]
impl Rasterizer for SoftwareRasterizer {
    async fn rasterize(&self, tree: &RenderTree, options: &RasterOptions) -> Result<RgbImage, RasterError> {
        let document = tree.main.clone().ok_or(RasterError::MissingRoot)?;
        let glyphs = Arc::clone(&self.glyphs);
        let images = tree.images.clone();
        let width = tree.width;
        let options = options.clone();

        let started = std::time::Instant::now();
        let bitmap = tokio::task::spawn_blocking(move || {
            let list = layout(&document, width, glyphs.as_ref());
            paint(&list, &images, glyphs.as_ref(), &options)
        })
        .await
        .map_err(|e| RasterError::Task(e.to_string()))??;

        info!(
            width = bitmap.width(),
            height = bitmap.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rasterized print surface"
        );
        Ok(bitmap)
    }
}

fn paint(
    list: &DisplayList,
    images: &HashMap<String, Arc<RgbaImage>>,
    glyphs: &dyn GlyphSource,
    options: &RasterOptions,
) -> Result<RgbImage, RasterError> {
    let s = options.scale;
    let width = (list.width * s).ceil().max(1.0) as u32;
    let height = (list.height * s).ceil().max(1.0) as u32;
    if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
        return Err(RasterError::TooLarge { width, height });
    }

    let mut canvas = Pixmap::new(width, height).ok_or(RasterError::Surface { width, height })?;
    canvas.fill(opaque(options.background));

    // Display list coordinates are logical; everything but glyphs goes through this.
    let transform = Transform::from_scale(s, s);
    let hairline = 1.0_f32.max(1.0 / s);

    let mut skipped_images = 0usize;
    for item in &list.items {
        match item {
            Paint::Rect { x, y, w, h, color } => {
                fill_rect(&mut canvas, Rect::from_xywh(*x, *y, *w, *h), *color, transform);
            }
            Paint::Border { x, y, w, h, color } => {
                let t = hairline;
                for edge in [
                    Rect::from_xywh(*x, *y, *w, t),
                    Rect::from_xywh(*x, y + h - t, *w, t),
                    Rect::from_xywh(*x, *y, t, *h),
                    Rect::from_xywh(x + w - t, *y, t, *h),
                ] {
                    fill_rect(&mut canvas, edge, *color, transform);
                }
            }
            Paint::TextLine {
                x,
                baseline,
                size,
                color,
                text,
            } => draw_text(&mut canvas, glyphs, text, x * s, baseline * s, size * s, *color),
            Paint::Image {
                src,
                x,
                y,
                w,
                h,
                shape,
            } => match images.get(src).filter(|_| options.use_remote_images) {
                Some(image) => draw_image(&mut canvas, image, (*x, *y, *w, *h), *shape, s),
                None => skipped_images += 1,
            },
        }
    }
    if skipped_images > 0 {
        debug!(skipped_images, "Painted without some images");
    }
    into_rgb(&canvas)
}

fn opaque(color: Rgb<u8>) -> Color {
    Color::from_rgba8(color.0[0], color.0[1], color.0[2], 255)
}

fn fill_rect(canvas: &mut Pixmap, rect: Option<Rect>, color: Rgb<u8>, transform: Transform) {
    // Zero-area boxes have no Rect.
    let Some(rect) = rect else { return };
    let mut paint = SkiaPaint::default();
    paint.set_color(opaque(color));
    // Box edges snap to device pixels.
    paint.anti_alias = false;
    canvas.fill_rect(rect, &paint, transform, None);
}

/// Glyph coverage comes from the `GlyphSource` at device size, so text is placed in
/// device pixels with an identity transform.
fn draw_text(
    canvas: &mut Pixmap,
    glyphs: &dyn GlyphSource,
    text: &str,
    x: f32,
    baseline: f32,
    size: f32,
    color: Rgb<u8>,
) {
    let baseline = baseline.round() as i32;
    let mut pen = x;
    for c in text.chars() {
        let glyph = glyphs.rasterize(c, size);
        if let Some(ink) = glyph_pixmap(&glyph, color) {
            let left = pen.round() as i32 + glyph.xmin;
            // fontdue's ymin is the bitmap bottom relative to the baseline, up positive.
            let top = baseline - glyph.ymin - glyph.height as i32;
            canvas.draw_pixmap(left, top, ink.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
        pen += glyphs.advance(c, size);
    }
}

fn glyph_pixmap(glyph: &GlyphBitmap, color: Rgb<u8>) -> Option<Pixmap> {
    let mut ink = Pixmap::new(glyph.width as u32, glyph.height as u32)?;
    let [r, g, b] = color.0;
    for (pixel, &coverage) in ink.pixels_mut().iter_mut().zip(&glyph.coverage) {
        *pixel = ColorU8::from_rgba(r, g, b, coverage).premultiply();
    }
    Some(ink)
}

fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Draws `image` into the logical box `(x, y, w, h)` with object-fit: cover, optionally
/// clipped to the inscribed circle. The photo is composed on a box-sized tile so the
/// clip mask never covers the whole canvas.
fn draw_image(
    canvas: &mut Pixmap,
    image: &RgbaImage,
    (x, y, w, h): (f32, f32, f32, f32),
    shape: ImageShape,
    s: f32,
) {
    let (iw, ih) = (image.width() as f32, image.height() as f32);
    if iw == 0.0 || ih == 0.0 || w <= 0.0 || h <= 0.0 {
        return;
    }
    let Some(mut tile) = Pixmap::new((w * s).round() as u32, (h * s).round() as u32) else {
        return;
    };
    let Some(source) = to_pixmap(image) else { return };

    let fit = (w / iw).max(h / ih);
    let transform = Transform::from_scale(fit, fit)
        .post_translate((w - iw * fit) / 2.0, (h - ih * fit) / 2.0)
        .post_scale(s, s);

    let clip = match shape {
        ImageShape::Rect => None,
        ImageShape::Circle => circle_mask(&tile, w, h, s),
    };
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    tile.draw_pixmap(0, 0, source.as_ref(), &paint, transform, clip.as_ref());

    canvas.draw_pixmap(
        (x * s).round() as i32,
        (y * s).round() as i32,
        tile.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

fn circle_mask(tile: &Pixmap, w: f32, h: f32, s: f32) -> Option<Mask> {
    let circle = PathBuilder::from_circle(w / 2.0, h / 2.0, w.min(h) / 2.0)?;
    let mut mask = Mask::new(tile.width(), tile.height())?;
    mask.fill_path(&circle, FillRule::Winding, true, Transform::from_scale(s, s));
    Some(mask)
}

/// Flattens the canvas to RGB. The background is opaque, so every pixel is too.
fn into_rgb(canvas: &Pixmap) -> Result<RgbImage, RasterError> {
    let (width, height) = (canvas.width(), canvas.height());
    let mut raw = Vec::with_capacity(canvas.pixels().len() * 3);
    for pixel in canvas.pixels() {
        let c = pixel.demultiply();
        raw.extend_from_slice(&[c.red(), c.green(), c.blue()]);
    }
    RgbImage::from_raw(width, height, raw).ok_or(RasterError::Surface { width, height })
}
