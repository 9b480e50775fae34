//! Glyph source for text measurement and rasterization.
//!
//! Layout only needs advances and vertical metrics; the painter also needs coverage
//! bitmaps. Both go through `GlyphSource` so layout can be tested without a font file.

use std::path::Path;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GlyphError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font: {0}")]
    Parse(&'static str),
}

/// Vertical metrics at a given pixel size. `descent` is positive (distance below baseline).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    pub ascent: f32,
    pub descent: f32,
}

/// An 8-bit coverage bitmap for one glyph, positioned relative to the pen and baseline
/// the way fontdue reports it: `xmin` from the pen, `ymin` from the baseline (up is positive)
/// to the bitmap's bottom edge.
#[derive(Debug, Clone, Default)]
pub struct GlyphBitmap {
    pub xmin: i32,
    pub ymin: i32,
    pub width: usize,
    pub height: usize,
    pub coverage: Vec<u8>,
}

pub trait GlyphSource: Send + Sync {
    fn advance(&self, ch: char, px: f32) -> f32;

    fn vertical_metrics(&self, px: f32) -> VerticalMetrics;

    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap;

    fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().map(|c| self.advance(c, px)).sum()
    }
}

/// Glyphs from a TrueType/OpenType font parsed with fontdue.
pub struct FontdueGlyphs {
    font: fontdue::Font,
}

impl FontdueGlyphs {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GlyphError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(GlyphError::Parse)?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> Result<Self, GlyphError> {
        let bytes = std::fs::read(path).map_err(|source| GlyphError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let glyphs = Self::from_bytes(&bytes)?;
        info!(
            path = %path.display(),
            glyphs = glyphs.font.glyph_count(),
            "Loaded export font"
        );
        Ok(glyphs)
    }
}

impl GlyphSource for FontdueGlyphs {
    fn advance(&self, ch: char, px: f32) -> f32 {
        self.font.metrics(ch, px).advance_width
    }

    fn vertical_metrics(&self, px: f32) -> VerticalMetrics {
        match self.font.horizontal_line_metrics(px) {
            Some(m) => VerticalMetrics {
                ascent: m.ascent,
                descent: -m.descent,
            },
            None => VerticalMetrics {
                ascent: px * 0.8,
                descent: px * 0.2,
            },
        }
    }

    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap {
        let (metrics, coverage) = self.font.rasterize(ch, px);
        GlyphBitmap {
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            width: metrics.width,
            height: metrics.height,
            coverage,
        }
    }
}

/// Monospaced box glyphs for tests: every non-space character is a solid block
/// half an em wide.
#[cfg(test)]
pub(crate) struct BoxGlyphs;

#[cfg(test)]
impl GlyphSource for BoxGlyphs {
    fn advance(&self, _ch: char, px: f32) -> f32 {
        px * 0.5
    }

    fn vertical_metrics(&self, px: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: px * 0.8,
            descent: px * 0.2,
        }
    }

    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap {
        if ch.is_whitespace() {
            return GlyphBitmap::default();
        }
        let width = (px * 0.4).round().max(1.0) as usize;
        let height = (px * 0.7).round().max(1.0) as usize;
        GlyphBitmap {
            xmin: 0,
            ymin: 0,
            width,
            height,
            coverage: vec![255; width * height],
        }
    }
}
