//! Box layout: turns a `PrintDocument` into an absolutely positioned display list
//! at a fixed logical width. Height is whatever the content needs.

use image::Rgb;

use super::document::{Align, Block, ImageShape, Node, PrintDocument, Row, TextStyle, Track};
use super::glyphs::GlyphSource;

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb<u8>,
    },
    /// One-pixel (logical) outline.
    Border {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb<u8>,
    },
    TextLine {
        x: f32,
        baseline: f32,
        size: f32,
        color: Rgb<u8>,
        text: String,
    },
    Image {
        src: String,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        shape: ImageShape,
    },
}

impl Paint {
    fn shift_y(&mut self, dy: f32) {
        match self {
            Paint::Rect { y, .. } | Paint::Border { y, .. } | Paint::Image { y, .. } => *y += dy,
            Paint::TextLine { baseline, .. } => *baseline += dy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplayList {
    pub width: f32,
    pub height: f32,
    pub background: Rgb<u8>,
    pub items: Vec<Paint>,
}

pub fn layout(doc: &PrintDocument, width: f32, glyphs: &dyn GlyphSource) -> DisplayList {
    let mut items = Vec::new();
    let height = place_block(&doc.root, 0.0, 0.0, width, glyphs, &mut items);
    DisplayList {
        width,
        height: height.ceil(),
        background: doc.background,
        items,
    }
}

/// Places `node` with its top-left corner at (x, y) and returns the height it used.
fn place(node: &Node, x: f32, y: f32, w: f32, glyphs: &dyn GlyphSource, out: &mut Vec<Paint>) -> f32 {
    match node {
        Node::Block(block) => place_block(block, x, y, w, glyphs, out),
        Node::Row(row) => place_row(row, x, y, w, glyphs, out),
        Node::Text { content, style } => place_text(content, style, x, y, w, glyphs, out),
        Node::Image {
            src,
            width,
            height,
            shape,
        } => {
            // Shrink proportionally when the track is narrower than the image.
            let scale = if *width > w && *width > 0.0 { w / width } else { 1.0 };
            out.push(Paint::Image {
                src: src.clone(),
                x,
                y,
                w: width * scale,
                h: height * scale,
                shape: *shape,
            });
            height * scale
        }
        Node::Rule {
            color,
            thickness,
            width,
        } => {
            let rule_w = width.map_or(w, |rw| rw.min(w));
            out.push(Paint::Rect {
                x: x + (w - rule_w) / 2.0,
                y,
                w: rule_w,
                h: *thickness,
                color: *color,
            });
            *thickness
        }
        Node::Meter {
            fraction,
            height,
            track,
            fill,
        } => {
            out.push(Paint::Rect {
                x,
                y,
                w,
                h: *height,
                color: *track,
            });
            let filled = w * fraction.clamp(0.0, 1.0);
            if filled > 0.0 {
                out.push(Paint::Rect {
                    x,
                    y,
                    w: filled,
                    h: *height,
                    color: *fill,
                });
            }
            *height
        }
    }
}

fn place_block(
    block: &Block,
    x: f32,
    y: f32,
    w: f32,
    glyphs: &dyn GlyphSource,
    out: &mut Vec<Paint>,
) -> f32 {
    let (box_x, box_w) = match block.max_width {
        Some(max) if w > max => (x + (w - max) / 2.0, max),
        _ => (x, w),
    };
    let pad = block.padding;
    let content_x = box_x + pad.left;
    let content_w = (box_w - pad.left - pad.right).max(0.0);

    let start = out.len();
    let mut cursor = y + pad.top;
    for (i, child) in block.children.iter().enumerate() {
        if i > 0 {
            cursor += block.gap;
        }
        cursor += place(child, content_x, cursor, content_w, glyphs, out);
    }
    let height = cursor + pad.bottom - y;

    // Decorations are painted beneath the children.
    let mut decoration = Vec::new();
    if let Some(color) = block.background {
        decoration.push(Paint::Rect {
            x: box_x,
            y,
            w: box_w,
            h: height,
            color,
        });
    }
    if let Some(color) = block.border {
        decoration.push(Paint::Border {
            x: box_x,
            y,
            w: box_w,
            h: height,
            color,
        });
    }
    out.splice(start..start, decoration);
    height
}

fn place_row(row: &Row, x: f32, y: f32, w: f32, glyphs: &dyn GlyphSource, out: &mut Vec<Paint>) -> f32 {
    let gaps = row.gap * row.cells.len().saturating_sub(1) as f32;
    let fixed: f32 = row
        .cells
        .iter()
        .filter_map(|(track, _)| match track {
            Track::Fixed(v) => Some(*v),
            Track::Fill => None,
        })
        .sum();
    let fills = row
        .cells
        .iter()
        .filter(|(track, _)| *track == Track::Fill)
        .count();
    let fill_w = if fills > 0 {
        ((w - fixed - gaps) / fills as f32).max(0.0)
    } else {
        0.0
    };

    let mut placed = Vec::with_capacity(row.cells.len());
    let mut cx = x;
    for (track, node) in &row.cells {
        let cell_w = match track {
            Track::Fixed(v) => *v,
            Track::Fill => fill_w,
        };
        let mut items = Vec::new();
        let h = place(node, cx, y, cell_w, glyphs, &mut items);
        placed.push((h, items));
        cx += cell_w + row.gap;
    }

    let row_h = placed.iter().map(|(h, _)| *h).fold(0.0, f32::max);
    for (h, mut items) in placed {
        if row.center && h < row_h {
            let dy = (row_h - h) / 2.0;
            items.iter_mut().for_each(|p| p.shift_y(dy));
        }
        out.extend(items);
    }
    row_h
}

fn place_text(
    content: &str,
    style: &TextStyle,
    x: f32,
    y: f32,
    w: f32,
    glyphs: &dyn GlyphSource,
    out: &mut Vec<Paint>,
) -> f32 {
    let text = if style.uppercase {
        content.to_uppercase()
    } else {
        content.to_string()
    };
    let lines = wrap(&text, style.size, w, glyphs);
    let line_h = style.size * style.line_height;
    let metrics = glyphs.vertical_metrics(style.size);
    let baseline_offset = (line_h - (metrics.ascent + metrics.descent)) / 2.0 + metrics.ascent;

    for (i, line) in lines.iter().enumerate() {
        let line_w = glyphs.measure(line, style.size);
        let lx = match style.align {
            Align::Start => x,
            Align::Center => x + ((w - line_w) / 2.0).max(0.0),
            Align::End => x + (w - line_w).max(0.0),
        };
        out.push(Paint::TextLine {
            x: lx,
            baseline: y + i as f32 * line_h + baseline_offset,
            size: style.size,
            color: style.color,
            text: line.clone(),
        });
    }
    lines.len() as f32 * line_h
}

/// Greedy word wrap. Words wider than the line are broken between characters.
pub fn wrap(text: &str, size: f32, width: f32, glyphs: &dyn GlyphSource) -> Vec<String> {
    let space = glyphs.advance(' ', size);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_w = 0.0;

    for word in text.split_whitespace() {
        let word_w = glyphs.measure(word, size);
        if !line.is_empty() && line_w + space + word_w <= width {
            line.push(' ');
            line.push_str(word);
            line_w += space + word_w;
            continue;
        }
        if !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if word_w <= width {
            line.push_str(word);
            line_w = word_w;
            continue;
        }
        line_w = 0.0;
        for ch in word.chars() {
            let ch_w = glyphs.advance(ch, size);
            if !line.is_empty() && line_w + ch_w > width {
                lines.push(std::mem::take(&mut line));
                line_w = 0.0;
            }
            line.push(ch);
            line_w += ch_w;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::document::{build_print_document, Insets, INK};
    use crate::export::glyphs::BoxGlyphs;
    use crate::export::snapshot::tests::sample_snapshot;
    use chrono::NaiveDate;

    fn text(content: &str) -> Node {
        Node::text(content, TextStyle::new(10.0, INK))
    }

    fn doc(root: Block) -> PrintDocument {
        PrintDocument {
            background: Rgb([255, 255, 255]),
            root,
        }
    }

    #[test]
    fn test_wrap_breaks_between_words() {
        // BoxGlyphs: 5px per char at size 10
        let lines = wrap("aaa bbb ccc", 10.0, 40.0, &BoxGlyphs);
        assert_eq!(lines, vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn test_wrap_breaks_overlong_words() {
        let lines = wrap("abcdefghij", 10.0, 20.0, &BoxGlyphs);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_of_blank_text_is_empty() {
        assert!(wrap("   ", 10.0, 100.0, &BoxGlyphs).is_empty());
    }

    #[test]
    fn test_block_stacks_children_with_gap_and_padding() {
        let root = Block::new(vec![text("one"), text("two")])
            .padding(Insets::all(10.0))
            .gap(6.0);
        let list = layout(&doc(root), 300.0, &BoxGlyphs);
        // two 14px lines + 6 gap + 20 padding
        assert_eq!(list.height, 54.0);
        let baselines: Vec<f32> = list
            .items
            .iter()
            .filter_map(|p| match p {
                Paint::TextLine { baseline, .. } => Some(*baseline),
                _ => None,
            })
            .collect();
        assert_eq!(baselines.len(), 2);
        assert!((baselines[1] - baselines[0] - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_max_width_centers_the_content_column() {
        let root = Block::new(vec![Node::Block(Block::new(vec![text("x")]).max_width(100.0))]);
        let list = layout(&doc(root), 300.0, &BoxGlyphs);
        let x = list.items.iter().find_map(|p| match p {
            Paint::TextLine { x, .. } => Some(*x),
            _ => None,
        });
        assert_eq!(x, Some(100.0));
    }

    #[test]
    fn test_centered_row_aligns_short_cell() {
        let row = Row {
            gap: 0.0,
            center: true,
            cells: vec![
                (
                    Track::Fixed(40.0),
                    Node::Meter {
                        fraction: 1.0,
                        height: 40.0,
                        track: INK,
                        fill: INK,
                    },
                ),
                (
                    Track::Fill,
                    Node::Meter {
                        fraction: 0.0,
                        height: 10.0,
                        track: INK,
                        fill: INK,
                    },
                ),
            ],
        };
        let list = layout(&doc(Block::new(vec![Node::Row(row)])), 200.0, &BoxGlyphs);
        assert_eq!(list.height, 40.0);
        let short = list.items.iter().find(|p| matches!(p, Paint::Rect { h, .. } if *h == 10.0));
        match short {
            Some(Paint::Rect { x, y, w, .. }) => {
                assert_eq!(*x, 40.0);
                assert_eq!(*y, 15.0);
                assert_eq!(*w, 160.0);
            }
            other => panic!("unexpected paint: {other:?}"),
        }
    }

    #[test]
    fn test_full_document_fits_logical_width() {
        let snapshot = sample_snapshot("Ana Ruiz", Some("https://cdn.example.com/me.jpg"));
        let document = build_print_document(&snapshot, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let list = layout(&document, 794.0, &BoxGlyphs);

        assert!(list.height > 0.0);
        assert!(list.items.iter().any(|p| matches!(p, Paint::Image { w, .. } if *w == 160.0)));
        for item in &list.items {
            if let Paint::Rect { x, w, .. } | Paint::Border { x, w, .. } = item {
                assert!(*x >= 0.0 && x + w <= 794.0 + 1e-3, "{item:?} overflows");
            }
        }
    }
}
