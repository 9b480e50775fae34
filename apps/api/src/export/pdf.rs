//! PDF assembly: one page per JPEG, each image drawn at full page width from
//! the top edge.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;
use tracing::debug;

use super::paginate::{PageFormat, PageImage};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("no pages to write")]
    NoPages,

    #[error("failed to build PDF: {0}")]
    Build(#[from] lopdf::Error),

    #[error("failed to serialize PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes `pages` into a new portrait document of `format`.
pub fn assemble(pages: &[PageImage], format: &PageFormat, title: &str) -> Result<Vec<u8>, PdfError> {
    if pages.is_empty() {
        return Err(PdfError::NoPages);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_w = format.width_pt() as f32;
    let page_h = format.height_pt() as f32;

    let kids: Vec<Object> = pages
        .iter()
        .map(|page| add_page(&mut doc, pages_id, page, page_w, page_h).map(Object::from))
        .collect::<Result<_, PdfError>>()?;

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => text_string(title),
        "Producer" => Object::string_literal(concat!("cvsite-api ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    debug!(pages = pages.len(), bytes = bytes.len(), "Assembled PDF");
    Ok(bytes)
}

/// PDF text string. Literal strings are read as PDFDocEncoding, so anything
/// beyond ASCII is written as UTF-16BE with a byte order mark.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    page: &PageImage,
    page_w: f32,
    page_h: f32,
) -> Result<ObjectId, PdfError> {
    let image_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(page.width_px),
                "Height" => i64::from(page.height_px),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg.clone(),
        )
        .with_compression(false),
    );

    // Full page width; height follows the image aspect, anchored at the top.
    let draw_h = page_w * page.height_px as f32 / page.width_px as f32;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_w.into(),
                    0.into(),
                    0.into(),
                    draw_h.into(),
                    0.into(),
                    (page_h - draw_h).into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    }))
}
