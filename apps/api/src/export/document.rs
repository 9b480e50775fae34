//! Print-oriented CV document tree.
//!
//! A deliberately small box model: vertical blocks, horizontal rows with fixed and
//! filling tracks, wrapped text, images, rules and proficiency meters. The tree is
//! built once per export from a sanitized snapshot; `layout.rs` positions it and
//! `raster.rs` paints it.

use chrono::NaiveDate;
use image::Rgb;

use crate::models::cv::{ContactKind, CvSnapshot, Profile};

// ────────────────────────────────────────────────────────────────────────────
// Palette (light print theme)
// ────────────────────────────────────────────────────────────────────────────

pub const PAPER: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);
pub const INK: Rgb<u8> = Rgb([0x1a, 0x1a, 0x1a]);
pub const MUTED: Rgb<u8> = Rgb([0x6b, 0x6b, 0x6b]);
pub const GOLD: Rgb<u8> = Rgb([0xb8, 0x86, 0x0b]);
pub const ACCENT: Rgb<u8> = Rgb([0xc9, 0xa2, 0x27]);
pub const CARD: Rgb<u8> = Rgb([0xfa, 0xfa, 0xfa]);
pub const CARD_BORDER: Rgb<u8> = Rgb([0xe5, 0xe5, 0xe5]);
pub const METER_TRACK: Rgb<u8> = Rgb([0xee, 0xe8, 0xd5]);

const CONTENT_MAX_WIDTH: f32 = 720.0;
const PHOTO_SIZE: f32 = 160.0;
const FALLBACK_TITLE: &str = "Curriculum Vitae";

// ────────────────────────────────────────────────────────────────────────────
// Tree
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Insets {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Insets {
    pub const fn symmetric(vertical: f32, horizontal: f32) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub const fn all(v: f32) -> Self {
        Self::symmetric(v, v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub size: f32,
    pub color: Rgb<u8>,
    /// Line box height as a multiple of `size`.
    pub line_height: f32,
    pub align: Align,
    pub uppercase: bool,
}

impl TextStyle {
    pub fn new(size: f32, color: Rgb<u8>) -> Self {
        Self {
            size,
            color,
            line_height: 1.4,
            align: Align::Start,
            uppercase: false,
        }
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }

    pub fn end(mut self) -> Self {
        self.align = Align::End;
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }

    pub fn line_height(mut self, factor: f32) -> Self {
        self.line_height = factor;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageShape {
    Rect,
    Circle,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub padding: Insets,
    pub background: Option<Rgb<u8>>,
    pub border: Option<Rgb<u8>>,
    /// Vertical space between children.
    pub gap: f32,
    /// Content column is capped at this width and centered.
    pub max_width: Option<f32>,
    pub children: Vec<Node>,
}

impl Block {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            padding: Insets::default(),
            background: None,
            border: None,
            gap: 0.0,
            max_width: None,
            children,
        }
    }

    pub fn padding(mut self, padding: Insets) -> Self {
        self.padding = padding;
        self
    }

    pub fn background(mut self, color: Rgb<u8>) -> Self {
        self.background = Some(color);
        self
    }

    pub fn border(mut self, color: Rgb<u8>) -> Self {
        self.border = Some(color);
        self
    }

    pub fn gap(mut self, gap: f32) -> Self {
        self.gap = gap;
        self
    }

    pub fn max_width(mut self, width: f32) -> Self {
        self.max_width = Some(width);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Track {
    Fixed(f32),
    Fill,
}

#[derive(Debug, Clone)]
pub struct Row {
    pub gap: f32,
    /// Children shorter than the row are centered vertically when true.
    pub center: bool,
    pub cells: Vec<(Track, Node)>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Block(Block),
    Row(Row),
    Text { content: String, style: TextStyle },
    Image {
        src: String,
        width: f32,
        height: f32,
        shape: ImageShape,
    },
    Rule {
        color: Rgb<u8>,
        thickness: f32,
        /// Centered rule of this width; full width when `None`.
        width: Option<f32>,
    },
    Meter {
        fraction: f32,
        height: f32,
        track: Rgb<u8>,
        fill: Rgb<u8>,
    },
}

impl Node {
    pub fn text(content: impl Into<String>, style: TextStyle) -> Self {
        Node::Text {
            content: content.into(),
            style,
        }
    }

    fn collect_image_sources(&self, out: &mut Vec<String>) {
        match self {
            Node::Image { src, .. } => {
                if !out.contains(src) {
                    out.push(src.clone());
                }
            }
            Node::Block(block) => block
                .children
                .iter()
                .for_each(|c| c.collect_image_sources(out)),
            Node::Row(row) => row
                .cells
                .iter()
                .for_each(|(_, c)| c.collect_image_sources(out)),
            Node::Text { .. } | Node::Rule { .. } | Node::Meter { .. } => {}
        }
    }
}

/// The main content region of the print CV.
#[derive(Debug, Clone)]
pub struct PrintDocument {
    pub background: Rgb<u8>,
    pub root: Block,
}

impl PrintDocument {
    /// Distinct image sources referenced anywhere in the tree, in document order.
    pub fn image_sources(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root
            .children
            .iter()
            .for_each(|c| c.collect_image_sources(&mut out));
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builds the print CV from a sanitized snapshot. Empty families produce no section.
pub fn build_print_document(snapshot: &CvSnapshot, generated_on: NaiveDate) -> PrintDocument {
    let mut sections = vec![hero(snapshot)];

    if let Some(summary) = snapshot
        .profile
        .as_ref()
        .and_then(|p| p.professional_summary.as_deref())
    {
        sections.push(section(
            "Professional Profile",
            vec![Node::Block(
                card(vec![Node::text(
                    summary,
                    TextStyle::new(13.0, INK).line_height(1.6),
                )])
                .background(PAPER),
            )],
        ));
    }

    if !snapshot.experiences.is_empty() {
        let cards = snapshot
            .experiences
            .iter()
            .map(|exp| {
                let mut children = vec![
                    Node::text(&exp.role, TextStyle::new(16.0, INK)),
                    Node::text(&exp.company, TextStyle::new(14.0, GOLD)),
                ];
                let when = [exp.period_display.as_deref(), exp.duration.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join("  ·  ");
                if !when.is_empty() {
                    children.push(Node::text(when, TextStyle::new(12.0, MUTED)));
                }
                Node::Block(card(children))
            })
            .collect();
        sections.push(section("Work Experience", cards));
    }

    if !snapshot.education.is_empty() {
        let cards = snapshot
            .education
            .iter()
            .map(|edu| {
                let mut children = vec![Node::text(&edu.title, TextStyle::new(15.0, INK))];
                if let Some(institution) = &edu.institution {
                    children.push(Node::text(institution, TextStyle::new(13.0, GOLD)));
                }
                if let Some(description) = &edu.description {
                    children.push(Node::text(description, TextStyle::new(12.0, MUTED)));
                }
                Node::Block(card(children))
            })
            .collect();
        sections.push(section("Education", cards));
    }

    if !snapshot.languages.is_empty() {
        let rows = snapshot
            .languages
            .iter()
            .map(|lang| {
                Node::Block(
                    Block::new(vec![
                        Node::Row(Row {
                            gap: 12.0,
                            center: false,
                            cells: vec![
                                (Track::Fill, Node::text(&lang.name, TextStyle::new(14.0, INK))),
                                (
                                    Track::Fixed(160.0),
                                    Node::text(&lang.level, TextStyle::new(12.0, MUTED).end()),
                                ),
                            ],
                        }),
                        Node::Meter {
                            fraction: f32::from(lang.proficiency()) / 100.0,
                            height: 6.0,
                            track: METER_TRACK,
                            fill: ACCENT,
                        },
                    ])
                    .gap(6.0),
                )
            })
            .collect();
        sections.push(section("Languages", rows));
    }

    if !snapshot.skills.is_empty() {
        let cards = snapshot
            .skills
            .iter()
            .map(|skill| {
                let mut children = vec![Node::text(&skill.title, TextStyle::new(14.0, INK))];
                if let Some(description) = &skill.description {
                    children.push(Node::text(description, TextStyle::new(12.0, MUTED)));
                }
                Node::Block(card(children))
            })
            .collect();
        sections.push(section("Skills", cards));
    }

    if !snapshot.contacts.is_empty() {
        let lines = snapshot
            .contacts
            .iter()
            .map(|contact| {
                let label = contact.label.as_deref().unwrap_or(contact.kind.label());
                Node::Row(Row {
                    gap: 12.0,
                    center: false,
                    cells: vec![
                        (
                            Track::Fixed(120.0),
                            Node::text(label, TextStyle::new(12.0, GOLD).uppercase()),
                        ),
                        (Track::Fill, Node::text(&contact.value, TextStyle::new(13.0, INK))),
                    ],
                })
            })
            .collect();
        sections.push(section("Contact", lines));
    }

    sections.push(footer(snapshot, generated_on));

    PrintDocument {
        background: PAPER,
        root: Block::new(sections).background(PAPER),
    }
}

fn section(title: &str, children: Vec<Node>) -> Node {
    let mut nodes = vec![
        Node::text(title, TextStyle::new(22.0, INK).centered()),
        Node::Rule {
            color: ACCENT,
            thickness: 1.0,
            width: Some(200.0),
        },
    ];
    nodes.extend(children);
    Node::Block(
        Block::new(nodes)
            .padding(Insets::symmetric(28.0, 24.0))
            .max_width(CONTENT_MAX_WIDTH)
            .gap(14.0),
    )
}

fn card(children: Vec<Node>) -> Block {
    Block::new(children)
        .padding(Insets::all(18.0))
        .background(CARD)
        .border(CARD_BORDER)
        .gap(4.0)
}

fn hero(snapshot: &CvSnapshot) -> Node {
    let profile: Option<&Profile> = snapshot.profile.as_ref();
    let mut text = Vec::new();

    if let Some(profession) = profile.and_then(|p| p.profession.as_deref()) {
        text.push(Node::text(
            profession,
            TextStyle::new(11.0, GOLD).uppercase(),
        ));
    }
    let name = profile
        .map(|p| p.full_name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_TITLE);
    text.push(Node::text(name, TextStyle::new(32.0, INK).line_height(1.2)));

    let origin = profile
        .map(|p| {
            [nationality_label(p), p.location.clone()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("  ·  ")
        })
        .unwrap_or_default();
    if !origin.is_empty() {
        text.push(Node::text(origin, TextStyle::new(13.0, MUTED)));
    }
    if let Some(status) = profile.and_then(|p| p.availability_status.as_deref()) {
        text.push(Node::text(status, TextStyle::new(12.0, GOLD)));
    }
    for kind in [ContactKind::Phone, ContactKind::Location] {
        if let Some(contact) = snapshot.contact(kind) {
            text.push(Node::text(&contact.value, TextStyle::new(13.0, MUTED)));
        }
    }

    let details = Node::Block(Block::new(text).gap(6.0));
    let cells = match profile.and_then(|p| p.photo_url.as_deref()) {
        Some(src) => vec![
            (
                Track::Fixed(PHOTO_SIZE),
                Node::Image {
                    src: src.to_string(),
                    width: PHOTO_SIZE,
                    height: PHOTO_SIZE,
                    shape: ImageShape::Circle,
                },
            ),
            (Track::Fill, details),
        ],
        None => vec![(Track::Fill, details)],
    };

    Node::Block(
        Block::new(vec![Node::Row(Row {
            gap: 40.0,
            center: true,
            cells,
        })])
        .padding(Insets::symmetric(40.0, 24.0))
        .max_width(CONTENT_MAX_WIDTH),
    )
}

/// "Spanish (ES)". The print font has no emoji, so a flag is shown by its
/// country code instead.
fn nationality_label(profile: &Profile) -> Option<String> {
    let code = profile.nationality_flag.as_deref().and_then(flag_code);
    match (profile.nationality.as_deref(), code) {
        (Some(nationality), Some(code)) => Some(format!("{nationality} ({code})")),
        (Some(nationality), None) => Some(nationality.to_string()),
        (None, code) => code,
    }
}

/// Maps regional indicator symbols to their letters (`🇪🇸` → `ES`). Plain ASCII
/// codes pass through upper-cased; anything else is dropped.
fn flag_code(flag: &str) -> Option<String> {
    const REGIONAL_A: u32 = 0x1F1E6;
    let code: String = flag
        .chars()
        .filter_map(|c| match u32::from(c).checked_sub(REGIONAL_A) {
            Some(offset) if offset < 26 => char::from_u32(u32::from('A') + offset),
            _ if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
            _ => None,
        })
        .collect();
    (!code.is_empty()).then_some(code)
}

fn footer(snapshot: &CvSnapshot, generated_on: NaiveDate) -> Node {
    let mut nodes = vec![Node::Rule {
        color: ACCENT,
        thickness: 1.0,
        width: Some(120.0),
    }];
    if let Some(website) = snapshot.contact(ContactKind::Website) {
        nodes.push(Node::text(
            &website.value,
            TextStyle::new(14.0, GOLD).centered(),
        ));
    }
    nodes.push(Node::text(
        format!("Generated on {}", generated_on.format("%-d %B %Y")),
        TextStyle::new(10.0, MUTED).centered(),
    ));
    Node::Block(
        Block::new(nodes)
            .padding(Insets::symmetric(16.0, 24.0))
            .border(CARD_BORDER)
            .gap(8.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::snapshot::tests::sample_snapshot;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn texts(node: &Node, out: &mut Vec<String>) {
        match node {
            Node::Text { content, .. } => out.push(content.clone()),
            Node::Block(b) => b.children.iter().for_each(|c| texts(c, out)),
            Node::Row(r) => r.cells.iter().for_each(|(_, c)| texts(c, out)),
            _ => {}
        }
    }

    fn all_texts(doc: &PrintDocument) -> Vec<String> {
        let mut out = Vec::new();
        doc.root.children.iter().for_each(|c| texts(c, &mut out));
        out
    }

    #[test]
    fn test_document_lists_experiences_in_snapshot_order() {
        let snapshot = sample_snapshot("Ana Ruiz", None);
        let doc = build_print_document(&snapshot, date());
        let texts = all_texts(&doc);
        let fiesta = texts.iter().position(|t| t == r#"Hotel "FIESTA""#);
        let plaza = texts.iter().position(|t| t == r#"Hotel "PLAZA""#);
        // The builder renders in the order it is given; ordering is the sanitizer's job.
        assert!(fiesta.unwrap() < plaza.unwrap());
    }

    #[test]
    fn test_document_collects_photo_source_once() {
        let snapshot = sample_snapshot("Ana Ruiz", Some("https://cdn.example.com/me.jpg"));
        let doc = build_print_document(&snapshot, date());
        assert_eq!(doc.image_sources(), vec!["https://cdn.example.com/me.jpg"]);
    }

    #[test]
    fn test_document_without_photo_has_no_images() {
        let doc = build_print_document(&sample_snapshot("Ana Ruiz", None), date());
        assert!(doc.image_sources().is_empty());
    }

    #[test]
    fn test_hero_shows_flag_as_country_code() {
        let doc = build_print_document(&sample_snapshot("Ana Ruiz", None), date());
        assert!(all_texts(&doc).contains(&"Spanish (ES)  ·  Alicante".to_string()));
    }

    #[test]
    fn test_flag_code() {
        assert_eq!(flag_code("🇪🇸").as_deref(), Some("ES"));
        assert_eq!(flag_code(" gb ").as_deref(), Some("GB"));
        assert_eq!(flag_code("🏳️"), None);
    }

    #[test]
    fn test_empty_snapshot_falls_back_to_title_and_footer() {
        let doc = build_print_document(&CvSnapshot::default(), date());
        let texts = all_texts(&doc);
        assert!(texts.contains(&FALLBACK_TITLE.to_string()));
        assert!(texts.contains(&"Generated on 18 October 2026".to_string()));
        // hero + footer only
        assert_eq!(doc.root.children.len(), 2);
    }
}
