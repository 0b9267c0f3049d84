// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Calibration test pages, built with `printpdf` 0.8.
//
// A test page is a single page sized to a named paper profile, carrying one
// centred line of fixed text in the bundled calibration font.  Layout is
// computed separately from PDF serialisation so it can be checked without a
// font file.

use std::num::NonZeroU32;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{Orientation, PaperFormat, PaperSize, PrintSettings};
use druckbote_security::hash_bytes;
use printpdf::{
    FontId, Mm, Op, ParsedFont, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt,
    TextItem,
};
use tracing::{debug, info, instrument};

use crate::resources::ResourceLocator;

/// Text printed on every calibration page.
pub const CALIBRATION_TEXT: &str =
    "Druckbote test page: The quick brown fox jumps over the lazy dog 0123456789";

/// Horizontal margin kept free on each side of the page.
const MARGIN_MM: f32 = 3.0;

/// Average glyph advance as a fraction of the font size (sans-serif).
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Line height as a multiple of the font size.
const LINE_SPACING: f32 = 1.25;

/// Resource name of the embedded calibration font.  printpdf otherwise picks
/// a random one, which ends up in the font dictionary and CMap.
const CALIBRATION_FONT_NAME: &str = "DruckboteCalibration";

/// Page geometry and calibration font size for a named paper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperProfile {
    pub name: &'static str,
    pub width_mm: f32,
    pub height_mm: f32,
    pub orientation: Orientation,
    pub font_size_pt: f32,
    /// Named size understood by the print utilities, if any.
    pub named_size: Option<PaperSize>,
}

/// Known paper profiles.  Dimensions are the page as printed.
pub const PAPER_PROFILES: &[PaperProfile] = &[
    PaperProfile {
        name: "a4",
        width_mm: 210.0,
        height_mm: 297.0,
        orientation: Orientation::Portrait,
        font_size_pt: 14.0,
        named_size: Some(PaperSize::A4),
    },
    PaperProfile {
        name: "letter",
        width_mm: 215.9,
        height_mm: 279.4,
        orientation: Orientation::Portrait,
        font_size_pt: 14.0,
        named_size: Some(PaperSize::Letter),
    },
    PaperProfile {
        name: "a6",
        width_mm: 105.0,
        height_mm: 148.0,
        orientation: Orientation::Portrait,
        font_size_pt: 12.0,
        named_size: Some(PaperSize::A6),
    },
    PaperProfile {
        name: "label-102x152",
        width_mm: 101.6,
        height_mm: 152.4,
        orientation: Orientation::Portrait,
        font_size_pt: 12.0,
        named_size: None,
    },
    PaperProfile {
        name: "label-62x100",
        width_mm: 62.0,
        height_mm: 100.0,
        orientation: Orientation::Portrait,
        font_size_pt: 9.0,
        named_size: None,
    },
    PaperProfile {
        name: "label-62x29",
        width_mm: 62.0,
        height_mm: 29.0,
        orientation: Orientation::Landscape,
        font_size_pt: 7.0,
        named_size: None,
    },
    PaperProfile {
        name: "label-57x32",
        width_mm: 57.0,
        height_mm: 32.0,
        orientation: Orientation::Landscape,
        font_size_pt: 7.0,
        named_size: None,
    },
];

/// Look up a profile by name (case-insensitive).
pub fn paper_profile(name: &str) -> Result<&'static PaperProfile> {
    PAPER_PROFILES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| DruckboteError::UnknownPaperProfile(name.to_string()))
}

impl PaperProfile {
    /// Settings that make the print utility use this profile's paper.
    pub fn print_settings(&self) -> PrintSettings {
        let format = match self.named_size {
            Some(size) => PaperFormat::Named(size),
            None => PaperFormat::Custom {
                width_mm: self.width_mm.round() as u32,
                height_mm: self.height_mm.round() as u32,
            },
        };
        PrintSettings {
            duplex: None,
            copies: NonZeroU32::new(1),
            orientation: Some(self.orientation),
            format: Some(format),
        }
    }
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x_pt: f32,
    pub y_pt: f32,
}

/// Fully computed page layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub font_size_pt: f32,
    pub lines: Vec<PlacedLine>,
}

/// Compute the calibration layout for `profile`: text wrapped to the usable
/// width, the block centred horizontally and vertically.
pub fn layout_test_page(profile: &PaperProfile) -> TestPageLayout {
    let font_size = profile.font_size_pt;
    let page_w_pt = Mm(profile.width_mm).into_pt().0;
    let page_h_pt = Mm(profile.height_mm).into_pt().0;
    let usable_w_pt = Mm(profile.width_mm - 2.0 * MARGIN_MM).into_pt().0;

    let glyph_w_pt = AVG_GLYPH_WIDTH * font_size;
    let max_chars = ((usable_w_pt / glyph_w_pt) as usize).max(1);
    let wrapped = wrap_text(CALIBRATION_TEXT, max_chars);

    let line_h_pt = LINE_SPACING * font_size;
    let block_h_pt = line_h_pt * wrapped.len() as f32;
    // Baseline of the first line, measured from the bottom edge.
    let first_baseline = (page_h_pt + block_h_pt) / 2.0 - font_size;

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let text_w_pt = text.chars().count() as f32 * glyph_w_pt;
            PlacedLine {
                x_pt: ((page_w_pt - text_w_pt) / 2.0).max(0.0),
                y_pt: first_baseline - i as f32 * line_h_pt,
                text,
            }
        })
        .collect();

    TestPageLayout {
        width_mm: profile.width_mm,
        height_mm: profile.height_mm,
        font_size_pt: font_size,
        lines,
    }
}

/// Generates calibration pages using the bundled font.
#[derive(Debug, Clone)]
pub struct TestPageGenerator {
    resources: ResourceLocator,
}

impl TestPageGenerator {
    pub fn new(resources: ResourceLocator) -> Self {
        Self { resources }
    }

    /// Produce a calibration PDF for the named paper profile.
    ///
    /// Unknown profiles are rejected before the font is read.
    #[instrument(skip(self))]
    pub async fn generate(&self, profile_name: &str) -> Result<Vec<u8>> {
        let profile = paper_profile(profile_name)?;
        let font_bytes = self.resources.load_font().await?;

        let pdf = tokio::task::spawn_blocking(move || render_test_page(profile, &font_bytes))
            .await
            .map_err(|e| DruckboteError::Render(format!("render task failed: {e}")))??;

        info!(profile = profile.name, bytes = pdf.len(), "test page generated");
        Ok(pdf)
    }
}

/// Serialise the calibration page for `profile` with the given font.
pub fn render_test_page(profile: &PaperProfile, font_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let font = ParsedFont::from_bytes(font_bytes, 0, &mut warnings).ok_or_else(|| {
        DruckboteError::FontLoad("calibration font is not a usable TrueType/OpenType font".into())
    })?;

    let layout = layout_test_page(profile);

    let mut doc = PdfDocument::new("Druckbote test page");
    let font_id = FontId(CALIBRATION_FONT_NAME.to_string());
    doc.resources.fonts.map.insert(font_id.clone(), font);

    let mut ops: Vec<Op> = Vec::new();
    for line in &layout.lines {
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(line.x_pt),
                y: Pt(line.y_pt),
            },
        });
        ops.push(Op::SetFontSize {
            size: Pt(layout.font_size_pt),
            font: font_id.clone(),
        });
        ops.push(Op::WriteText {
            items: vec![TextItem::Text(line.text.clone())],
            font: font_id.clone(),
        });
        ops.push(Op::EndTextSection);
    }

    doc.with_pages(vec![PdfPage::new(
        Mm(layout.width_mm),
        Mm(layout.height_mm),
        ops,
    )]);

    let mut output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if output.is_empty() {
        return Err(DruckboteError::Render("PDF serialisation produced no output".into()));
    }
    let mut seed = font_bytes.to_vec();
    seed.extend_from_slice(profile.name.as_bytes());
    pin_document_id(&mut output, &hash_bytes(&seed));

    debug!(
        lines = layout.lines.len(),
        warnings = warnings.len(),
        "test page serialised"
    );
    Ok(output)
}

/// Overwrite the strings of the trailer `/ID` array with `id`, in place.
///
/// The serialiser fills both entries with fresh random text on every save.
/// Each string keeps its length so the cross-reference offsets stay valid.
/// Returns `false` when no `/ID` array was found.
fn pin_document_id(pdf: &mut [u8], id: &str) -> bool {
    const KEY: &[u8] = b"/ID";
    let Some(start) = pdf.windows(KEY.len()).rposition(|w| w == KEY) else {
        return false;
    };

    let mut pos = start + KEY.len();
    while pdf.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    if pdf.get(pos) != Some(&b'[') {
        return false;
    }
    pos += 1;

    let id = id.as_bytes();
    let mut pinned = 0;
    while pinned < 2 {
        while pdf.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        if pdf.get(pos) != Some(&b'(') || id.is_empty() {
            break;
        }
        let open = pos + 1;
        let Some(len) = pdf[open..].iter().position(|&b| b == b')') else {
            break;
        };
        for (slot, byte) in pdf[open..open + len].iter_mut().zip(id.iter().cycle()) {
            *slot = *byte;
        }
        pos = open + len + 1;
        pinned += 1;
    }
    pinned > 0
}

// -- Text wrapping helper -----------------------------------------------------

/// Word-wrap `text` so that no line exceeds `max_width` characters.
///
/// Words longer than `max_width` are force-broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_width {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_width).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    result.push(chunk.iter().collect());
                } else {
                    current = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        } else if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            result.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}
