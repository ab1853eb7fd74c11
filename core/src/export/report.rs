use std::fmt::Write as _;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::models::Reading;

pub const PAGE_WIDTH_PT: i32 = 612;
pub const PAGE_HEIGHT_PT: i32 = 792;

pub const REPORT_TITLE: &str = "Diatrack - Diabetes Summary Report";

const LEFT_MARGIN: i32 = 50;
const TOP_MARGIN: i32 = 742;
const BOTTOM_MARGIN: i32 = 80;
const BODY_START: i32 = 672;
const LINE_HEIGHT: i32 = 14;

const TITLE_SIZE: i32 = 16;
const HEADER_SIZE: i32 = 12;
const BODY_SIZE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfFont {
    Helvetica,
    HelveticaBold,
}

impl PdfFont {
    fn resource_name(self) -> &'static str {
        match self {
            Self::Helvetica => "F1",
            Self::HelveticaBold => "F2",
        }
    }
}

/// A single run of text placed at an absolute position (points, origin
/// bottom-left).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub x: i32,
    pub y: i32,
    pub font: PdfFont,
    pub size: i32,
    pub text: String,
}

impl TextLine {
    fn new(y: i32, font: PdfFont, size: i32, text: String) -> Self {
        Self {
            x: LEFT_MARGIN,
            y,
            font,
            size,
            text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportLayout {
    pub pages: Vec<Vec<TextLine>>,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// `2024-09-12 07:00 - fasting - 98 mg/dL - Morning`
pub fn format_reading_line(reading: &Reading) -> String {
    format!(
        "{} - {} - {} mg/dL - {}",
        reading.measured_at.format("%Y-%m-%d %H:%M"),
        reading.kind,
        reading.value,
        reading.note.as_deref().unwrap_or("")
    )
}

/// Place the header and one body line per reading, breaking pages lazily.
///
/// Readings are laid out in the order given. The header only appears on the
/// first page, and a new page is opened only when a line still has to be
/// drawn.
pub fn layout_report(
    readings: &[Reading],
    user_name: &str,
    generated_at: NaiveDateTime,
) -> ReportLayout {
    let mut pages = vec![vec![
        TextLine::new(
            TOP_MARGIN,
            PdfFont::HelveticaBold,
            TITLE_SIZE,
            REPORT_TITLE.to_string(),
        ),
        TextLine::new(
            TOP_MARGIN - 20,
            PdfFont::Helvetica,
            HEADER_SIZE,
            format!("Patient: {user_name}"),
        ),
        TextLine::new(
            TOP_MARGIN - 40,
            PdfFont::Helvetica,
            HEADER_SIZE,
            format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M")),
        ),
    ]];

    let mut y = BODY_START;
    for reading in readings {
        if y < BOTTOM_MARGIN {
            pages.push(Vec::new());
            y = TOP_MARGIN;
        }
        if let Some(page) = pages.last_mut() {
            page.push(TextLine::new(
                y,
                PdfFont::Helvetica,
                BODY_SIZE,
                format_reading_line(reading),
            ));
        }
        y -= LINE_HEIGHT;
    }

    ReportLayout { pages }
}

/// Escape a string for a PDF literal. Latin-1 characters map to their
/// WinAnsi octal codes; anything else becomes `?`.
pub fn escape_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii() => result.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(result, "\\{:03o}", u32::from(c));
            }
            _ => result.push('?'),
        }
    }
    result
}

fn content_stream(lines: &[TextLine]) -> String {
    let mut stream = String::new();
    for line in lines {
        let _ = writeln!(
            stream,
            "BT /{} {} Tf {} {} Td ({}) Tj ET",
            line.font.resource_name(),
            line.size,
            line.x,
            line.y,
            escape_pdf_string(&line.text)
        );
    }
    stream
}

/// Serialize a laid-out report as a PDF 1.4 document.
///
/// Object layout: 1 catalog, 2 page tree, then a page/contents pair per
/// page, then the two Type1 fonts and the info dictionary.
pub fn render_layout(layout: &ReportLayout, title: &str) -> Vec<u8> {
    let page_count = layout.pages.len();
    let font_obj_start = 3 + page_count * 2;
    let info_obj_id = font_obj_start + 2;

    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");
    pdf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets: Vec<usize> = Vec::with_capacity(info_obj_id);

    offsets.push(pdf.len());
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    let kids = (0..page_count)
        .map(|idx| format!("{} 0 R", 3 + idx * 2))
        .collect::<Vec<_>>()
        .join(" ");
    offsets.push(pdf.len());
    pdf.extend_from_slice(
        format!("2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {page_count} >>\nendobj\n")
            .as_bytes(),
    );

    for (idx, lines) in layout.pages.iter().enumerate() {
        let page_obj_id = 3 + idx * 2;
        let content_obj_id = page_obj_id + 1;

        offsets.push(pdf.len());
        pdf.extend_from_slice(
            format!(
                "{page_obj_id} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH_PT} {PAGE_HEIGHT_PT}] /Contents {content_obj_id} 0 R /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >> >> >>\nendobj\n",
                font_obj_start,
                font_obj_start + 1
            )
            .as_bytes(),
        );

        let stream = content_stream(lines);
        offsets.push(pdf.len());
        pdf.extend_from_slice(
            format!(
                "{content_obj_id} 0 obj\n<< /Length {} >>\nstream\n{stream}endstream\nendobj\n",
                stream.len()
            )
            .as_bytes(),
        );
    }

    for (offset, base_font) in [(0, "Helvetica"), (1, "Helvetica-Bold")] {
        offsets.push(pdf.len());
        pdf.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /{base_font} /Encoding /WinAnsiEncoding >>\nendobj\n",
                font_obj_start + offset
            )
            .as_bytes(),
        );
    }

    offsets.push(pdf.len());
    pdf.extend_from_slice(
        format!(
            "{info_obj_id} 0 obj\n<< /Title ({}) /Producer (Diatrack) >>\nendobj\n",
            escape_pdf_string(title)
        )
        .as_bytes(),
    );

    let xref_start = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info {info_obj_id} 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
            offsets.len() + 1
        )
        .as_bytes(),
    );

    pdf
}

/// Build the summary report for `readings` (most recent first).
pub fn build_report_pdf(
    readings: &[Reading],
    user_name: &str,
    generated_at: NaiveDateTime,
) -> Result<Vec<u8>> {
    let layout = layout_report(readings, user_name, generated_at);
    let pdf = render_layout(&layout, REPORT_TITLE);
    log::debug!(
        "built report readings={} pages={} bytes={}",
        readings.len(),
        layout.page_count(),
        pdf.len()
    );
    Ok(pdf)
}
