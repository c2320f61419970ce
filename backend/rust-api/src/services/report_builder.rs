use anyhow::Result;
use chrono::{DateTime, Utc};
use printpdf::{
    BuiltinFont, Color, Greyscale, Line, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage,
    PdfSaveOptions, Point, Polygon, PolygonRing, Pt, Rgb, TextItem, WindingOrder,
};
use rust_xlsxwriter::{Format, Workbook};

use crate::engine::pillar::Pillar;
use crate::engine::recommendations::{ScoreTier, RECOMMENDATION_THRESHOLD};
use crate::models::assessment::{Assessment, AssessmentSummary};
use crate::models::user::User;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const BOTTOM_LIMIT_MM: f32 = 20.0;

/// Escapes CSV field to prevent formula injection attacks.
/// Prefixes dangerous characters (=, +, @, -, tab, newline) with a tab to neutralize them.
/// Also wraps fields containing special characters in quotes.
pub fn escape_csv_field(value: &str) -> String {
    let sanitized = if value.starts_with(['=', '+', '@', '-', '\t', '\r', '\n']) {
        format!("\t{}", value)
    } else {
        value.to_string()
    };

    if sanitized.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", sanitized.replace('"', "\"\""))
    } else {
        sanitized
    }
}

/// Assessment row for admin exports; `user` is `None` when the account is gone.
pub struct ExportRow<'a> {
    pub assessment: &'a Assessment,
    pub user: Option<&'a User>,
}

fn export_header() -> Vec<String> {
    let mut header = vec![
        "assessment_id".to_string(),
        "user_id".to_string(),
        "email".to_string(),
        "name".to_string(),
        "completed_at".to_string(),
        "overall".to_string(),
    ];
    header.extend(Pillar::ALL.iter().map(|p| p.as_str().to_string()));
    header
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn build_csv(rows: &[ExportRow<'_>]) -> Vec<u8> {
    let mut lines = vec![export_header().join(",")];

    for row in rows {
        let a = row.assessment;
        let mut fields = vec![
            escape_csv_field(&a.id),
            escape_csv_field(&a.user_id),
            escape_csv_field(row.user.map(|u| u.email.as_str()).unwrap_or("")),
            escape_csv_field(row.user.map(|u| u.name.as_str()).unwrap_or("")),
            format_timestamp(&a.completed_at),
            format!("{:.2}", a.overall_score),
        ];
        fields.extend(
            Pillar::ALL
                .iter()
                .map(|pillar| format!("{:.2}", a.pillar_score(*pillar))),
        );
        lines.push(fields.join(","));
    }

    lines.join("\n").into_bytes()
}

pub fn build_xlsx(rows: &[ExportRow<'_>]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Assessments")?;
    worksheet.set_column_width(0, 38.0)?;
    worksheet.set_column_width(1, 38.0)?;
    worksheet.set_column_width(2, 30.0)?;
    worksheet.set_column_width(3, 24.0)?;
    worksheet.set_column_width(4, 24.0)?;

    let header_format = Format::new().set_bold();
    let score_format = Format::new().set_num_format("0.00");

    for (col, title) in export_header().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, &header_format)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        let a = row.assessment;
        worksheet.write_string(r, 0, &a.id)?;
        worksheet.write_string(r, 1, &a.user_id)?;
        worksheet.write_string(r, 2, row.user.map(|u| u.email.as_str()).unwrap_or(""))?;
        worksheet.write_string(r, 3, row.user.map(|u| u.name.as_str()).unwrap_or(""))?;
        worksheet.write_string(r, 4, format_timestamp(&a.completed_at))?;
        worksheet.write_number_with_format(r, 5, a.overall_score, &score_format)?;
        for (offset, pillar) in Pillar::ALL.iter().enumerate() {
            worksheet.write_number_with_format(
                r,
                (6 + offset) as u16,
                a.pillar_score(*pillar),
                &score_format,
            )?;
        }
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    workbook.save_to_writer(&mut cursor)?;
    Ok(cursor.into_inner())
}

/// Accumulates drawing ops, starting a new page when the cursor runs out of room.
struct PdfWriter {
    pages: Vec<PdfPage>,
    ops: Vec<Op>,
    y: f32,
}

impl PdfWriter {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        }
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < BOTTOM_LIMIT_MM {
            let ops = std::mem::take(&mut self.ops);
            self.pages
                .push(PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops));
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }

    fn text(&mut self, x: f32, font: BuiltinFont, size: f32, text: String, color: &Color) {
        let line_height = size * 0.5;
        self.ensure_room(line_height);
        push_pdf_text(
            &mut self.ops,
            Point::new(Mm(x), Mm(self.y)),
            font,
            size,
            size + 3.0,
            text,
            color,
        );
        self.y -= line_height.max(5.0);
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn finish(mut self) -> Vec<PdfPage> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(PdfPage::new(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                self.ops,
            ));
        }
        self.pages
    }
}

/// Renders the results report: overall score, a bar per pillar and the
/// recommendation list for each pillar.
pub fn render_assessment_pdf(summary: &AssessmentSummary, user: Option<&User>) -> Vec<u8> {
    let assessment = &summary.assessment;
    let mut document = PdfDocument::new("Financial Wellness Assessment");

    let accent = Color::Rgb(Rgb {
        r: 0.16,
        g: 0.4,
        b: 0.69,
        icc_profile: None,
    });
    let strong = Color::Rgb(Rgb {
        r: 0.33,
        g: 0.66,
        b: 0.53,
        icc_profile: None,
    });
    let weak = Color::Rgb(Rgb {
        r: 0.89,
        g: 0.57,
        b: 0.28,
        icc_profile: None,
    });
    let text_color = Color::Greyscale(Greyscale::new(0.08, None));
    let track_color = Color::Greyscale(Greyscale::new(0.88, None));

    let mut writer = PdfWriter::new();
    writer.text(
        MARGIN_MM,
        BuiltinFont::HelveticaBold,
        20.0,
        "Financial Wellness Assessment".into(),
        &accent,
    );
    if let Some(user) = user {
        writer.text(
            MARGIN_MM,
            BuiltinFont::Helvetica,
            11.0,
            format!("Prepared for {} ({})", user.name, user.email),
            &text_color,
        );
    }
    writer.text(
        MARGIN_MM,
        BuiltinFont::Helvetica,
        11.0,
        format!("Completed {}", format_timestamp(&assessment.completed_at)),
        &text_color,
    );
    writer.gap(4.0);
    writer.text(
        MARGIN_MM,
        BuiltinFont::HelveticaBold,
        16.0,
        format!("Overall score: {:.1} / 10", assessment.overall_score),
        &accent,
    );
    writer.gap(4.0);

    // Pillar bars
    let label_width = 38.0_f32;
    let bar_max = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - label_width - 18.0;
    let bar_height = 5.0_f32;
    for pillar in Pillar::ALL {
        let score = assessment.pillar_score(pillar);
        writer.ensure_room(bar_height + 4.0);
        let bottom = writer.y - bar_height + 1.5;
        push_pdf_text(
            &mut writer.ops,
            Point::new(Mm(MARGIN_MM), Mm(writer.y - 2.5)),
            BuiltinFont::Helvetica,
            10.0,
            12.0,
            pillar.label().to_string(),
            &text_color,
        );
        let left = MARGIN_MM + label_width;
        push_pdf_rect(&mut writer.ops, left, bottom, bar_max, bar_height, &track_color);
        let fill = if score >= RECOMMENDATION_THRESHOLD {
            &strong
        } else {
            &weak
        };
        let width = (score / 10.0).clamp(0.0, 1.0) as f32 * bar_max;
        push_pdf_rect(&mut writer.ops, left, bottom, width, bar_height, fill);
        push_pdf_text(
            &mut writer.ops,
            Point::new(Mm(left + bar_max + 3.0), Mm(writer.y - 2.5)),
            BuiltinFont::HelveticaBold,
            10.0,
            12.0,
            format!("{:.1}", score),
            &text_color,
        );
        writer.gap(bar_height + 3.0);
    }

    ops_separator(&mut writer, &track_color);

    writer.text(
        MARGIN_MM,
        BuiltinFont::HelveticaBold,
        14.0,
        "Recommendations".into(),
        &accent,
    );
    for (pillar, advice) in &summary.recommendations {
        writer.gap(2.0);
        let tier = match ScoreTier::for_score(assessment.pillar_score(*pillar)) {
            ScoreTier::Remedial => "build the basics",
            ScoreTier::Optimization => "optimize",
        };
        writer.text(
            MARGIN_MM,
            BuiltinFont::HelveticaBold,
            11.0,
            format!("{} ({})", pillar.label(), tier),
            &text_color,
        );
        for line in advice {
            for wrapped in wrap_text(line, 95) {
                writer.text(
                    MARGIN_MM + 4.0,
                    BuiltinFont::Helvetica,
                    10.0,
                    wrapped,
                    &text_color,
                );
            }
        }
    }

    let pages = writer.finish();
    let mut warnings = Vec::new();
    document
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings)
}

fn ops_separator(writer: &mut PdfWriter, color: &Color) {
    writer.gap(3.0);
    writer.ensure_room(2.0);
    writer.ops.push(Op::SetOutlineColor { col: color.clone() });
    writer.ops.push(Op::SetOutlineThickness { pt: Pt(0.6) });
    push_pdf_line(
        &mut writer.ops,
        (MARGIN_MM, writer.y),
        (PAGE_WIDTH_MM - MARGIN_MM, writer.y),
    );
    writer.gap(6.0);
}

/// Greedy word wrap on character count; builtin fonts have no shaping.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn push_pdf_text(
    ops: &mut Vec<Op>,
    pos: Point,
    font: BuiltinFont,
    font_size: f32,
    line_height: f32,
    text: String,
    color: &Color,
) {
    ops.extend([
        Op::StartTextSection,
        Op::SetTextCursor { pos },
        Op::SetFontSizeBuiltinFont {
            size: Pt(font_size),
            font,
        },
        Op::SetLineHeight {
            lh: Pt(line_height),
        },
        Op::SetFillColor { col: color.clone() },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text)],
            font,
        },
        Op::EndTextSection,
    ]);
}

fn push_pdf_line(ops: &mut Vec<Op>, from: (f32, f32), to: (f32, f32)) {
    ops.push(Op::DrawLine {
        line: Line {
            points: vec![
                LinePoint {
                    p: Point::new(Mm(from.0), Mm(from.1)),
                    bezier: false,
                },
                LinePoint {
                    p: Point::new(Mm(to.0), Mm(to.1)),
                    bezier: false,
                },
            ],
            is_closed: false,
        },
    });
}

fn push_pdf_rect(ops: &mut Vec<Op>, left: f32, bottom: f32, width: f32, height: f32, color: &Color) {
    if width <= 0.0 || height <= 0.0 {
        return;
    }
    let corner = |x: f32, y: f32| LinePoint {
        p: Point::new(Mm(x), Mm(y)),
        bezier: false,
    };
    let polygon = Polygon {
        rings: vec![PolygonRing {
            points: vec![
                corner(left, bottom),
                corner(left + width, bottom),
                corner(left + width, bottom + height),
                corner(left, bottom + height),
            ],
        }],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    };
    ops.push(Op::SetFillColor { col: color.clone() });
    ops.push(Op::DrawPolygon { polygon });
}
