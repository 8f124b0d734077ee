//! Prediction report rendering (PDF or plain text)

use crate::model::{ChurnLabel, PredictionResult};
use crate::schema::CustomerRecord;
use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use log::info;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Rgb,
};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const REPORT_TITLE: &str = "Telco Customer Churn Prediction Report";

const CHURN_COLOR: (u8, u8, u8) = (200, 30, 30);
const RETAIN_COLOR: (u8, u8, u8) = (30, 130, 30);
const TEXT_COLOR: (u8, u8, u8) = (0, 0, 0);

// A4 portrait
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Pdf,
    Text,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Text => "txt",
        }
    }
}

/// Format-independent content of a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated: String,
    /// `(column, value)` for every non-blank field
    pub fields: Vec<(String, String)>,
    pub verdict: String,
    pub verdict_color: (u8, u8, u8),
    /// Present only when the prediction carried a probability
    pub probability: Option<String>,
}

impl ReportDocument {
    pub fn build(
        record: &CustomerRecord,
        result: &PredictionResult,
        generated_at: NaiveDateTime,
    ) -> Self {
        let verdict_color = match result.label {
            ChurnLabel::Churn => CHURN_COLOR,
            ChurnLabel::NoChurn => RETAIN_COLOR,
        };

        Self {
            title: REPORT_TITLE.to_string(),
            generated: format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
            fields: record
                .display_fields()
                .map(|(column, value)| (column.to_string(), value.to_string()))
                .collect(),
            verdict: format!("Prediction: {}", result.label.verdict()),
            verdict_color,
            probability: result
                .probability_percent()
                .map(|p| format!("Probability of churn: {}", p)),
        }
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec![
            self.title.clone(),
            self.generated.clone(),
            String::new(),
            "Customer Input:".to_string(),
        ];
        lines.extend(
            self.fields
                .iter()
                .map(|(column, value)| format!("{}: {}", column, value)),
        );
        lines.push(String::new());
        lines.push(self.verdict.clone());
        if let Some(probability) = &self.probability {
            lines.push(probability.clone());
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

/// `churn_report_<YYYYMMDD_HHMMSS>.<ext>`
///
/// Two reports rendered within the same second share a name.
pub fn report_filename(at: NaiveDateTime, format: ReportFormat) -> String {
    format!(
        "churn_report_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Render a report stamped with the current local time
pub fn render(
    record: &CustomerRecord,
    result: &PredictionResult,
    out_dir: &Path,
    format: ReportFormat,
) -> crate::Result<PathBuf> {
    render_at(record, result, out_dir, format, Local::now().naive_local())
}

/// Render a report for an explicit generation time
pub fn render_at(
    record: &CustomerRecord,
    result: &PredictionResult,
    out_dir: &Path,
    format: ReportFormat,
    generated_at: NaiveDateTime,
) -> crate::Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create report directory {}", out_dir.display()))?;

    let document = ReportDocument::build(record, result, generated_at);
    let path = out_dir.join(report_filename(generated_at, format));

    match format {
        ReportFormat::Pdf => write_pdf(&document, &path)?,
        ReportFormat::Text => fs::write(&path, document.to_text())
            .with_context(|| format!("failed to write report {}", path.display()))?,
    }

    info!("Report written to {}", path.display());
    Ok(path)
}

/// Writes lines top to bottom, starting a new page at the bottom margin
struct PageCursor<'a> {
    pdf: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageCursor<'_> {
    fn line(
        &mut self,
        text: &str,
        size: f32,
        font: &IndirectFontRef,
        color: (u8, u8, u8),
        centered: bool,
    ) {
        let height = size * PT_TO_MM * 1.6;
        if self.y - height < MARGIN_MM {
            let (page, layer) = self
                .pdf
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Report");
            self.layer = self.pdf.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        self.y -= height;

        let x = if centered {
            // Helvetica averages roughly half an em per glyph
            let width = text.chars().count() as f32 * size * 0.5 * PT_TO_MM;
            ((PAGE_WIDTH_MM - width) / 2.0).max(MARGIN_MM)
        } else {
            MARGIN_MM
        };

        let (r, g, b) = color;
        self.layer.set_fill_color(Color::Rgb(Rgb::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            None,
        )));
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

fn write_pdf(document: &ReportDocument, path: &Path) -> crate::Result<()> {
    let (pdf, page, layer) = PdfDocument::new(
        document.title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Report",
    );
    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("failed to load Helvetica: {:?}", e))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow!("failed to load Helvetica-Bold: {:?}", e))?;

    {
        let mut cursor = PageCursor {
            pdf: &pdf,
            layer: pdf.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        };

        cursor.line(&document.title, 16.0, &bold, TEXT_COLOR, true);
        cursor.gap(6.0);
        cursor.line(&document.generated, 11.0, &regular, TEXT_COLOR, false);
        cursor.gap(6.0);

        cursor.line("Customer Input:", 12.0, &bold, TEXT_COLOR, false);
        for (column, value) in &document.fields {
            cursor.line(&format!("{}: {}", column, value), 10.0, &regular, TEXT_COLOR, false);
        }

        cursor.gap(4.0);
        cursor.line(&document.verdict, 12.0, &bold, document.verdict_color, false);
        if let Some(probability) = &document.probability {
            cursor.line(probability, 10.0, &regular, TEXT_COLOR, false);
        }
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    pdf.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow!("failed to write PDF {}: {:?}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{build_record, CustomerFields};
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn churn(probability: Option<f64>) -> PredictionResult {
        PredictionResult {
            label: ChurnLabel::Churn,
            probability,
        }
    }

    #[test]
    fn test_document_lists_fields_and_verdict() {
        let record = build_record(&CustomerFields::default());
        let document = ReportDocument::build(&record, &churn(Some(0.7342)), at(14, 5, 9));

        assert_eq!(document.title, REPORT_TITLE);
        assert_eq!(document.generated, "Generated: 2024-03-09 14:05:09");
        assert_eq!(document.fields.len(), 19);
        assert!(document.fields.iter().all(|(column, _)| column != "customerID"));
        assert!(document
            .fields
            .contains(&("MonthlyCharges".to_string(), "50.00".to_string())));
        assert_eq!(document.verdict, "Prediction: LIKELY TO CHURN");
        assert_eq!(document.verdict_color, CHURN_COLOR);
        assert_eq!(
            document.probability.as_deref(),
            Some("Probability of churn: 73.42%")
        );
    }

    #[test]
    fn test_document_without_probability() {
        let record = build_record(&CustomerFields::default());
        let result = PredictionResult {
            label: ChurnLabel::NoChurn,
            probability: None,
        };
        let document = ReportDocument::build(&record, &result, at(9, 0, 0));

        assert_eq!(document.verdict, "Prediction: NOT LIKELY TO CHURN");
        assert_eq!(document.verdict_color, RETAIN_COLOR);
        assert_eq!(document.probability, None);

        let text = document.to_text();
        assert!(text.contains("Prediction: NOT LIKELY TO CHURN"));
        assert!(!text.contains("Probability of churn"));
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename(at(14, 5, 9), ReportFormat::Pdf),
            "churn_report_20240309_140509.pdf"
        );
        assert_eq!(
            report_filename(at(14, 5, 9), ReportFormat::Text),
            "churn_report_20240309_140509.txt"
        );
    }

    #[test]
    fn test_filenames_one_second_apart_sort_in_order() {
        let mut t = at(23, 59, 58);
        let mut previous = report_filename(t, ReportFormat::Pdf);
        for _ in 0..3 {
            t += Duration::seconds(1);
            let next = report_filename(t, ReportFormat::Pdf);
            assert!(next > previous, "{} should sort after {}", next, previous);
            previous = next;
        }
        // same-second collisions are accepted
        assert_eq!(
            report_filename(at(8, 0, 0), ReportFormat::Pdf),
            report_filename(at(8, 0, 0), ReportFormat::Pdf)
        );
    }

    #[test]
    fn test_render_text_report() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().join("reports");
        let fields = CustomerFields {
            customer_id: "3668-QPYBK".to_string(),
            ..CustomerFields::default()
        };
        let record = build_record(&fields);

        let path = render_at(&record, &churn(Some(0.5)), &out_dir, ReportFormat::Text, at(10, 0, 1))
            .unwrap();
        assert_eq!(path, out_dir.join("churn_report_20240309_100001.txt"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(REPORT_TITLE));
        assert!(text.contains("customerID: 3668-QPYBK"));
        assert!(text.contains("SeniorCitizen: 0"));
        assert!(text.contains("Contract: Month-to-month"));
        assert!(text.contains("Prediction: LIKELY TO CHURN"));
        assert!(text.contains("Probability of churn: 50.00%"));
    }

    #[test]
    fn test_render_pdf_report() {
        let dir = tempdir().unwrap();
        let record = build_record(&CustomerFields::default());

        let path = render(&record, &churn(None), dir.path(), ReportFormat::Pdf).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
