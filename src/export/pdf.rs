use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use genpdf::elements::{Image as PdfImage, PageBreak, Paragraph};
use genpdf::style::Style;
use genpdf::{Document, Element as _, Margins, SimplePageDecorator, Size};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use tempfile::NamedTempFile;

use super::pagination::PageLayout;
use crate::error::ExportError;
use crate::models::Student;
use crate::render::ReportView;

const DEFAULT_FONT_FAMILY: &str = "LiberationSans";
const TITLE_FONT_SIZE: u8 = 18;
const DATE_FONT_SIZE: u8 = 10;

/// Produces a bitmap of the rendered report. Implemented by whatever owns
/// the visual surface.
pub trait Rasterizer {
    fn rasterize(
        &self,
        view: &ReportView,
    ) -> impl Future<Output = Result<DynamicImage, ExportError>> + Send;
}

/// A snapshot already captured to disk by the UI layer.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Rasterizer for SnapshotFile {
    async fn rasterize(&self, view: &ReportView) -> Result<DynamicImage, ExportError> {
        tracing::debug!(
            path = %self.path.display(),
            entries = view.displayed_entries(),
            "loading report snapshot"
        );
        let bytes = tokio::fs::read(&self.path).await?;
        image::load_from_memory(&bytes).map_err(|err| {
            ExportError::Rasterize(format!(
                "{} is not a readable image: {err}",
                self.path.display()
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct FontConfig {
    pub dir: PathBuf,
    pub family: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./fonts"),
            family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub pages: usize,
    pub bytes: Vec<u8>,
}

pub fn document_file_name(student: &Student) -> String {
    format!("Report_{}_{}.pdf", student.first_name, student.last_name)
}

/// Lays the snapshot out on letter pages: scaled to the content width, the
/// title block on page one, and one vertical slice of the image per page.
pub fn export_to_document(
    snapshot: &DynamicImage,
    student: &Student,
    generated: NaiveDate,
    layout: &PageLayout,
    fonts: &FontConfig,
) -> Result<ExportedDocument, ExportError> {
    let (width, height) = snapshot.dimensions();
    let plan = layout.plan(width, height)?;
    let rows = plan.pixel_rows(width, height);
    let dpi = f64::from(width) * 25.4 / plan.content_width;

    let mut doc = configure_document(student, layout, fonts)?;
    doc.push(
        Paragraph::new(format!(
            "Report for: {} {}",
            student.first_name, student.last_name
        ))
        .styled(Style::new().bold().with_font_size(TITLE_FONT_SIZE)),
    );
    doc.push(
        Paragraph::new(format!(
            "Generated: {}/{}/{}",
            generated.month(),
            generated.day(),
            generated.year()
        ))
        .styled(Style::new().with_font_size(DATE_FONT_SIZE)),
    );

    // Keep the slice files alive until the document has rendered.
    let mut slices: Vec<NamedTempFile> = Vec::with_capacity(rows.len());
    for (index, &(top, rows_high)) in rows.iter().enumerate() {
        if index > 0 {
            doc.push(PageBreak::new());
        }
        if rows_high == 0 {
            continue;
        }
        let slice = write_slice(snapshot, top, rows_high)?;
        let mut element = PdfImage::from_path(slice.path())?;
        element.set_dpi(dpi);
        doc.push(element);
        slices.push(slice);
    }

    let mut bytes = Vec::new();
    doc.render(&mut bytes)?;
    tracing::info!(
        student = %student.full_name(),
        pages = plan.pages.len(),
        size = bytes.len(),
        "report document rendered"
    );

    Ok(ExportedDocument {
        file_name: document_file_name(student),
        pages: plan.pages.len(),
        bytes,
    })
}

/// The page the layout math planned for, not genpdf's rounded presets.
fn paper_size(layout: &PageLayout) -> Size {
    Size::new(layout.page_width, layout.page_height)
}

fn configure_document(
    student: &Student,
    layout: &PageLayout,
    fonts: &FontConfig,
) -> Result<Document, ExportError> {
    let family = load_font(&fonts.dir, &fonts.family)?;
    let mut doc = Document::new(family);
    doc.set_title(format!("Report for {}", student.full_name()));
    doc.set_paper_size(paper_size(layout));

    let margin = layout.margin;
    let mut decorator = SimplePageDecorator::new();
    // 1 mm of bottom slack absorbs pixel rounding in the slice heights.
    decorator.set_margins(Margins::trbl(margin, margin, margin - 1.0, margin));
    doc.set_page_decorator(decorator);
    Ok(doc)
}

fn load_font(
    dir: &Path,
    family: &str,
) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>, ExportError> {
    match genpdf::fonts::from_files(dir, family, None) {
        Ok(fonts) => Ok(fonts),
        Err(err) if family != DEFAULT_FONT_FAMILY => {
            tracing::warn!(family, error = %err, "font family unavailable, using {DEFAULT_FONT_FAMILY}");
            Ok(genpdf::fonts::from_files(dir, DEFAULT_FONT_FAMILY, None)?)
        }
        Err(err) => Err(err.into()),
    }
}

/// PNG of snapshot rows `top..top + height`, alpha flattened onto white.
fn write_slice(snapshot: &DynamicImage, top: u32, height: u32) -> Result<NamedTempFile, ExportError> {
    let cropped = snapshot.crop_imm(0, top, snapshot.width(), height).to_rgba8();
    let mut background = RgbaImage::from_pixel(
        cropped.width(),
        cropped.height(),
        Rgba([255, 255, 255, 255]),
    );
    image::imageops::overlay(&mut background, &cropped, 0, 0);
    let rgb = DynamicImage::ImageRgba8(background).to_rgb8();

    let file = tempfile::Builder::new().suffix(".png").tempfile()?;
    rgb.save_with_format(file.path(), ImageFormat::Png)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pagination::PageLayout;

    fn student() -> Student {
        Student {
            student_id: "S1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            grade_level: "4".to_string(),
            active: true,
        }
    }

    #[test]
    fn file_name_uses_student_name() {
        assert_eq!(document_file_name(&student()), "Report_Ada_Lovelace.pdf");
    }

    #[test]
    fn paper_matches_planned_letter_page() {
        let paper = paper_size(&PageLayout::default());
        assert_eq!(paper.width, genpdf::Mm::from(215.9));
        assert_eq!(paper.height, genpdf::Mm::from(279.4));
    }

    #[test]
    fn slices_are_flattened_pngs() {
        let snapshot = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            20,
            50,
            Rgba([0, 0, 0, 0]),
        ));

        let slice = write_slice(&snapshot, 10, 25).unwrap();
        let decoded = image::open(slice.path()).unwrap().to_rgb8();

        assert_eq!(decoded.dimensions(), (20, 25));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn empty_snapshot_fails_before_fonts_load() {
        let snapshot = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        let result = export_to_document(
            &snapshot,
            &student(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            &PageLayout::default(),
            &FontConfig::default(),
        );
        assert!(matches!(result, Err(ExportError::EmptySnapshot { .. })));
    }

    #[tokio::test]
    async fn snapshot_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let rasterizer = SnapshotFile::new(dir.path().join("missing.png"));

        let result = rasterizer.rasterize(&ReportView::Empty).await;

        assert!(matches!(result, Err(ExportError::Io(_))));
    }

    #[tokio::test]
    async fn snapshot_file_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.png");
        std::fs::write(&path, b"not a png").unwrap();

        let result = SnapshotFile::new(&path).rasterize(&ReportView::Empty).await;

        assert!(matches!(result, Err(ExportError::Rasterize(_))));
    }

    #[tokio::test]
    async fn snapshot_file_loads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.png");
        RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let image = SnapshotFile::new(&path)
            .rasterize(&ReportView::Empty)
            .await
            .unwrap();

        assert_eq!(image.dimensions(), (8, 4));
    }
}
