//! Structured extraction: recover a table per page from the PDF text layer.
//!
//! pdfium reports the text layer as positioned segments. Segments are
//! clustered into lines by vertical alignment, consecutive lines with a
//! stable number of cells form a candidate region, and the region with the
//! most cells on a page is taken as that page's table.
//!
//! A line with too few cells that sits inside an open region, directly under
//! the previous line, is a wrapped cell (typically a long narration) and is
//! folded into the row above instead of ending the region.
//!
//! Columns are the horizontal bands covered by the region's text, split
//! wherever a vertical strip of whitespace runs through every line. Left,
//! right and centre aligned columns all come out as one band each.
//!
//! Rows from all pages are concatenated with no page or table separator.
//! Rows whose cells are all blank are dropped.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::model::Row;
use crate::pdfium;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Recovers table rows from a PDF's embedded text.
pub trait TableExtractor: Send + Sync {
    /// Extract the detected table rows of every page, in page order.
    ///
    /// An empty result means no table was found. Errors opening the
    /// document propagate.
    fn extract_rows(&self, pdf_path: &Path) -> Result<Vec<Row>, ConvertError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Run a [`TableExtractor`] on the blocking thread pool.
pub async fn extract_rows(
    extractor: Arc<dyn TableExtractor>,
    pdf_path: &Path,
) -> Result<Vec<Row>, ConvertError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || extractor.extract_rows(&path))
        .await
        .map_err(|e| ConvertError::Internal(format!("Table extraction task panicked: {}", e)))?
}

/// Table detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDetectorConfig {
    /// Cells whose vertical centres are within this distance share a line (points).
    pub row_tolerance: f32,
    /// Horizontal gaps up to this width do not separate columns (points).
    pub col_tolerance: f32,
    /// Minimum consecutive rows for a region to count as a table.
    pub min_rows: usize,
    /// Minimum cells per line for a line to start a table row.
    pub min_cols: usize,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            col_tolerance: 4.0,
            min_rows: 2,
            min_cols: 2,
        }
    }
}

/// A positioned run of text, in top-left-origin page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub text: String,
    /// Left coordinate (points)
    pub x: f32,
    /// Top coordinate (points)
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextCell {
    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// `true` when every cell is empty or whitespace.
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Detect one table per page and concatenate their non-blank rows.
pub fn detect_tables<I>(pages: I, config: &TableDetectorConfig) -> Vec<Row>
where
    I: IntoIterator<Item = Vec<TextCell>>,
{
    let mut rows = Vec::new();
    let mut tables = 0usize;

    for (idx, cells) in pages.into_iter().enumerate() {
        debug!("Page {}: {} text segments", idx + 1, cells.len());
        if let Some(table) = detect_table(&cells, config) {
            tables += 1;
            rows.extend(table.into_iter().filter(|row| !is_blank_row(row)));
        }
    }

    info!("Detected {} table(s), {} rows", tables, rows.len());
    rows
}

/// Detect the largest table among `cells` (one page) and return its rows.
pub fn detect_table(cells: &[TextCell], config: &TableDetectorConfig) -> Option<Vec<Row>> {
    if cells.is_empty() {
        return None;
    }

    let lines = cluster_lines(cells, config);
    let regions = find_table_regions(&lines, config);

    regions
        .iter()
        .max_by_key(|region| region.iter().map(Vec::len).sum::<usize>())
        .and_then(|region| build_table(region, config))
}

/// Cluster cells into lines based on vertical alignment, top to bottom.
fn cluster_lines<'a>(cells: &'a [TextCell], config: &TableDetectorConfig) -> Vec<Vec<&'a TextCell>> {
    let mut sorted: Vec<&TextCell> = cells.iter().collect();
    sorted.sort_by(|a, b| {
        a.center_y()
            .partial_cmp(&b.center_y())
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<Vec<&TextCell>> = Vec::new();
    for cell in sorted {
        match lines.last_mut() {
            Some(line)
                if line
                    .first()
                    .is_some_and(|first| (cell.center_y() - first.center_y()).abs() <= config.row_tolerance) =>
            {
                line.push(cell);
            }
            _ => lines.push(vec![cell]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    }

    lines
}

/// Vertical centre and tallest cell of a line.
fn line_metrics(line: &[&TextCell]) -> (f32, f32) {
    let center = line.first().map_or(0.0, |c| c.center_y());
    let height = line.iter().map(|c| c.height).fold(0.0, f32::max);
    (center, height)
}

/// Region under construction in [`find_table_regions`].
#[derive(Default)]
struct OpenRegion<'a> {
    rows: Vec<Vec<&'a TextCell>>,
    expected_cols: Option<usize>,
    /// Centre and height of the last physical line taken in.
    last_line: Option<(f32, f32)>,
    /// Largest centre-to-centre distance between consecutive lines.
    pitch: f32,
    /// Leftmost and rightmost edge of the text taken in.
    span: Option<(f32, f32)>,
}

impl<'a> OpenRegion<'a> {
    fn take_line(&mut self, line: &[&'a TextCell]) {
        let (center, height) = line_metrics(line);
        if let Some((prev, _)) = self.last_line {
            self.pitch = self.pitch.max(center - prev);
        }
        self.last_line = Some((center, height));

        for cell in line {
            self.span = Some(match self.span {
                Some((left, right)) => (left.min(cell.x), right.max(cell.right())),
                None => (cell.x, cell.right()),
            });
        }
    }

    fn push_row(&mut self, line: &[&'a TextCell]) {
        self.take_line(line);
        self.rows.push(line.to_vec());
    }

    /// A short line directly below the last one and within the region's
    /// horizontal extent continues the previous row.
    fn continues_row(&self, line: &[&TextCell], config: &TableDetectorConfig) -> bool {
        let (Some((prev_center, prev_height)), Some((left, right))) = (self.last_line, self.span)
        else {
            return false;
        };

        let (center, height) = line_metrics(line);
        let max_step = self.pitch.max(2.0 * prev_height.max(height)) + config.row_tolerance;
        let below = center > prev_center && center - prev_center <= max_step;
        let inside = line.iter().all(|c| {
            c.x >= left - config.col_tolerance && c.right() <= right + config.col_tolerance
        });
        below && inside
    }

    fn fold_into_last_row(&mut self, line: &[&'a TextCell]) {
        self.take_line(line);
        if let Some(row) = self.rows.last_mut() {
            row.extend_from_slice(line);
        }
    }

    /// Hand the rows over if they form a table, and reset.
    fn close(&mut self, regions: &mut Vec<Vec<Vec<&'a TextCell>>>, config: &TableDetectorConfig) {
        let region = std::mem::take(self);
        if region.rows.len() >= config.min_rows {
            regions.push(region.rows);
        }
    }
}

/// Find runs of consecutive lines with similar cell counts.
fn find_table_regions<'a>(
    lines: &[Vec<&'a TextCell>],
    config: &TableDetectorConfig,
) -> Vec<Vec<Vec<&'a TextCell>>> {
    let mut regions = Vec::new();
    let mut current = OpenRegion::default();

    for line in lines {
        let num_cells = line.len();

        if num_cells < config.min_cols {
            if current.continues_row(line, config) {
                current.fold_into_last_row(line);
            } else {
                // Headings and paragraphs end a region.
                current.close(&mut regions, config);
            }
            continue;
        }

        match current.expected_cols {
            // A missing or merged cell is tolerated.
            Some(exp) if num_cells.abs_diff(exp) <= 1 => {}
            Some(_) => {
                current.close(&mut regions, config);
                current.expected_cols = Some(num_cells);
            }
            None => current.expected_cols = Some(num_cells),
        }
        current.push_row(line);
    }

    current.close(&mut regions, config);
    regions
}

/// Lay a region's cells out on its column bands.
fn build_table(region: &[Vec<&TextCell>], config: &TableDetectorConfig) -> Option<Vec<Row>> {
    let bands = column_bands(region, config);
    if bands.len() < config.min_cols {
        return None;
    }

    let table = region
        .iter()
        .map(|row| {
            let mut cells = vec![String::new(); bands.len()];
            for cell in row {
                let target = &mut cells[column_index(cell, &bands)];
                if !target.is_empty() {
                    target.push(' ');
                }
                target.push_str(&cell.text);
            }
            cells
        })
        .collect();

    Some(table)
}

/// Horizontal extents covered by text, merged across all lines of the
/// region. Gaps wider than `col_tolerance` separate columns.
fn column_bands(region: &[Vec<&TextCell>], config: &TableDetectorConfig) -> Vec<(f32, f32)> {
    let mut extents: Vec<(f32, f32)> = region
        .iter()
        .flat_map(|row| row.iter().map(|c| (c.x, c.right())))
        .collect();
    extents.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut bands: Vec<(f32, f32)> = Vec::new();
    for (left, right) in extents {
        match bands.last_mut() {
            Some((_, end)) if left - *end <= config.col_tolerance => *end = end.max(right),
            _ => bands.push((left, right)),
        }
    }
    bands
}

fn column_index(cell: &TextCell, bands: &[(f32, f32)]) -> usize {
    bands
        .iter()
        .position(|&(left, right)| cell.x >= left && cell.x <= right)
        .unwrap_or(bands.len().saturating_sub(1))
}

// ── pdfium backend ───────────────────────────────────────────────────────────

/// Table extraction over pdfium's text segments.
pub struct PdfiumTableExtractor {
    library_path: Option<PathBuf>,
    password: Option<String>,
    detector: TableDetectorConfig,
}

impl PdfiumTableExtractor {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            library_path: config.pdfium_library_path.clone(),
            password: config.password.clone(),
            detector: config.table.clone(),
        }
    }
}

impl TableExtractor for PdfiumTableExtractor {
    fn extract_rows(&self, pdf_path: &Path) -> Result<Vec<Row>, ConvertError> {
        let pdfium = pdfium::bind(self.library_path.as_deref())?;
        let document = pdfium::open_document(&pdfium, pdf_path, self.password.as_deref())?;

        let pages = document
            .pages()
            .iter()
            .enumerate()
            .map(|(idx, page)| page_cells(&page, idx + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(detect_tables(pages, &self.detector))
    }

    fn backend_name(&self) -> &str {
        "pdfium-text"
    }
}

/// Text segments of one page, converted to top-left origin.
fn page_cells(page: &PdfPage, page_num: usize) -> Result<Vec<TextCell>, ConvertError> {
    let page_height = page.height().value;
    let text = page.text().map_err(|e| ConvertError::TextLayerFailed {
        page: page_num,
        detail: format!("{:?}", e),
    })?;

    let mut cells = Vec::new();
    for segment in text.segments().iter() {
        let content = segment.text();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let bounds = segment.bounds();
        cells.push(TextCell {
            text: content.to_string(),
            x: bounds.left().value,
            y: page_height - bounds.top().value,
            width: bounds.right().value - bounds.left().value,
            height: bounds.top().value - bounds.bottom().value,
        });
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, x: f32, y: f32, width: f32) -> TextCell {
        TextCell {
            text: text.to_string(),
            x,
            y,
            width,
            height: 10.0,
        }
    }

    fn texts(rows: &[Row]) -> Vec<Vec<&str>> {
        rows.iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn detects_simple_grid() {
        let cells = vec![
            cell("Date", 50.0, 100.0, 30.0),
            cell("Amt", 200.0, 100.0, 20.0),
            cell("01-01-2024", 50.0, 120.0, 60.0),
            cell("100.00", 200.0, 120.0, 35.0),
            cell("02-01-2024", 50.0, 140.0, 60.0),
            cell("5.00", 200.0, 140.0, 25.0),
        ];

        let rows = detect_table(&cells, &TableDetectorConfig::default()).unwrap();
        assert_eq!(
            texts(&rows),
            vec![
                vec!["Date", "Amt"],
                vec!["01-01-2024", "100.00"],
                vec!["02-01-2024", "5.00"],
            ]
        );
    }

    #[test]
    fn cell_order_within_row_follows_x() {
        let cells = vec![
            cell("Amt", 200.0, 100.0, 20.0),
            cell("Date", 50.0, 101.0, 30.0),
            cell("9.00", 200.0, 121.0, 20.0),
            cell("03-01-2024", 50.0, 120.0, 60.0),
        ];
        let rows = detect_table(&cells, &TableDetectorConfig::default()).unwrap();
        assert_eq!(texts(&rows)[0], vec!["Date", "Amt"]);
        assert_eq!(texts(&rows)[1], vec!["03-01-2024", "9.00"]);
    }

    #[test]
    fn missing_cell_leaves_blank() {
        let cells = vec![
            cell("Date", 50.0, 100.0, 30.0),
            cell("Narration", 120.0, 100.0, 50.0),
            cell("Amt", 300.0, 100.0, 20.0),
            cell("01-01-2024", 50.0, 120.0, 60.0),
            cell("100.00", 300.0, 120.0, 35.0),
        ];
        let rows = detect_table(&cells, &TableDetectorConfig::default()).unwrap();
        assert_eq!(texts(&rows)[1], vec!["01-01-2024", "", "100.00"]);
    }

    #[test]
    fn prose_is_not_a_table() {
        let cells = vec![
            cell("Statement of account", 50.0, 40.0, 200.0),
            cell("Thank you for banking with us", 50.0, 60.0, 200.0),
        ];
        assert!(detect_table(&cells, &TableDetectorConfig::default()).is_none());
        assert!(detect_table(&[], &TableDetectorConfig::default()).is_none());
    }

    #[test]
    fn largest_region_wins() {
        let cells = vec![
            // small key/value block
            cell("Account", 50.0, 20.0, 40.0),
            cell("1234", 200.0, 20.0, 20.0),
            cell("Branch", 50.0, 35.0, 40.0),
            cell("Main", 200.0, 35.0, 20.0),
            // heading breaks the region
            cell("Transactions", 50.0, 60.0, 80.0),
            // three-column table
            cell("Date", 50.0, 80.0, 30.0),
            cell("Narration", 120.0, 80.0, 50.0),
            cell("Amt", 300.0, 80.0, 20.0),
            cell("01-01-2024", 50.0, 100.0, 60.0),
            cell("ATM", 120.0, 100.0, 20.0),
            cell("10.00", 300.0, 100.0, 30.0),
            cell("02-01-2024", 50.0, 120.0, 60.0),
            cell("POS", 120.0, 120.0, 20.0),
            cell("20.00", 300.0, 120.0, 30.0),
        ];
        let rows = detect_table(&cells, &TableDetectorConfig::default()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(texts(&rows)[0], vec!["Date", "Narration", "Amt"]);
    }

    #[test]
    fn right_aligned_amounts_share_a_column() {
        // Amounts end at x=300; their left edges differ with their length.
        let cells = vec![
            cell("Date", 50.0, 100.0, 30.0),
            cell("Amount", 260.0, 100.0, 40.0),
            cell("01-01-2024", 50.0, 120.0, 60.0),
            cell("1,20,000.00", 245.0, 120.0, 55.0),
            cell("02-01-2024", 50.0, 140.0, 60.0),
            cell("100.00", 270.0, 140.0, 30.0),
            cell("03-01-2024", 50.0, 160.0, 60.0),
            cell("5.00", 280.0, 160.0, 20.0),
        ];
        let rows = detect_table(&cells, &TableDetectorConfig::default()).unwrap();
        assert_eq!(
            texts(&rows),
            vec![
                vec!["Date", "Amount"],
                vec!["01-01-2024", "1,20,000.00"],
                vec!["02-01-2024", "100.00"],
                vec!["03-01-2024", "5.00"],
            ]
        );
    }

    fn narration_table() -> Vec<TextCell> {
        vec![
            cell("Date", 50.0, 100.0, 30.0),
            cell("Narration", 120.0, 100.0, 50.0),
            cell("Amount", 290.0, 100.0, 40.0),
            cell("01-01-2024", 50.0, 120.0, 60.0),
            cell("NEFT ACME PAYROLL", 120.0, 120.0, 90.0),
            cell("100.00", 300.0, 120.0, 30.0),
            // wrapped narration
            cell("JAN SALARY", 120.0, 140.0, 50.0),
            cell("02-01-2024", 50.0, 160.0, 60.0),
            cell("ATM", 120.0, 160.0, 20.0),
            cell("5.00", 310.0, 160.0, 20.0),
            cell("03-01-2024", 50.0, 180.0, 60.0),
            cell("POS", 120.0, 180.0, 20.0),
            cell("7.00", 310.0, 180.0, 20.0),
        ]
    }

    #[test]
    fn wrapped_narration_joins_its_row() {
        let rows = detect_table(&narration_table(), &TableDetectorConfig::default()).unwrap();
        assert_eq!(
            texts(&rows),
            vec![
                vec!["Date", "Narration", "Amount"],
                vec!["01-01-2024", "NEFT ACME PAYROLL JAN SALARY", "100.00"],
                vec!["02-01-2024", "ATM", "5.00"],
                vec!["03-01-2024", "POS", "7.00"],
            ]
        );
    }

    #[test]
    fn footer_below_table_is_left_out() {
        let mut cells = narration_table();
        cells.push(cell("Page 1 of 2", 120.0, 260.0, 60.0));
        let rows = detect_table(&cells, &TableDetectorConfig::default()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(texts(&rows)[3], vec!["03-01-2024", "POS", "7.00"]);
    }

    #[test]
    fn pages_concatenate_with_repeated_header() {
        let page_one = narration_table();
        let page_two = vec![
            cell("Date", 50.0, 60.0, 30.0),
            cell("Narration", 120.0, 60.0, 50.0),
            cell("Amount", 290.0, 60.0, 40.0),
            cell("04-01-2024", 50.0, 80.0, 60.0),
            cell("UPI/REFUND/ACME STORES", 120.0, 80.0, 120.0),
            cell("1,250.00", 290.0, 80.0, 40.0),
        ];

        let rows = detect_tables(vec![page_one, Vec::new(), page_two], &TableDetectorConfig::default());
        assert_eq!(
            texts(&rows),
            vec![
                vec!["Date", "Narration", "Amount"],
                vec!["01-01-2024", "NEFT ACME PAYROLL JAN SALARY", "100.00"],
                vec!["02-01-2024", "ATM", "5.00"],
                vec!["03-01-2024", "POS", "7.00"],
                vec!["Date", "Narration", "Amount"],
                vec!["04-01-2024", "UPI/REFUND/ACME STORES", "1,250.00"],
            ]
        );
    }

    #[test]
    fn blank_rows() {
        assert!(is_blank_row(&["".to_string(), "  ".to_string()]));
        assert!(is_blank_row(&[]));
        assert!(!is_blank_row(&["".to_string(), "x".to_string()]));
    }

    struct FixedRows(Vec<Row>);

    impl TableExtractor for FixedRows {
        fn extract_rows(&self, _pdf_path: &Path) -> Result<Vec<Row>, ConvertError> {
            Ok(self.0.clone())
        }

        fn backend_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn extract_rows_runs_backend() {
        let extractor: Arc<dyn TableExtractor> =
            Arc::new(FixedRows(vec![vec!["a".into(), "b".into()]]));
        let rows = extract_rows(extractor, Path::new("statement.pdf"))
            .await
            .unwrap();
        assert_eq!(rows, vec![vec!["a".to_string(), "b".to_string()]]);
    }
}
