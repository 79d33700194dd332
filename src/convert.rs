//! Conversion entry points: PDF → [`Sheet`] → XLSX.
//!
//! [`convert`] runs the two extraction branches in order. The structured
//! branch wins as soon as the text layer yields a header plus at least one
//! data row; otherwise every page is rasterised and OCR'd and the text is
//! matched against the configured statement layouts. If neither branch
//! produces anything the conversion fails with
//! [`ConvertError::NoTabularData`].

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::model::{ExtractionSource, Sheet};
use crate::pipeline::{input, ocr, render, rows, tables, xlsx, Backends};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Counters collected during one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Non-blank rows returned by table detection.
    pub table_rows: usize,
    /// Pages sent to OCR (0 when the structured branch won).
    pub ocr_pages: usize,
    /// Characters of OCR text.
    pub ocr_chars: usize,
    /// Transaction lines recognised in the OCR text.
    pub transactions: usize,
    pub total_duration_ms: u64,
}

/// The result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub sheet: Sheet,
    pub source: ExtractionSource,
    pub stats: ConversionStats,
}

impl Conversion {
    /// Serialise the sheet as an XLSX workbook.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, ConvertError> {
        xlsx::to_xlsx_bytes(&self.sheet)
    }
}

/// Convert a PDF on disk into a normalised sheet.
///
/// Any backend failure aborts the conversion; there is no partial result.
pub async fn convert(
    pdf_path: &Path,
    config: &ConversionConfig,
    backends: &Backends,
) -> Result<Conversion, ConvertError> {
    let total_start = Instant::now();
    let mut stats = ConversionStats::default();
    info!("Starting conversion: {}", pdf_path.display());

    // ── Step 1: Structured tables ────────────────────────────────────────
    let table_rows = tables::extract_rows(Arc::clone(&backends.tables), pdf_path).await?;
    stats.table_rows = table_rows.len();

    if let Some(sheet) = Sheet::from_table_rows(table_rows) {
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Structured table found: {} data rows × {} columns",
            sheet.rows.len(),
            sheet.column_count()
        );
        return Ok(Conversion {
            sheet,
            source: ExtractionSource::Structured,
            stats,
        });
    }
    info!(
        "No usable table in text layer ({} rows), falling back to OCR",
        stats.table_rows
    );

    // ── Step 2: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let pages = render::render_document(Arc::clone(&backends.rasterizer), pdf_path).await?;
    stats.ocr_pages = pages.len();
    debug!(
        "Rendered {} pages in {}ms",
        pages.len(),
        render_start.elapsed().as_millis()
    );

    // ── Step 3: OCR ──────────────────────────────────────────────────────
    let text =
        ocr::recognize_pages(Arc::clone(&backends.ocr), pages, config.ocr_concurrency).await?;
    stats.ocr_chars = text.chars().count();

    // ── Step 4: Statement lines ──────────────────────────────────────────
    let records = rows::parse_rows(&text, &config.layouts);
    stats.transactions = records.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if records.is_empty() {
        info!("No statement lines recognised in OCR text");
        return Err(ConvertError::NoTabularData);
    }

    info!(
        "OCR recovered {} transactions from {} pages in {}ms",
        stats.transactions, stats.ocr_pages, stats.total_duration_ms
    );
    Ok(Conversion {
        sheet: Sheet::from_transactions(&records),
        source: ExtractionSource::Ocr,
        stats,
    })
}

/// Convert a local PDF and write the workbook to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    backends: &Backends,
) -> Result<Conversion, ConvertError> {
    let pdf_path = input::resolve_local(input_path.as_ref())?;
    let conversion = convert(&pdf_path, config, backends).await?;
    let bytes = conversion.to_xlsx()?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(conversion)
}
