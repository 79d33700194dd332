//! Pipeline stages for PDF-to-spreadsheet conversion.
//!
//! Each submodule implements exactly one step. The three stages that touch
//! external engines sit behind `Send + Sync` traits so the orchestrator in
//! [`crate::convert`] can be driven by mocks in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tables ─────────────────────────────────▶ xlsx
//!   │          │ (fewer than 2 rows)                   ▲
//!   │          ▼                                       │
//!   │       render ──▶ encode ──▶ ocr ──▶ rows ────────┘
//! (upload)  (pdfium)   (PNG)   (tesseract) (layouts)
//! ```
//!
//! 1. [`input`]: validate and stage uploads, or resolve a local path
//! 2. [`tables`]: layout-based table detection over the text layer
//! 3. [`render`]: rasterise every page; pdfium is not async-safe, so this
//!    runs in `spawn_blocking`
//! 4. [`encode`]: PNG-encode each page for the OCR engine
//! 5. [`ocr`]: recognise text page by page, reassembled in page order
//! 6. [`rows`]: match statement line layouts against the OCR text
//! 7. [`xlsx`]: write the single-sheet workbook with auto-sized columns

pub mod encode;
pub mod input;
pub mod ocr;
pub mod render;
pub mod rows;
pub mod tables;
pub mod xlsx;

use crate::config::ConversionConfig;
use ocr::{OcrEngine, TesseractCli};
use render::{PageRasterizer, PdfiumRasterizer};
use std::fmt;
use std::sync::Arc;
use tables::{PdfiumTableExtractor, TableExtractor};

/// The engines a conversion runs against.
#[derive(Clone)]
pub struct Backends {
    pub tables: Arc<dyn TableExtractor>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl Backends {
    /// pdfium for tables and rendering, the tesseract CLI for OCR.
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            tables: Arc::new(PdfiumTableExtractor::new(config)),
            rasterizer: Arc::new(PdfiumRasterizer::new(config)),
            ocr: Arc::new(TesseractCli::new(config)),
        }
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("tables", &self.tables.backend_name())
            .field("rasterizer", &self.rasterizer.backend_name())
            .field("ocr", &self.ocr.backend_name())
            .finish()
    }
}
