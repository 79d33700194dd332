//! # statement2xlsx
//!
//! Convert PDF bank statements into single-sheet Excel workbooks.
//!
//! Statements that carry a text layer are read directly: pdfium reports the
//! positioned text, a layout-based detector recovers the table, and the
//! first row becomes the header. Scanned statements have no usable text, so
//! every page is rasterised, recognised with tesseract, and matched line by
//! line against known statement layouts.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input   stage the upload / check a local path
//!  ├─ 2. Tables  pdfium text layer → detected table rows
//!  │             (header + ≥1 data row? done)
//!  ├─ 3. Render  rasterise pages via pdfium (spawn_blocking)
//!  ├─ 4. OCR     PNG → tesseract, pages in order
//!  ├─ 5. Rows    statement layouts → Date / Narration / Amount / Balance
//!  └─ 6. XLSX    one worksheet, columns sized to content
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use statement2xlsx::{convert_to_file, Backends, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let backends = Backends::from_config(&config);
//!     let conversion = convert_to_file("statement.pdf", "statement.xlsx", &config, &backends).await?;
//!     eprintln!("{} rows via {}", conversion.sheet.rows.len(), conversion.source);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `statement2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Runtime requirements
//!
//! * a pdfium shared library (working directory, system path, or
//!   [`ConversionConfig::pdfium_library_path`])
//! * the `tesseract` executable, for scanned statements only

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod pdfium;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ServerConfig};
pub use convert::{convert, convert_to_file, Conversion, ConversionStats};
pub use error::ConvertError;
pub use model::{EntryType, ExtractionSource, Row, Sheet, TransactionRecord, TRANSACTION_HEADERS};
pub use pipeline::rows::StatementLayout;
pub use pipeline::Backends;
pub use server::{router, serve, AppState};
