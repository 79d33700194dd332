//! Error types for the statement2xlsx library.
//!
//! Every failure in the conversion pipeline is a [`ConvertError`]. There is
//! no partial-result type: a statement either converts completely or the
//! request fails. Two families matter to callers:
//!
//! * **Client errors**: the upload itself is unusable (no file part, wrong
//!   extension, malformed multipart body) or the document yielded no rows.
//!   [`ConvertError::is_client_error`] returns `true` for these and the HTTP
//!   layer answers `400`.
//!
//! * **Everything else**: pdfium could not open or render the document,
//!   the OCR engine failed, the workbook could not be written. The HTTP layer
//!   answers `500` and passes the `Display` text through verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the statement2xlsx library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The multipart body carried no `file` field.
    #[error("No file part")]
    NoFilePart,

    /// The filename was empty or did not end in `.pdf`.
    #[error("Please upload a valid PDF file")]
    InvalidUpload { filename: String },

    /// The multipart body could not be read.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// Neither table extraction nor OCR produced any rows.
    #[error("No tabular data found")]
    NoTabularData,

    // ── Local input errors ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set --pdfium-lib (or STATEMENT2XLSX_PDFIUM_LIB) to the directory or file of an existing libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not load the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextLayerFailed { page: usize, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be encoded as PNG for the OCR engine.
    #[error("Image encoding failed for page {page}: {source}")]
    ImageEncoding {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR executable could not be spawned.
    #[error("OCR engine '{binary}' not found. Install tesseract (apt install tesseract-ocr / brew install tesseract) or set --tesseract")]
    OcrEngineNotFound { binary: PathBuf },

    /// The OCR engine ran but failed on a page.
    #[error("OCR failed on page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    // ── Layout errors ─────────────────────────────────────────────────────
    /// A statement layout pattern is not a usable regex.
    #[error("Invalid statement layout '{name}': {reason}")]
    InvalidLayout { name: String, reason: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter rejected the workbook.
    #[error("Failed to build spreadsheet: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    /// Could not create or write the output workbook.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// `true` for errors caused by the upload rather than by the service.
    ///
    /// `NoTabularData` counts as a client error: the document was processed
    /// successfully but carried nothing to convert.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConvertError::NoFilePart
                | ConvertError::InvalidUpload { .. }
                | ConvertError::MalformedUpload(_)
                | ConvertError::NoTabularData
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_fixed() {
        assert_eq!(ConvertError::NoFilePart.to_string(), "No file part");
        assert_eq!(
            ConvertError::InvalidUpload {
                filename: "notes.txt".into()
            }
            .to_string(),
            "Please upload a valid PDF file"
        );
        assert_eq!(
            ConvertError::NoTabularData.to_string(),
            "No tabular data found"
        );
    }

    #[test]
    fn classification() {
        assert!(ConvertError::NoFilePart.is_client_error());
        assert!(ConvertError::NoTabularData.is_client_error());
        assert!(!ConvertError::OcrFailed {
            page: 2,
            detail: "boom".into()
        }
        .is_client_error());
        assert!(!ConvertError::Internal("x".into()).is_client_error());
    }

    #[test]
    fn ocr_failure_display() {
        let e = ConvertError::OcrFailed {
            page: 3,
            detail: "exit status 1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("exit status 1"));
    }
}
