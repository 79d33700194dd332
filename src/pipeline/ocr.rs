//! OCR fallback: recognise text on rasterised pages.
//!
//! Pages are encoded and recognised independently (up to
//! `ocr_concurrency` at a time on the blocking pool) and the recognised
//! text is reassembled strictly in page order. Every page's text ends with a
//! line break before the next page is appended, so the last line of one page
//! can never run into the first line of the next.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::pipeline::encode;
use futures::stream::{self, StreamExt, TryStreamExt};
use image::DynamicImage;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

/// A text recognition engine.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text of one PNG-encoded page (1-indexed `page`).
    fn recognize(&self, page: usize, png: &[u8]) -> Result<String, ConvertError>;

    /// Name of this OCR backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Recognise every page and concatenate the text in page order.
pub async fn recognize_pages(
    engine: Arc<dyn OcrEngine>,
    pages: Vec<DynamicImage>,
    concurrency: usize,
) -> Result<String, ConvertError> {
    let total = pages.len();
    let texts: Vec<String> = stream::iter(pages.into_iter().enumerate().map(|(idx, image)| {
        let engine = Arc::clone(&engine);
        async move {
            tokio::task::spawn_blocking(move || recognize_page(engine.as_ref(), idx + 1, &image))
                .await
                .map_err(|e| ConvertError::Internal(format!("OCR task panicked: {}", e)))?
        }
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await?;

    let text = join_pages(&texts);
    info!("OCR recognised {} chars from {} pages", text.len(), total);
    Ok(text)
}

fn recognize_page(
    engine: &dyn OcrEngine,
    page: usize,
    image: &DynamicImage,
) -> Result<String, ConvertError> {
    let png = encode::encode_png(image).map_err(|source| ConvertError::ImageEncoding { page, source })?;
    let text = engine.recognize(page, &png)?;
    debug!("Page {}: {} chars recognised", page, text.len());
    Ok(text)
}

/// Concatenate page texts, terminating each page with a line break.
pub fn join_pages(pages: &[String]) -> String {
    let mut out = String::with_capacity(pages.iter().map(|p| p.len() + 1).sum());
    for text in pages {
        out.push_str(text);
        if !text.is_empty() && !text.ends_with(crate::pipeline::rows::is_line_break) {
            out.push('\n');
        }
    }
    out
}

// ── tesseract backend ────────────────────────────────────────────────────────

/// OCR via the `tesseract` command-line tool.
///
/// Each page is written to a temporary PNG and recognised with
/// `tesseract <png> stdout -l <lang>`.
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
}

impl TesseractCli {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.ocr_language.clone(),
        }
    }

    /// Check if the tesseract binary can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, page: usize, png: &[u8]) -> Result<String, ConvertError> {
        let failed = |detail: String| ConvertError::OcrFailed { page, detail };

        let mut tmpfile = tempfile::Builder::new()
            .prefix("statement-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| failed(e.to_string()))?;
        tmpfile.write_all(png).map_err(|e| failed(e.to_string()))?;
        tmpfile.flush().map_err(|e| failed(e.to_string()))?;

        let output = Command::new(&self.binary)
            .arg(tmpfile.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConvertError::OcrEngineNotFound {
                        binary: self.binary.clone(),
                    }
                } else {
                    failed(format!("could not run tesseract: {}", e))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "tesseract exited with code {}: {}",
                code,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn backend_name(&self) -> &str {
        "tesseract"
    }
}
