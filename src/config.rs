//! Configuration types for statement conversion and the upload service.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]; the HTTP surface has its own small
//! [`ServerConfig`]. Both are plain values that are cheap to clone into
//! request handlers and blocking tasks.

use crate::error::ConvertError;
use crate::pipeline::rows::StatementLayout;
use crate::pipeline::tables::TableDetectorConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for one PDF-to-spreadsheet conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use statement2xlsx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(300)
///     .ocr_language("eng")
///     .ocr_concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising pages for OCR. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 6000.
    ///
    /// Caps memory for oversized pages independently of `dpi`.
    pub max_rendered_pixels: u32,

    /// Number of pages recognised at once. Default: 2.
    ///
    /// Recognised text is always reassembled in page order.
    pub ocr_concurrency: usize,

    /// Path or name of the `tesseract` executable. Default: `tesseract`.
    pub tesseract_path: PathBuf,

    /// Tesseract language code(s), e.g. `eng` or `eng+hin`. Default: `eng`.
    pub ocr_language: String,

    /// Directory or file of the pdfium shared library.
    /// If None, tries the working directory and then the system library path.
    pub pdfium_library_path: Option<PathBuf>,

    /// PDF user password for encrypted statements.
    pub password: Option<String>,

    /// Layout-based table detection tolerances.
    pub table: TableDetectorConfig,

    /// Line layouts tried, in order, against each OCR text line.
    pub layouts: Vec<StatementLayout>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 6000,
            ocr_concurrency: 2,
            tesseract_path: PathBuf::from("tesseract"),
            ocr_language: "eng".to_string(),
            pdfium_library_path: None,
            password: None,
            table: TableDetectorConfig::default(),
            layouts: vec![StatementLayout::dr_cr()],
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn table(mut self, table: TableDetectorConfig) -> Self {
        self.config.table = table;
        self
    }

    /// Append a layout after the ones already configured.
    pub fn layout(mut self, layout: StatementLayout) -> Self {
        self.config.layouts.push(layout);
        self
    }

    /// Replace the configured layouts entirely.
    pub fn layouts(mut self, layouts: Vec<StatementLayout>) -> Self {
        self.config.layouts = layouts;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConvertError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.ocr_concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "OCR concurrency must be ≥ 1".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.layouts.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "At least one statement layout is required".into(),
            ));
        }
        if c.table.row_tolerance <= 0.0 || c.table.col_tolerance <= 0.0 {
            return Err(ConvertError::InvalidConfig(
                "Table tolerances must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings for the HTTP upload service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind. Default: `127.0.0.1`.
    pub host: String,

    /// TCP port. Default: 5000.
    pub port: u16,

    /// Directory where uploads are staged during a request. Created at startup.
    pub upload_dir: PathBuf,

    /// Largest accepted request body in bytes. Default: 32 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Parse `host:port` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConvertError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConvertError::InvalidConfig(format!("Invalid bind address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.ocr_language, "eng");
        assert_eq!(c.layouts.len(), 1);
        assert!(c.pdfium_library_path.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = ConversionConfig::builder()
            .dpi(10)
            .ocr_concurrency(0)
            .max_rendered_pixels(5)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 72);
        assert_eq!(c.ocr_concurrency, 1);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_empty_language() {
        let err = ConversionConfig::builder().ocr_language("  ").build();
        assert!(matches!(err, Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_no_layouts() {
        let err = ConversionConfig::builder().layouts(vec![]).build();
        assert!(matches!(err, Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn server_socket_addr() {
        let s = ServerConfig::default();
        assert_eq!(s.socket_addr().unwrap().port(), 5000);

        let bad = ServerConfig {
            host: "not a host".into(),
            ..ServerConfig::default()
        };
        assert!(bad.socket_addr().is_err());
    }
}
