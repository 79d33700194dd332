//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! pdfium wraps a C++ library with thread-local state and is not safe to call
//! from async contexts, so [`render_document`] moves the work onto the
//! blocking thread pool. Page size is bounded by `max_rendered_pixels`
//! regardless of DPI so an oversized page cannot exhaust memory.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::pdfium;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns the pages of a PDF into images for OCR.
pub trait PageRasterizer: Send + Sync {
    /// Render every page, in page order.
    fn render_pages(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, ConvertError>;

    /// Name of this rendering backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Run a [`PageRasterizer`] on the blocking thread pool.
pub async fn render_document(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf_path: &Path,
) -> Result<Vec<DynamicImage>, ConvertError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || rasterizer.render_pages(&path))
        .await
        .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
}

/// pdfium-backed rasteriser.
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
    password: Option<String>,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            library_path: config.pdfium_library_path.clone(),
            password: config.password.clone(),
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
        }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn render_pages(&self, pdf_path: &Path) -> Result<Vec<DynamicImage>, ConvertError> {
        let pdfium = pdfium::bind(self.library_path.as_deref())?;
        let document = pdfium::open_document(&pdfium, pdf_path, self.password.as_deref())?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("Rendering {} pages at {} DPI", total_pages, self.dpi);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(points_to_pixels_scale(self.dpi))
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ConvertError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }

    fn backend_name(&self) -> &str {
        "pdfium-render"
    }
}

/// PDF user space is 72 points per inch.
fn points_to_pixels_scale(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_from_dpi() {
        assert_eq!(points_to_pixels_scale(72), 1.0);
        assert!((points_to_pixels_scale(200) - 2.777_777_8).abs() < 1e-5);
    }

    struct BlankPages(usize);

    impl PageRasterizer for BlankPages {
        fn render_pages(&self, _pdf_path: &Path) -> Result<Vec<DynamicImage>, ConvertError> {
            Ok((0..self.0).map(|_| DynamicImage::new_rgb8(4, 4)).collect())
        }

        fn backend_name(&self) -> &str {
            "blank"
        }
    }

    #[tokio::test]
    async fn render_document_runs_backend() {
        let rasterizer: Arc<dyn PageRasterizer> = Arc::new(BlankPages(3));
        let images = render_document(rasterizer, Path::new("scan.pdf"))
            .await
            .unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].width(), 4);
    }
}
