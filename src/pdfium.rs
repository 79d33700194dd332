//! Binding to the pdfium shared library and opening documents.
//!
//! pdfium is loaded dynamically. Resolution order:
//!
//! 1. `library_path` from the configuration: either the library file itself
//!    or a directory containing the platform library name.
//! 2. The platform library in the current working directory.
//! 3. The system library search path.
//!
//! Both helpers are blocking and must be called from `spawn_blocking`.

use crate::error::ConvertError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Bind to pdfium, following the resolution order above.
pub fn bind(library_path: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let bindings = match library_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{:?}", e)))?;

    debug!("pdfium bound");
    Ok(Pdfium::new(bindings))
}

/// Open a PDF, mapping pdfium's load errors to password / corruption errors.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ConvertError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ConvertError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ConvertError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
