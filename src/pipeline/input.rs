//! Input handling: validate uploads, stage them on disk, resolve local paths.
//!
//! pdfium needs a file-system path, so uploaded bytes are written to a
//! uniquely named temp file inside the upload directory. The client's
//! filename is validated and logged but never used to build a path; the
//! staged file is removed when [`StoredUpload`] is dropped, whether the
//! request succeeded or not.

use crate::error::ConvertError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// `true` if the name ends in `.pdf`, ignoring case.
pub fn is_pdf_filename(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Accept a non-empty filename ending in `.pdf`.
pub fn validate_filename(name: Option<&str>) -> Result<String, ConvertError> {
    match name {
        Some(n) if !n.is_empty() && is_pdf_filename(n) => Ok(n.to_string()),
        other => Err(ConvertError::InvalidUpload {
            filename: other.unwrap_or_default().to_string(),
        }),
    }
}

/// Last path component of a client-supplied filename, for logging.
pub fn sanitize_filename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// An uploaded PDF staged in the upload directory.
#[derive(Debug)]
pub struct StoredUpload {
    file: NamedTempFile,
    original_name: String,
}

impl StoredUpload {
    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The filename the client sent, reduced to its final component.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }
}

/// Write an upload's bytes to a fresh temp file in `dir`.
pub async fn store_upload<B>(
    dir: &Path,
    original_name: &str,
    bytes: B,
) -> Result<StoredUpload, ConvertError>
where
    B: AsRef<[u8]> + Send + 'static,
{
    let dir = dir.to_path_buf();
    let original_name = sanitize_filename(original_name).to_string();

    let file = tokio::task::spawn_blocking(move || -> Result<NamedTempFile, ConvertError> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".pdf")
            .tempfile_in(&dir)?;
        file.write_all(bytes.as_ref())?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Upload task panicked: {}", e)))??;

    debug!(
        "Staged upload '{}' at {}",
        original_name,
        file.path().display()
    );
    Ok(StoredUpload {
        file,
        original_name,
    })
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_local(path: &Path) -> Result<PathBuf, ConvertError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ConvertError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ConvertError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ConvertError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}
