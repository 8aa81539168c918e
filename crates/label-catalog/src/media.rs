//! Helpers for uploaded image files.

use crate::error::{CatalogError, CatalogResult};

/// Extension of `file_name`, lowercased. A name without a dot is its own
/// extension.
pub fn file_extension(file_name: &str) -> String {
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
    base.rsplit('.').next().unwrap_or(base).to_ascii_lowercase()
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

pub(crate) fn require_image(file_name: &str, bytes: &[u8]) -> CatalogResult<String> {
    if file_name.trim().is_empty() || bytes.is_empty() {
        return Err(CatalogError::Validation(
            "You must select an image to upload.".to_string(),
        ));
    }
    Ok(file_extension(file_name))
}
