//! Attachment validation.
//!
//! Checks run entirely client-side, before any network call: an explicit
//! extension allow-list and a size cap. The upload itself goes through
//! [`crate::api::ApiClient::upload`]; emitting the message that references
//! the uploaded URL is the session's job and happens only after the upload
//! succeeds.

use crate::error::{ClientError, Result};
use std::fs;
use std::path::Path;

/// Extensions accepted for chat attachments: images, pdf, doc/docx, txt.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "pdf", "doc", "docx", "txt",
];

/// Size cap matching the platform's other upload flows.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// A file that passed client-side checks and may be uploaded.
#[derive(Debug, Clone)]
pub struct PreparedAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Validate a file name and size without touching the network.
pub fn check_attachment(file_name: &str, size: u64) -> Result<()> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => {
            return Err(ClientError::Validation(format!(
                "unsupported attachment type: {file_name}"
            )))
        }
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(ClientError::Validation(format!(
            "attachment exceeds the {} MB limit",
            MAX_ATTACHMENT_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Validate and read a file from disk.
pub fn prepare_attachment(path: &Path) -> Result<PreparedAttachment> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ClientError::Validation(format!("not a file: {}", path.display())))?
        .to_owned();
    let meta = fs::metadata(path)
        .map_err(|e| ClientError::Storage(format!("stat {}: {e}", path.display())))?;
    check_attachment(&file_name, meta.len())?;

    let bytes = fs::read(path)
        .map_err(|e| ClientError::Storage(format!("read {}: {e}", path.display())))?;
    Ok(PreparedAttachment { file_name, bytes })
}

/// MIME type for the multipart part, from the extension.
pub(crate) fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
