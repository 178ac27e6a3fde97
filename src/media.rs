use crate::error::{MatchError, Result};
use crate::types::photo::PhotoSlot;

#[must_use]
pub fn detect_mime(data: &[u8]) -> Option<String> {
    infer::get(data).map(|info| info.mime_type().to_string())
}

#[must_use]
pub fn detect_mime_from_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg".into()),
        "png" => Some("image/png".into()),
        "gif" => Some("image/gif".into()),
        "webp" => Some("image/webp".into()),
        "bmp" => Some("image/bmp".into()),
        "heic" => Some("image/heic".into()),
        "txt" => Some("text/plain".into()),
        "pdf" => Some("application/pdf".into()),
        _ => None,
    }
}

/// Accepts the payload only when it is image media, sniffed from magic bytes
/// first and from the file extension second.
pub fn image_slot(data: Vec<u8>, filename: Option<&str>) -> Result<PhotoSlot> {
    let display = filename.unwrap_or("upload").to_string();
    if data.is_empty() {
        return Err(MatchError::InvalidImage(format!("{display} is empty")));
    }

    let mime = detect_mime(&data).or_else(|| filename.and_then(detect_mime_from_extension));
    match mime {
        Some(mime) if mime.starts_with("image/") => Ok(PhotoSlot::from_image(
            data,
            &mime,
            filename.map(str::to_string),
        )),
        Some(mime) => Err(MatchError::InvalidImage(format!("{display} ({mime})"))),
        None => Err(MatchError::InvalidImage(format!(
            "{display} (unrecognised format)"
        ))),
    }
}
