//! Input checks shared by the client core (before any network call) and the
//! store service (server-side re-validation).

use crate::error::SyncError;
use crate::types::MessageKind;

pub const MAX_BODY_CHARS: usize = 2000;
pub const MAX_PAGE_LIMIT: usize = 100;

pub const MAX_IMAGE_BYTES: i64 = 10 * 1024 * 1024;
pub const MAX_VOICE_BYTES: i64 = 6 * 1024 * 1024;
pub const MAX_VIDEO_NOTE_BYTES: i64 = 10 * 1024 * 1024;
pub const MAX_VOICE_DURATION_SEC: f64 = 90.0;
pub const MAX_VIDEO_NOTE_DURATION_SEC: f64 = 30.0;

/// Trims a message body and checks its length. Returns the trimmed body.
pub fn validate_body(text: &str) -> Result<String, SyncError> {
    let body = text.trim();
    if body.is_empty() {
        return Err(SyncError::Validation("message is empty".into()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(SyncError::Validation(format!(
            "message is too long (max {MAX_BODY_CHARS} characters)"
        )));
    }
    Ok(body.to_string())
}

/// Trims an optional media caption; blank captions become `None`.
pub fn validate_caption(text: Option<&str>) -> Result<Option<String>, SyncError> {
    let Some(caption) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if caption.chars().count() > MAX_BODY_CHARS {
        return Err(SyncError::Validation(format!(
            "caption is too long (max {MAX_BODY_CHARS} characters)"
        )));
    }
    Ok(Some(caption.to_string()))
}

/// Checks mime family, byte size and duration ceilings of a media attachment.
pub fn validate_media(
    kind: MessageKind,
    mime: &str,
    size_bytes: i64,
    duration_sec: Option<f64>,
) -> Result<(), SyncError> {
    let (family, max_bytes, max_duration) = match kind {
        MessageKind::Text => {
            return Err(SyncError::Validation("unsupported media kind".into()));
        }
        MessageKind::Image => ("image/", MAX_IMAGE_BYTES, None),
        MessageKind::Voice => ("audio/", MAX_VOICE_BYTES, Some(MAX_VOICE_DURATION_SEC)),
        MessageKind::VideoNote => (
            "video/",
            MAX_VIDEO_NOTE_BYTES,
            Some(MAX_VIDEO_NOTE_DURATION_SEC),
        ),
    };
    if !mime.starts_with(family) {
        return Err(SyncError::Validation(format!(
            "{} requires a {family}* file",
            kind.as_str()
        )));
    }
    if size_bytes <= 0 {
        return Err(SyncError::Validation("media file is empty".into()));
    }
    if size_bytes > max_bytes {
        return Err(SyncError::Validation(format!(
            "{} is too large (max {} MB)",
            kind.as_str(),
            max_bytes / (1024 * 1024)
        )));
    }
    if let Some(duration) = duration_sec {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SyncError::Validation("invalid media duration".into()));
        }
        if let Some(max) = max_duration
            && duration > max
        {
            return Err(SyncError::Validation(format!(
                "{} is too long (max {max} s)",
                kind.as_str()
            )));
        }
    }
    Ok(())
}

/// Clamps a requested page size into `1..=MAX_PAGE_LIMIT`.
pub fn clamp_page_limit(limit: i64) -> usize {
    limit.clamp(1, MAX_PAGE_LIMIT as i64) as usize
}
