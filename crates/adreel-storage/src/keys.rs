//! Object key naming and content types.

use std::path::Path;

use chrono::{DateTime, Utc};

/// Prefix every uploaded artifact lands under.
pub const UPLOAD_PREFIX: &str = "uploads";

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// MIME type sent with an upload, derived from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match extension(path).as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// `uploads/{image|video}_{YYYY-MM-DD_HH-MM-SS}{.ext}`
pub fn upload_key(path: &Path, now: DateTime<Utc>) -> String {
    let ext = extension(path);
    let kind = match ext.as_str() {
        "jpg" | "jpeg" | "png" => "image",
        _ => "video",
    };
    let suffix = if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    };

    format!(
        "{}/{}_{}{}",
        UPLOAD_PREFIX,
        kind,
        now.format("%Y-%m-%d_%H-%M-%S"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("a.webm")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_upload_key() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            upload_key(Path::new("/w/combined_vid_with_bgm.mp4"), now),
            "uploads/video_2024-03-09_14-05-07.mp4"
        );
        assert_eq!(
            upload_key(Path::new("/w/frame.PNG"), now),
            "uploads/image_2024-03-09_14-05-07.png"
        );
    }
}
