//! Source image checks for image-to-video generation.

use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::{MediaError, MediaResult};

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
/// Accepted width/height range, inclusive.
pub const MIN_ASPECT: f64 = 0.4;
pub const MAX_ASPECT: f64 = 2.5;
/// The shorter side must be strictly longer than this.
pub const MIN_SHORT_SIDE: u32 = 300;

/// Accepted encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }
}

/// Facts about an image that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFacts {
    pub path: PathBuf,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

/// Check the geometric constraints alone.
pub fn check_dimensions(width: u32, height: u32) -> MediaResult<()> {
    if width == 0 || height == 0 {
        return Err(MediaError::validation("image has a zero dimension"));
    }

    let aspect = width as f64 / height as f64;
    if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
        return Err(MediaError::validation(format!(
            "aspect ratio {:.2} ({}x{}) is outside [{}, {}]",
            aspect, width, height, MIN_ASPECT, MAX_ASPECT
        )));
    }

    let short_side = width.min(height);
    if short_side <= MIN_SHORT_SIDE {
        return Err(MediaError::validation(format!(
            "shorter side is {}px, must be greater than {}px",
            short_side, MIN_SHORT_SIDE
        )));
    }

    Ok(())
}

/// Validate an image file: format, size, aspect ratio and resolution.
pub async fn validate_image(path: impl AsRef<Path>) -> MediaResult<ImageFacts> {
    let path = path.as_ref().to_path_buf();

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::FileNotFound(path))
        }
        Err(e) => return Err(e.into()),
    };

    let declared = ImageKind::from_extension(&path).ok_or_else(|| {
        MediaError::validation(format!(
            "unsupported image extension for {}, expected jpg, jpeg or png",
            path.display()
        ))
    })?;

    let size_bytes = metadata.len();
    if size_bytes > MAX_IMAGE_BYTES {
        return Err(MediaError::validation(format!(
            "image is {} bytes, limit is {} bytes",
            size_bytes, MAX_IMAGE_BYTES
        )));
    }

    // Header sniffing reads from disk; keep it off the async workers
    let sniff_path = path.clone();
    let (format, (width, height)) = tokio::task::spawn_blocking(move || {
        let reader = image::io::Reader::open(&sniff_path)?.with_guessed_format()?;
        let format = reader.format();
        let dimensions = reader.into_dimensions().map_err(MediaError::from)?;
        Ok::<_, MediaError>((format, dimensions))
    })
    .await
    .map_err(|e| MediaError::invalid_media(format!("image inspection aborted: {}", e)))??;

    let kind = match format {
        Some(ImageFormat::Jpeg) => ImageKind::Jpeg,
        Some(ImageFormat::Png) => ImageKind::Png,
        other => {
            return Err(MediaError::validation(format!(
                "image content is {:?}, expected JPEG or PNG",
                other
            )))
        }
    };
    if kind != declared {
        return Err(MediaError::validation(format!(
            "image extension says {} but content is {}",
            declared.mime_type(),
            kind.mime_type()
        )));
    }

    check_dimensions(width, height)?;

    Ok(ImageFacts {
        path,
        kind,
        width,
        height,
        size_bytes,
    })
}
