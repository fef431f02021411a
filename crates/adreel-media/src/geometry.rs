//! Geometry normalization.
//!
//! Fits any source frame into a fixed [`TargetFrame`] with one uniform scale
//! factor followed by a symmetric crop of the excess dimension. Sources are
//! never stretched and never padded.

use std::path::Path;

use adreel_models::{EncodingConfig, MediaAsset, TargetFrame};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Crop window applied after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Scale and crop steps that map a source frame onto a target frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitPlan {
    pub source_width: u32,
    pub source_height: u32,
    pub target: TargetFrame,
    /// Intermediate size after uniform scaling, `None` when already at target
    pub scale: Option<(u32, u32)>,
    /// Crop of the excess dimension, `None` when aspect ratios match
    pub crop: Option<CropRect>,
}

impl FitPlan {
    pub fn compute(source_width: u32, source_height: u32, target: TargetFrame) -> MediaResult<Self> {
        if source_width == 0 || source_height == 0 {
            return Err(MediaError::invalid_media(format!(
                "cannot fit a {}x{} frame",
                source_width, source_height
            )));
        }
        if target.width == 0 || target.height == 0 {
            return Err(MediaError::invalid_configuration(format!(
                "target frame {} has a zero dimension",
                target
            )));
        }

        let mut plan = Self {
            source_width,
            source_height,
            target,
            scale: None,
            crop: None,
        };

        if source_width == target.width && source_height == target.height {
            return Ok(plan);
        }

        let (w, h) = (source_width as u64, source_height as u64);
        let (tw, th) = (target.width as u64, target.height as u64);

        // w/h > tw/th without floating point
        let (scaled_w, scaled_h) = if w * th > tw * h {
            (even_ceil_div(w * th, h), th)
        } else {
            (tw, even_ceil_div(h * tw, w))
        };

        plan.scale = Some((scaled_w as u32, scaled_h as u32));
        if scaled_w != tw || scaled_h != th {
            plan.crop = Some(CropRect {
                width: target.width,
                height: target.height,
                x: ((scaled_w - tw) / 2) as u32,
                y: ((scaled_h - th) / 2) as u32,
            });
        }

        Ok(plan)
    }

    /// Whether the source already has the target dimensions.
    pub fn is_noop(&self) -> bool {
        self.scale.is_none() && self.crop.is_none()
    }

    /// Uniform scale factor applied to both axes.
    pub fn scale_factor(&self) -> f64 {
        match self.scale {
            Some((w, _)) => w as f64 / self.source_width as f64,
            None => 1.0,
        }
    }

    /// Final frame size after the plan runs.
    pub fn output_dimensions(&self) -> (u32, u32) {
        match (self.crop, self.scale) {
            (Some(crop), _) => (crop.width, crop.height),
            (None, Some(scale)) => scale,
            (None, None) => (self.source_width, self.source_height),
        }
    }

    /// Render as an FFmpeg `-vf` chain.
    pub fn to_filter(&self) -> String {
        let mut steps = Vec::with_capacity(4);
        if let Some((w, h)) = self.scale {
            steps.push(format!("scale={}:{}", w, h));
        }
        if let Some(crop) = self.crop {
            steps.push(format!(
                "crop={}:{}:{}:{}",
                crop.width, crop.height, crop.x, crop.y
            ));
        }
        if let Some(fps) = self.target.fps {
            steps.push(format!("fps={}", fps));
        }
        steps.push("setsar=1".to_string());
        steps.join(",")
    }
}

/// `ceil(num / den)` rounded up to the next even number.
fn even_ceil_div(num: u64, den: u64) -> u64 {
    let value = num.div_ceil(den);
    value + (value % 2)
}

/// What to do with the source's audio while fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioHandling {
    Keep,
    Drop,
}

/// Re-encode `source` at exactly the target dimensions (and frame rate).
pub async fn fit_video(
    source: &MediaAsset,
    output: impl AsRef<Path>,
    target: TargetFrame,
    audio: AudioHandling,
    encoding: &EncodingConfig,
) -> MediaResult<MediaAsset> {
    let output = output.as_ref();
    let plan = FitPlan::compute(source.width, source.height, target)?;

    info!(
        input = %source.path.display(),
        output = %output.display(),
        source = %format!("{}x{}", source.width, source.height),
        target = %target,
        noop = plan.is_noop(),
        "Fitting video to target frame"
    );

    let mut cmd = FfmpegCommand::new(&source.path, output)
        .video_filter(plan.to_filter())
        .output_args(encoding.video_args());

    cmd = if audio == AudioHandling::Keep && source.has_audio {
        cmd.output_args(encoding.audio_args())
    } else {
        cmd.no_audio()
    };

    FfmpegRunner::new().with_operation("fit").run(&cmd).await?;
    probe_video(output).await
}
