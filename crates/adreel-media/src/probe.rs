//! FFprobe media information.

use adreel_models::MediaAsset;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
}

/// Probe any media file (video or audio-only).
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaAsset> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    let asset = asset_from_probe(path, probe)?;

    debug!(
        path = %path.display(),
        width = asset.width,
        height = asset.height,
        duration = asset.duration_secs,
        has_audio = asset.has_audio,
        "Probed media"
    );

    Ok(asset)
}

/// Probe a file that must carry a video stream.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<MediaAsset> {
    let asset = probe_media(path).await?;
    if !asset.has_video() {
        return Err(MediaError::invalid_media(format!(
            "No video stream found in {}",
            asset.path.display()
        )));
    }
    Ok(asset)
}

fn asset_from_probe(path: &Path, probe: FfprobeOutput) -> MediaResult<MediaAsset> {
    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");

    if video.is_none() && audio.is_none() {
        return Err(MediaError::invalid_media(format!(
            "No audio or video stream found in {}",
            path.display()
        )));
    }

    // Container duration first, then the longest stream
    let duration_secs = parse_secs(probe.format.duration.as_deref())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| parse_secs(s.duration.as_deref()))
                .reduce(f64::max)
        })
        .ok_or_else(|| {
            MediaError::invalid_media(format!("Unknown duration for {}", path.display()))
        })?;

    Ok(MediaAsset {
        path: path.to_path_buf(),
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        duration_secs,
        has_audio: audio.is_some(),
        audio_sample_rate: audio
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
    })
}

fn parse_secs(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}
