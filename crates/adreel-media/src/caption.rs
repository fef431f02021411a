//! Caption burn-in.
//!
//! Lines are wrapped greedily against 90% of the frame width using a
//! fixed per-character width estimate, then every line is rendered by its
//! own `drawtext` filter, horizontally centred.

use std::path::{Path, PathBuf};

use adreel_models::{CaptionPosition, EncodingConfig, FontRegistry, MediaAsset, ResolvedFont};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::escape_filter_path;
use crate::probe::probe_video;

/// Share of the frame width a caption line may occupy.
pub const MAX_LINE_WIDTH_RATIO: f64 = 0.9;
/// Estimated glyph width as a fraction of the font size.
pub const CHAR_WIDTH_RATIO: f64 = 0.5;
/// Extra vertical space between consecutive lines (negative tightens).
pub const INTERLINE_SPACING: i32 = -10;
/// Natural line height as a multiple of the font size.
const LINE_HEIGHT_RATIO: f64 = 1.2;

pub const FONT_COLOR: &str = "white";
pub const STROKE_COLOR: &str = "black";
pub const STROKE_WIDTH: u32 = 2;

/// Largest estimated line width allowed for a frame.
pub fn max_line_width(frame_width: u32) -> f64 {
    (frame_width as f64 * MAX_LINE_WIDTH_RATIO).floor()
}

/// Estimated rendered width of a line.
pub fn estimate_width(line: &str, font_size: u32) -> f64 {
    line.chars().count() as f64 * font_size as f64 * CHAR_WIDTH_RATIO
}

/// Greedy word wrap.
///
/// A word that would push the current line past the limit starts a new
/// line. Words are never split, so a single word wider than the limit
/// occupies a line of its own.
pub fn wrap_caption(text: &str, frame_width: u32, font_size: u32) -> Vec<String> {
    let limit = max_line_width(frame_width);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if estimate_width(&candidate, font_size) > limit {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrapped caption with resolved vertical placement.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub lines: Vec<String>,
    pub font_size: u32,
    /// Distance between the tops of consecutive lines
    pub line_advance: u32,
    /// Height of the whole text block
    pub text_height: u32,
    /// Top edge of the first line
    pub top: i64,
}

impl CaptionLayout {
    pub fn compute(
        text: &str,
        frame_width: u32,
        frame_height: u32,
        position: CaptionPosition,
        font_size: u32,
    ) -> Self {
        let lines = wrap_caption(text, frame_width, font_size);
        let natural = (font_size as f64 * LINE_HEIGHT_RATIO).round() as i64;
        let line_advance = (natural + INTERLINE_SPACING as i64).max(font_size as i64) as u32;
        let text_height = line_advance * lines.len() as u32;

        let h = frame_height as f64;
        let top = match position {
            CaptionPosition::Top => h * 0.1,
            CaptionPosition::Bottom => h * 0.8 - text_height as f64,
            CaptionPosition::Center => (h - text_height as f64) / 2.0,
        };

        Self {
            lines,
            font_size,
            line_advance,
            text_height,
            top: top.round() as i64,
        }
    }

    /// Top edge of line `index`.
    pub fn line_top(&self, index: usize) -> i64 {
        self.top + (index as i64) * self.line_advance as i64
    }

    /// One `drawtext` per line, chained for `-vf`.
    pub fn to_filter(&self, font_path: &Path, text_files: &[PathBuf]) -> String {
        let font = escape_filter_path(&font_path.to_string_lossy());
        text_files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                format!(
                    "drawtext=fontfile='{font}':textfile='{file}':expansion=none:fontsize={size}:fontcolor={color}:borderw={stroke}:bordercolor={stroke_color}:x=(w-text_w)/2:y={y}",
                    font = font,
                    file = escape_filter_path(&file.to_string_lossy()),
                    size = self.font_size,
                    color = FONT_COLOR,
                    stroke = STROKE_WIDTH,
                    stroke_color = STROKE_COLOR,
                    y = self.line_top(index),
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Look up a caption style, mapping registry failures onto the media taxonomy.
pub fn resolve_font(registry: &FontRegistry, style: &str) -> MediaResult<ResolvedFont> {
    registry.resolve(style).map_err(MediaError::from)
}

/// Burn `text` into `source`, keeping its dimensions, duration and audio.
pub async fn overlay_caption(
    source: &MediaAsset,
    output: impl AsRef<Path>,
    text: &str,
    position: CaptionPosition,
    font: &ResolvedFont,
    encoding: &EncodingConfig,
) -> MediaResult<MediaAsset> {
    let output = output.as_ref();
    let layout = CaptionLayout::compute(text, source.width, source.height, position, font.size);
    if layout.lines.is_empty() {
        return Err(MediaError::validation("caption text is empty"));
    }

    // Line text goes through files so it never needs filtergraph escaping
    let mut text_files = Vec::with_capacity(layout.lines.len());
    for (index, line) in layout.lines.iter().enumerate() {
        let path = caption_file_path(output, index);
        tokio::fs::write(&path, line).await?;
        text_files.push(path);
    }

    info!(
        input = %source.path.display(),
        output = %output.display(),
        font = %font.name,
        position = position.as_str(),
        lines = layout.lines.len(),
        "Overlaying caption"
    );

    let mut cmd = FfmpegCommand::new(&source.path, output)
        .video_filter(layout.to_filter(&font.path, &text_files))
        .output_args(encoding.video_args());
    cmd = if source.has_audio {
        cmd.audio_codec("copy")
    } else {
        cmd.no_audio()
    };

    FfmpegRunner::new().with_operation("caption").run(&cmd).await?;
    probe_video(output).await
}

fn caption_file_path(output: &Path, index: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "caption".to_string());
    output.with_file_name(format!("{}_line{}.txt", stem, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Stop scrolling! This one app turned my weekend side project into a \
        business that pays the rent every single month";

    #[test]
    fn test_wrap_never_splits_words() {
        for width in [360, 720, 1080] {
            let lines = wrap_caption(SAMPLE, width, 48);
            let rejoined = lines.join(" ");
            assert_eq!(
                rejoined.split_whitespace().collect::<Vec<_>>(),
                SAMPLE.split_whitespace().collect::<Vec<_>>()
            );
            assert!(lines.iter().all(|l| !l.is_empty()));
        }
    }

    #[test]
    fn test_wrap_respects_width_limit() {
        for width in [720, 1080] {
            let limit = max_line_width(width);
            for line in wrap_caption(SAMPLE, width, 48) {
                assert!(
                    estimate_width(&line, 48) <= limit,
                    "'{line}' is too wide for {width}px"
                );
            }
        }
    }

    #[test]
    fn test_wrap_is_greedy() {
        // 720px frame: limit 648px, 24px per char -> 27 chars per line
        let lines = wrap_caption("aaaa bbbb cccc dddd eeee ffff gggg", 720, 48);
        assert_eq!(lines, vec!["aaaa bbbb cccc dddd eeee", "ffff gggg"]);
    }

    #[test]
    fn test_overlong_word_stands_alone() {
        let lines = wrap_caption("go supercalifragilisticexpialidocious now", 360, 48);
        assert_eq!(
            lines,
            vec!["go", "supercalifragilisticexpialidocious", "now"]
        );
    }

    #[test]
    fn test_empty_text() {
        assert!(wrap_caption("   ", 720, 48).is_empty());
    }

    #[test]
    fn test_vertical_placement() {
        let top = CaptionLayout::compute("hello", 720, 1280, CaptionPosition::Top, 48);
        assert_eq!(top.top, 128);
        assert_eq!(top.line_advance, 48);

        let bottom = CaptionLayout::compute("hello", 720, 1280, CaptionPosition::Bottom, 48);
        assert_eq!(bottom.top, 1024 - 48);

        let center = CaptionLayout::compute("hello", 720, 1280, CaptionPosition::Center, 48);
        assert_eq!(center.top, (1280 - 48) / 2);

        let fallback = CaptionLayout::compute(
            "hello",
            720,
            1280,
            CaptionPosition::parse_lenient("diagonal"),
            48,
        );
        assert_eq!(fallback.top, center.top);
    }

    #[test]
    fn test_multiline_bottom_stays_above_inset() {
        let layout = CaptionLayout::compute(SAMPLE, 720, 1280, CaptionPosition::Bottom, 48);
        let last = layout.line_top(layout.lines.len() - 1);
        assert_eq!(last + layout.line_advance as i64, 1024);
    }

    #[test]
    fn test_filter_has_one_drawtext_per_line() {
        let layout = CaptionLayout::compute("one two", 100, 1280, CaptionPosition::Top, 48);
        assert_eq!(layout.lines.len(), 2);

        let files = vec![PathBuf::from("/w/c_line0.txt"), PathBuf::from("/w/c_line1.txt")];
        let filter = layout.to_filter(Path::new("/fonts/Poppins-ExtraBold.ttf"), &files);
        assert_eq!(filter.matches("drawtext=").count(), 2);
        assert!(filter.contains("fontfile='/fonts/Poppins-ExtraBold.ttf'"));
        assert!(filter.contains("borderw=2:bordercolor=black"));
        assert!(filter.contains("y=128"));
        assert!(filter.contains("y=176"));
    }

    #[test]
    fn test_caption_file_path() {
        assert_eq!(
            caption_file_path(Path::new("/w/avatar_with_text.mp4"), 1),
            PathBuf::from("/w/avatar_with_text_line1.txt")
        );
    }
}
