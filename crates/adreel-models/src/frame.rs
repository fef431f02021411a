//! Fixed output geometry per pipeline mode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output width/height (and frame rate) a mode normalizes every source to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TargetFrame {
    pub width: u32,
    pub height: u32,
    /// Frame rate forced during the fit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
}

impl TargetFrame {
    /// Concat mode: 9:16 at 30 fps.
    pub const CONCAT: TargetFrame = TargetFrame::new(720, 1280, Some(30));

    /// Vertical stack canvas at 30 fps.
    pub const STACK_CANVAS: TargetFrame = TargetFrame::new(900, 1600, Some(30));

    /// Upper share of the stack canvas reserved for the primary clip (60%).
    pub const STACK_PRIMARY: TargetFrame = TargetFrame::new(900, 960, Some(30));

    /// Remaining 40% of the stack canvas for the secondary clip.
    pub const STACK_SECONDARY: TargetFrame = TargetFrame::new(900, 640, Some(30));

    /// Image-to-video results: 9:16 at 24 fps.
    pub const GENERATION: TargetFrame = TargetFrame::new(576, 1024, Some(24));

    pub const fn new(width: u32, height: u32, fps: Option<u32>) -> Self {
        Self { width, height, fps }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }
}

impl std::fmt::Display for TargetFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if let Some(fps) = self.fps {
            write!(f, "@{}", fps)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_split_fills_canvas() {
        assert_eq!(
            TargetFrame::STACK_PRIMARY.height + TargetFrame::STACK_SECONDARY.height,
            TargetFrame::STACK_CANVAS.height
        );
        assert_eq!(TargetFrame::STACK_PRIMARY.width, TargetFrame::STACK_CANVAS.width);
    }

    #[test]
    fn test_display() {
        assert_eq!(TargetFrame::CONCAT.to_string(), "720x1280@30");
        assert_eq!(TargetFrame::STACK_CANVAS.to_string(), "900x1600@30");
    }

    #[test]
    fn test_stacked_halves_share_a_frame_rate() {
        assert_eq!(TargetFrame::STACK_PRIMARY.fps, Some(30));
        assert_eq!(TargetFrame::STACK_PRIMARY.fps, TargetFrame::STACK_SECONDARY.fps);
    }
}
