//! Composition run descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Background music gain applied when a run carries bgm but no explicit volume.
pub const DEFAULT_BGM_VOLUME: f32 = 0.3;

/// How the two video tracks of a run are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Captioned avatar clip followed by the demo clip.
    Concat,
    /// Both clips on one canvas, one above the other.
    VerticalStack,
}

impl CompositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionMode::Concat => "concat",
            CompositionMode::VerticalStack => "vertical_stack",
        }
    }
}

impl std::fmt::Display for CompositionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vertical placement of a caption.
///
/// Parsing never fails: unrecognized values fall back to [`CaptionPosition::Center`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

impl CaptionPosition {
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => CaptionPosition::Top,
            "bottom" => CaptionPosition::Bottom,
            _ => CaptionPosition::Center,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPosition::Top => "top",
            CaptionPosition::Center => "center",
            CaptionPosition::Bottom => "bottom",
        }
    }
}

impl<'de> Deserialize<'de> for CaptionPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&value))
    }
}

/// Which half of the stack canvas the primary clip occupies.
///
/// `top` puts the primary clip on top; any other value puts it at the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StackPosition {
    #[default]
    Top,
    Bottom,
}

impl StackPosition {
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("top") {
            StackPosition::Top
        } else {
            StackPosition::Bottom
        }
    }
}

impl<'de> Deserialize<'de> for StackPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&value))
    }
}

/// Reasons a composition description is rejected before any work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionSpecError {
    #[error("{0} must not be empty")]
    EmptyReference(&'static str),

    #[error("bgm_volume must be within [0, 1], got {0}")]
    BgmVolumeOutOfRange(f32),

    #[error("{field} is not supported in {mode} mode")]
    FieldNotAllowed {
        field: &'static str,
        mode: CompositionMode,
    },

    #[error("{0} is required when a caption is requested")]
    MissingField(&'static str),
}

/// One composition run.
///
/// Asset fields hold remote references; the pipeline fetches them into its
/// own workspace before the first stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompositionSpec {
    pub mode: CompositionMode,
    /// Avatar clip (concat) or the clip that keeps its audio (stack)
    pub primary: String,
    /// Demo clip (concat) or the muted filler clip (stack)
    pub secondary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_position: Option<CaptionPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_position: Option<StackPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm_volume: Option<f32>,
}

impl CompositionSpec {
    /// A concat run without caption or music.
    pub fn concat(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self::new(CompositionMode::Concat, primary.into(), secondary.into())
    }

    /// A vertical stack run.
    pub fn vertical_stack(
        primary: impl Into<String>,
        secondary: impl Into<String>,
        position: StackPosition,
    ) -> Self {
        let mut spec = Self::new(CompositionMode::VerticalStack, primary.into(), secondary.into());
        spec.stack_position = Some(position);
        spec
    }

    fn new(mode: CompositionMode, primary: String, secondary: String) -> Self {
        Self {
            mode,
            primary,
            secondary,
            caption_text: None,
            caption_position: None,
            font_style: None,
            stack_position: None,
            bgm: None,
            bgm_volume: None,
        }
    }

    pub fn with_caption(
        mut self,
        text: impl Into<String>,
        position: CaptionPosition,
        font_style: impl Into<String>,
    ) -> Self {
        self.caption_text = Some(text.into());
        self.caption_position = Some(position);
        self.font_style = Some(font_style.into());
        self
    }

    pub fn with_bgm(mut self, bgm: impl Into<String>, volume: Option<f32>) -> Self {
        self.bgm = Some(bgm.into());
        self.bgm_volume = volume;
        self
    }

    /// Caption text, if the run has a non-blank one.
    pub fn caption(&self) -> Option<&str> {
        self.caption_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Gain for the bgm track, `None` when the run carries no music.
    pub fn effective_bgm_volume(&self) -> Option<f32> {
        self.bgm
            .as_ref()
            .map(|_| self.bgm_volume.unwrap_or(DEFAULT_BGM_VOLUME))
    }

    /// Check field shape and mode consistency.
    pub fn validate(&self) -> Result<(), CompositionSpecError> {
        if self.primary.trim().is_empty() {
            return Err(CompositionSpecError::EmptyReference("primary"));
        }
        if self.secondary.trim().is_empty() {
            return Err(CompositionSpecError::EmptyReference("secondary"));
        }
        if let Some(bgm) = &self.bgm {
            if bgm.trim().is_empty() {
                return Err(CompositionSpecError::EmptyReference("bgm"));
            }
        }
        if let Some(volume) = self.bgm_volume {
            if !(0.0..=1.0).contains(&volume) {
                return Err(CompositionSpecError::BgmVolumeOutOfRange(volume));
            }
        }

        match self.mode {
            CompositionMode::Concat => {
                if self.stack_position.is_some() {
                    return Err(CompositionSpecError::FieldNotAllowed {
                        field: "stack_position",
                        mode: self.mode,
                    });
                }
                if self.caption().is_some() && self.font_style.is_none() {
                    return Err(CompositionSpecError::MissingField("font_style"));
                }
            }
            CompositionMode::VerticalStack => {
                if self.caption().is_some() {
                    return Err(CompositionSpecError::FieldNotAllowed {
                        field: "caption_text",
                        mode: self.mode,
                    });
                }
            }
        }

        Ok(())
    }
}
