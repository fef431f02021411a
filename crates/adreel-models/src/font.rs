//! Caption font registry.
//!
//! The registry is built once at startup and shared read-only; there is no
//! process-wide mutable font table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Point size shared by every built-in caption style.
pub const DEFAULT_FONT_SIZE: u32 = 48;

/// A registered caption style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontStyle {
    pub name: String,
    /// Font file name, relative to the registry's font directory
    pub file_name: String,
    pub size: u32,
}

/// A style whose font file has been located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub name: String,
    pub path: PathBuf,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FontError {
    #[error("Unknown font style '{requested}', expected one of: {available}")]
    UnknownStyle { requested: String, available: String },

    #[error("Font file not found: {0}")]
    MissingFile(PathBuf),
}

/// Immutable mapping from style name to font resource.
#[derive(Debug, Clone)]
pub struct FontRegistry {
    fonts_dir: PathBuf,
    styles: BTreeMap<String, FontStyle>,
}

impl FontRegistry {
    /// Empty registry rooted at `fonts_dir`.
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            styles: BTreeMap::new(),
        }
    }

    /// The four styles offered to callers.
    pub fn builtin(fonts_dir: impl Into<PathBuf>) -> Self {
        Self::new(fonts_dir)
            .with_style("poppins", "Poppins-ExtraBold.ttf", DEFAULT_FONT_SIZE)
            .with_style("poetsenOne", "PoetsenOne-Regular.ttf", DEFAULT_FONT_SIZE)
            .with_style("alfaSlab", "AlfaSlabOne-Regular.ttf", DEFAULT_FONT_SIZE)
            .with_style("titanOne", "TitanOne-Regular.ttf", DEFAULT_FONT_SIZE)
    }

    pub fn with_style(mut self, name: &str, file_name: &str, size: u32) -> Self {
        self.styles.insert(
            name.to_string(),
            FontStyle {
                name: name.to_string(),
                file_name: file_name.to_string(),
                size,
            },
        );
        self
    }

    pub fn fonts_dir(&self) -> &Path {
        &self.fonts_dir
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }

    /// Look up a style without touching the filesystem.
    pub fn style(&self, name: &str) -> Result<&FontStyle, FontError> {
        self.styles.get(name).ok_or_else(|| FontError::UnknownStyle {
            requested: name.to_string(),
            available: self.names().collect::<Vec<_>>().join(", "),
        })
    }

    /// Look up a style and confirm its font file exists.
    pub fn resolve(&self, name: &str) -> Result<ResolvedFont, FontError> {
        let style = self.style(name)?;
        let path = self.fonts_dir.join(&style.file_name);
        if !path.is_file() {
            return Err(FontError::MissingFile(path));
        }
        Ok(ResolvedFont {
            name: style.name.clone(),
            path,
            size: style.size,
        })
    }
}
