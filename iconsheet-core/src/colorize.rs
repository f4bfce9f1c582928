//! Colorizer - Per-Color Icon Variants
//!
//! Icons named `<name>.colors-<c1>-<c2>.svg` get one copy per listed color.
//! A bare `<name>.colors.svg` gets one copy per palette entry.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::manifest::{has_extension, COLORS_MARKER};
use crate::palette::Palette;
use crate::svg;

#[derive(Debug, Error)]
pub enum ColorizeError {
    #[error("Cannot read icon directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read icon {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write colored icon {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Only filename colors that name a palette entry produce variants
    RestrictToPalette,
    /// Filename colors missing from the palette are used literally
    CopyThrough,
}

impl ColorMode {
    /// An empty palette always colorizes in copy-through mode.
    pub fn resolve(palette: &Palette, restrict_to_palette: bool) -> Self {
        if restrict_to_palette && !palette.is_empty() {
            Self::RestrictToPalette
        } else {
            Self::CopyThrough
        }
    }
}

pub trait Colorizer {
    /// Write colored variants of every color-owned icon in `source_dir`
    /// into `dest_dir`, returning the written paths.
    fn convert(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        palette: &Palette,
        mode: ColorMode,
    ) -> Result<Vec<PathBuf>, ColorizeError>;
}

/// Filename-driven colorizer over the top level of a directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryColorizer;

impl Colorizer for DirectoryColorizer {
    fn convert(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        palette: &Palette,
        mode: ColorMode,
    ) -> Result<Vec<PathBuf>, ColorizeError> {
        let entries = fs::read_dir(source_dir).map_err(|source| ColorizeError::ReadDir {
            path: source_dir.to_path_buf(),
            source,
        })?;

        let mut sources = vec![];
        for entry in entries {
            let entry = entry.map_err(|source| ColorizeError::ReadDir {
                path: source_dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && has_extension(&path, &["svg"]) {
                if let Some(spec) = ColorSpec::from_path(&path) {
                    sources.push((path, spec));
                }
            }
        }
        sources.sort_by(|a, b| a.0.cmp(&b.0));

        let mut written = vec![];
        for (path, spec) in sources {
            let variants = spec.variants(palette, mode);
            if variants.is_empty() && mode == ColorMode::RestrictToPalette {
                warn!(icon = %path.display(), "No colors resolved for icon, no variants written");
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|source| ColorizeError::Read {
                path: path.clone(),
                source,
            })?;

            if variants.is_empty() {
                // Copy-through keeps an uncolored icon under its base name
                let out = dest_dir.join(format!("{}.svg", spec.base));
                write_icon(&out, &content)?;
                debug!(icon = %out.display(), "No colors resolved, icon copied unchanged");
                written.push(out);
                continue;
            }

            for (color_name, color_value) in variants {
                let out = dest_dir.join(format!("{}-{}.svg", spec.base, color_name));
                write_icon(&out, &svg::recolor(&content, &color_value))?;
                debug!(variant = %out.display(), color = %color_value, "Colored variant written");
                written.push(out);
            }
        }

        Ok(written)
    }
}

fn write_icon(path: &Path, content: &str) -> Result<(), ColorizeError> {
    fs::write(path, content).map_err(|source| ColorizeError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Colors requested by an icon's file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColorSpec {
    base: String,
    tokens: Vec<String>,
}

impl ColorSpec {
    fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let marker = name.find(COLORS_MARKER)?;
        let base = &name[..marker];
        let rest = &name[marker + COLORS_MARKER.len()..];
        let rest = rest.rsplit_once('.').map_or(rest, |(head, _)| head);

        let mut tokens: Vec<String> = vec![];
        for token in rest.split('-').filter(|t| !t.is_empty()) {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }

        Some(Self {
            base: base.to_string(),
            tokens,
        })
    }

    /// `(variant name, color value)` pairs for this icon.
    fn variants(&self, palette: &Palette, mode: ColorMode) -> Vec<(String, String)> {
        if self.tokens.is_empty() {
            return palette
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
        }

        self.tokens
            .iter()
            .filter_map(|token| match palette.get(token) {
                Some(value) => Some((token.clone(), value.clone())),
                None if mode == ColorMode::CopyThrough => Some((token.clone(), literal_color(token))),
                None => None,
            })
            .collect()
    }
}

fn literal_color(token: &str) -> String {
    let is_hex = matches!(token.len(), 3 | 6 | 8) && token.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex {
        format!("#{}", token)
    } else {
        token.to_string()
    }
}
