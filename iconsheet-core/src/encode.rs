//! Encoder - Icon Directory to Stylesheet
//!
//! One rule per icon. Data-URI mode inlines the file; URL mode points at
//! the raster folder so clients without data URI support still get images.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::manifest::{has_extension, ICON_EXTENSIONS};
use crate::svg;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read PNG dimensions of {path}: {source}")]
    Dimensions {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Cannot write stylesheet {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum EncodeMode {
    DataUri,
    /// `url('<base>/<folder>/<file>')`, base omitted when empty
    Url { base: String, folder: String },
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub prefix: String,
    pub custom_selectors: BTreeMap<String, Vec<String>>,
    pub default_width: String,
    pub default_height: String,
    pub mode: EncodeMode,
}

pub trait Encoder {
    /// Write a stylesheet for every icon in `source_dir` to `output`,
    /// returning the icon names in rule order.
    fn encode(
        &self,
        source_dir: &Path,
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<Vec<String>, EncodeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryEncoder;

impl Encoder for DirectoryEncoder {
    fn encode(
        &self,
        source_dir: &Path,
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<Vec<String>, EncodeError> {
        let mut css = String::new();
        let mut names = vec![];

        for path in icon_files(source_dir)? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let is_svg = has_extension(&path, &["svg"]);
            let bytes = fs::read(&path).map_err(|source| EncodeError::Read {
                path: path.clone(),
                source,
            })?;

            let (width, height) = if is_svg {
                let (w, h) = svg::intrinsic_size(&String::from_utf8_lossy(&bytes));
                (w.map(px), h.map(px))
            } else {
                let (w, h) = image::image_dimensions(&path).map_err(|source| {
                    EncodeError::Dimensions {
                        path: path.clone(),
                        source,
                    }
                })?;
                (Some(format!("{}px", w)), Some(format!("{}px", h)))
            };

            let background = match &options.mode {
                EncodeMode::DataUri if is_svg => format!(
                    "data:image/svg+xml;charset=US-ASCII,{}",
                    percent_encode(&bytes)
                ),
                EncodeMode::DataUri => format!(
                    "data:image/png;base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(&bytes)
                ),
                EncodeMode::Url { base, folder } => {
                    let file = path.file_name().and_then(|f| f.to_str()).unwrap_or(name);
                    icon_url(base, folder, file)
                }
            };

            let rule = CssRule {
                selectors: selectors(name, options),
                image: background,
                width: width.unwrap_or_else(|| css_length(&options.default_width)),
                height: height.unwrap_or_else(|| css_length(&options.default_height)),
            };
            rule.write_to(&mut css);
            names.push(name.to_string());
        }

        write_atomic(output, css.as_bytes()).map_err(|source| EncodeError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        debug!(stylesheet = %output.display(), rules = names.len(), "Stylesheet written");

        Ok(names)
    }
}

struct CssRule {
    selectors: Vec<String>,
    image: String,
    width: String,
    height: String,
}

impl CssRule {
    fn write_to(&self, css: &mut String) {
        let _ = writeln!(
            css,
            "{} {{ background-image: url('{}'); background-repeat: no-repeat; width: {}; height: {}; }}",
            self.selectors.join(",\n"),
            self.image,
            self.width,
            self.height
        );
    }
}

fn selectors(name: &str, options: &EncodeOptions) -> Vec<String> {
    let mut selectors = vec![format!("{}{}", options.prefix, name)];
    if let Some(custom) = options.custom_selectors.get(name) {
        selectors.extend(custom.iter().cloned());
    }
    selectors
}

fn icon_files(dir: &Path) -> Result<Vec<PathBuf>, EncodeError> {
    let wrap = |source| EncodeError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = vec![];
    for entry in fs::read_dir(dir).map_err(wrap)? {
        let path = entry.map_err(wrap)?.path();
        if path.is_file() && has_extension(&path, ICON_EXTENSIONS) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn icon_url(base: &str, folder: &str, file: &str) -> String {
    let base = base.trim_end_matches('/');
    let folder = folder.trim_matches('/');
    [base, folder, file]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

fn px(value: f32) -> String {
    format!("{}px", value)
}

/// Bare numbers get a `px` unit, anything else passes through.
fn css_length(value: &str) -> String {
    let value = value.trim();
    match value.parse::<f32>() {
        Ok(number) => px(number),
        Err(_) => value.to_string(),
    }
}

/// Escape like `encodeURIComponent`, also escaping `'` for quoted `url()`.
pub fn percent_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'(' | b')' => {
                out.push(b as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

/// Write through a sibling temp file and rename into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
