//! Build Configuration - Resolved Once Per Run
//!
//! Field names follow the option names users already write in their
//! build files (`datasvgcss`, `cssprefix`, `defaultWidth`, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The destination must be a directory")]
    MissingDestination,

    #[error("Invalid {field} {value:?}, expected a pixel length")]
    InvalidSize { field: &'static str, value: String },

    #[error("Invalid tmpDir {value:?}, expected a relative directory name")]
    InvalidWorkDir { value: String },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Paths to the runtime loader sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderFiles {
    #[serde(default)]
    pub loader: Option<PathBuf>,
    #[serde(default)]
    pub banner: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IconsheetConfig {
    /// Inline SVG stylesheet name
    pub datasvgcss: String,
    /// Inline PNG stylesheet name
    pub datapngcss: String,
    /// URL fallback stylesheet name
    pub urlpngcss: String,
    pub previewhtml: String,
    pub loadersnippet: String,
    pub files: LoaderFiles,
    pub preview_template: Option<PathBuf>,
    pub cssprefix: String,
    /// Icon name -> extra selectors for the same rule
    pub customselectors: BTreeMap<String, Vec<String>>,
    pub default_width: String,
    pub default_height: String,
    /// Pre-supplied palette; never overwritten by stylesheet extraction
    pub colors: BTreeMap<String, String>,
    /// Restrict filename colors to names present in the palette
    pub dynamic_color_only: bool,
    /// Preprocessor source holding color variables
    pub stylesheet: Option<PathBuf>,
    pub lessprefix: String,
    pub pngfolder: String,
    pub pngpath: String,
    pub tmp_dir: String,
    /// Parent of the working directory; OS temp dir when unset
    pub work_root: Option<PathBuf>,
    /// Append a random suffix to `tmp_dir` so concurrent runs never collide
    pub unique_work_dir: bool,
    pub preview: bool,
    pub loader: bool,
    pub src: Option<PathBuf>,
    pub dest: Option<PathBuf>,
}

impl Default for IconsheetConfig {
    fn default() -> Self {
        Self {
            datasvgcss: "icons.data.svg.css".to_string(),
            datapngcss: "icons.data.png.css".to_string(),
            urlpngcss: "icons.fallback.css".to_string(),
            previewhtml: "preview.html".to_string(),
            loadersnippet: "iconsheet.loader.js".to_string(),
            files: LoaderFiles::default(),
            preview_template: None,
            cssprefix: ".icon-".to_string(),
            customselectors: BTreeMap::new(),
            default_width: "400px".to_string(),
            default_height: "300px".to_string(),
            colors: BTreeMap::new(),
            dynamic_color_only: true,
            stylesheet: None,
            lessprefix: String::new(),
            pngfolder: "png".to_string(),
            pngpath: String::new(),
            tmp_dir: "iconsheet-tmp".to_string(),
            work_root: None,
            unique_work_dir: false,
            preview: false,
            loader: false,
            src: None,
            dest: None,
        }
    }
}

impl IconsheetConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Destination directory, rejecting unset and empty values.
    pub fn destination(&self) -> Result<&Path, ConfigError> {
        match &self.dest {
            Some(dest) if !dest.as_os_str().is_empty() => Ok(dest),
            _ => Err(ConfigError::MissingDestination),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.destination()?;
        self.validate_tmp_dir()
    }

    /// The working directory is wiped on every run, so `tmp_dir` must name
    /// something strictly below the work root.
    fn validate_tmp_dir(&self) -> Result<(), ConfigError> {
        let path = Path::new(&self.tmp_dir);
        let mut components = path.components().peekable();
        let only_normal = components.peek().is_some()
            && components.all(|c| matches!(c, Component::Normal(_)));
        // `components()` silently drops interior `.` parts
        let has_cur_dir = self.tmp_dir.split(|c: char| c == '/' || c == '\\').any(|p| p == ".");
        if only_normal && !has_cur_dir && !path.is_absolute() {
            Ok(())
        } else {
            Err(ConfigError::InvalidWorkDir {
                value: self.tmp_dir.clone(),
            })
        }
    }

    /// Raster subfolder as path components, accepting either separator.
    pub fn png_folder(&self) -> PathBuf {
        self.pngfolder
            .split(|c: char| c == '/' || c == '\\')
            .filter(|part| !part.is_empty())
            .collect()
    }

    /// Raster subfolder as it appears in CSS URLs.
    pub fn png_folder_url(&self) -> String {
        self.pngfolder
            .split(|c: char| c == '/' || c == '\\')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Parse a CSS length such as `400px` or `24` into pixels.
pub fn parse_px(value: &str) -> Option<f32> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    number.parse::<f32>().ok().filter(|v| v.is_finite() && *v > 0.0)
}
