//! Build Pipeline - Single Entry Point
//!
//! Stages run strictly in order: palette, colorize, transfer, rasterize,
//! three stylesheet passes, preview, cleanup. Any stage failure except
//! the preview ends the run. Destination writes are not rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::colorize::{ColorMode, ColorizeError, Colorizer, DirectoryColorizer};
use crate::config::{parse_px, ConfigError, IconsheetConfig};
use crate::encode::{DirectoryEncoder, EncodeError, EncodeMode, EncodeOptions, Encoder};
use crate::hashing::{compute_input_hash, compute_report_hash, file_sha256};
use crate::loader::{write_loader, LoaderError};
use crate::manifest::{is_color_source, FileManifest};
use crate::palette::{load_palette, Palette};
use crate::preview::{HtmlPreview, PreviewAssembler};
use crate::rasterize::{RasterOptions, RasterizeError, Rasterizer, ResvgRasterizer};
use crate::workdir::{WorkDirError, WorkingDirectory};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot create destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("{0}")]
    WorkDir(#[from] WorkDirError),

    #[error("Colorizing failed: {0}")]
    Colorize(#[from] ColorizeError),

    #[error("Cannot copy {path} into working directory: {source}")]
    Transfer {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Rasterizing failed: {0}")]
    Rasterize(#[from] RasterizeError),

    #[error("Writing {stylesheet} failed: {source}")]
    Encode {
        stylesheet: String,
        #[source]
        source: EncodeError,
    },

    #[error("Cannot hash artifact {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    InlineSvg,
    InlinePng,
    FallbackPng,
    Loader,
    Preview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrittenArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub input_hash: String,
    pub color_mode: ColorMode,
    pub palette: Palette,
    /// Working directory used by this run, already removed
    pub work_dir: PathBuf,
    /// File names of colored variants
    pub variants: Vec<String>,
    /// File names copied into the working directory as-is
    pub transferred: Vec<String>,
    pub rasters: Vec<PathBuf>,
    pub artifacts: Vec<WrittenArtifact>,
    #[serde(default)]
    pub preview_error: Option<String>,
    pub report_hash: String,
}

impl BuildReport {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&WrittenArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The manifest held no icons; nothing was touched
    NothingToProcess,
    Completed(BuildReport),
}

/// The build pipeline - owns the capabilities and the working directory
pub struct IconPipeline {
    config: IconsheetConfig,
    colorizer: Box<dyn Colorizer>,
    rasterizer: Box<dyn Rasterizer>,
    encoder: Box<dyn Encoder>,
    preview: Box<dyn PreviewAssembler>,
}

impl IconPipeline {
    pub fn new(config: IconsheetConfig) -> Self {
        Self {
            config,
            colorizer: Box::new(DirectoryColorizer),
            rasterizer: Box::new(ResvgRasterizer),
            encoder: Box::new(DirectoryEncoder),
            preview: Box::new(HtmlPreview),
        }
    }

    pub fn with_colorizer(mut self, colorizer: impl Colorizer + 'static) -> Self {
        self.colorizer = Box::new(colorizer);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    pub fn with_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn with_preview(mut self, preview: impl PreviewAssembler + 'static) -> Self {
        self.preview = Box::new(preview);
        self
    }

    pub fn config(&self) -> &IconsheetConfig {
        &self.config
    }

    /// Path the working directory would occupy. With `unique_work_dir` every
    /// call yields a fresh path; the one a run used is in `BuildReport::work_dir`.
    pub fn work_dir_path(&self) -> PathBuf {
        WorkingDirectory::resolve_path(
            self.config.work_root.as_deref(),
            &self.config.tmp_dir,
            self.config.unique_work_dir,
        )
    }

    /// Run every stage for `manifest`.
    pub fn run(&self, manifest: &FileManifest) -> Result<RunOutcome, PipelineError> {
        let config = &self.config;

        if manifest.is_empty() {
            info!("No icon files to read");
            return Ok(RunOutcome::NothingToProcess);
        }

        // Fail before any side effect
        config.validate()?;
        let dest = config.destination()?;
        let raster_options = self.raster_options()?;
        let src = self.source_dir(manifest);

        info!(files = manifest.len(), src = %src.display(), dest = %dest.display(), "Building icon stylesheets");

        fs::create_dir_all(dest).map_err(|source| PipelineError::Destination {
            path: dest.to_path_buf(),
            source,
        })?;

        let mut artifacts = vec![];
        if config.loader {
            info!("Minifying stylesheet loader");
            let path = write_loader(config, dest)?;
            artifacts.push(artifact(ArtifactKind::Loader, path)?);
        }

        let palette = load_palette(&config.colors, config.stylesheet.as_deref(), &config.lessprefix);
        let color_mode = ColorMode::resolve(&palette, config.dynamic_color_only);
        if config.dynamic_color_only && color_mode == ColorMode::CopyThrough {
            warn!("Palette is empty, filename colors are used as-is instead of restricting to the palette");
        }
        debug!(colors = palette.len(), mode = ?color_mode, "Palette resolved");

        let work = WorkingDirectory::create_fresh(self.work_dir_path())?;
        let work_dir = work.path().to_path_buf();
        debug!(path = %work_dir.display(), "Working directory created");

        let staged = self.stage(manifest, &src, dest, &work, &palette, color_mode, &raster_options);
        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                warn!(path = %work.path().display(), "Working directory left in place after failure");
                return Err(e);
            }
        };
        artifacts.extend(staged.artifacts);

        let mut preview_error = None;
        if config.preview {
            info!("Creating preview file");
            match self.preview.assemble(work.path(), dest, config) {
                Ok(path) => artifacts.push(artifact(ArtifactKind::Preview, path)?),
                Err(e) => {
                    error!(error = %e, "Preview failed, stylesheets are kept");
                    preview_error = Some(e.to_string());
                }
            }
        }

        info!("Deleting temp files");
        work.remove()?;

        let input_hash = compute_input_hash(config, &manifest.files(), ENGINE_VERSION)?;
        let mut report = BuildReport {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            input_hash,
            color_mode,
            palette,
            work_dir,
            variants: staged.variants,
            transferred: staged.transferred,
            rasters: staged.rasters,
            artifacts,
            preview_error,
            report_hash: String::new(), // Computed after
        };
        report.report_hash = compute_report_hash(&report)?;

        Ok(RunOutcome::Completed(report))
    }

    /// Stages that read or write the working directory.
    #[allow(clippy::too_many_arguments)]
    fn stage(
        &self,
        manifest: &FileManifest,
        src: &Path,
        dest: &Path,
        work: &WorkingDirectory,
        palette: &Palette,
        color_mode: ColorMode,
        raster_options: &RasterOptions,
    ) -> Result<Staged, PipelineError> {
        let config = &self.config;

        info!("Coloring SVG files");
        for path in nested_color_sources(manifest, src) {
            warn!(
                icon = %path.display(),
                src = %src.display(),
                "Color icon outside the top level of the source directory is not colored"
            );
        }
        let variants = self.colorizer.convert(src, work.path(), palette, color_mode)?;

        let transferred = transfer(manifest, work.path())?;

        info!("Converting SVG to PNG");
        let rasters = self.rasterizer.convert(work.path(), dest, raster_options)?;

        info!("Writing CSS");
        let png_dir = dest.join(&raster_options.png_folder);
        let passes = [
            (ArtifactKind::InlineSvg, work.path(), &config.datasvgcss, EncodeMode::DataUri),
            (ArtifactKind::InlinePng, png_dir.as_path(), &config.datapngcss, EncodeMode::DataUri),
            (
                ArtifactKind::FallbackPng,
                png_dir.as_path(),
                &config.urlpngcss,
                EncodeMode::Url {
                    base: config.pngpath.clone(),
                    folder: config.png_folder_url(),
                },
            ),
        ];

        let mut artifacts = vec![];
        for (kind, source_dir, name, mode) in passes {
            let output = dest.join(name);
            let options = self.encode_options(mode);
            self.encoder
                .encode(source_dir, &output, &options)
                .map_err(|source| PipelineError::Encode {
                    stylesheet: name.clone(),
                    source,
                })?;
            artifacts.push(artifact(kind, output)?);
        }

        Ok(Staged {
            variants: file_names(&variants),
            transferred,
            rasters,
            artifacts,
        })
    }

    fn encode_options(&self, mode: EncodeMode) -> EncodeOptions {
        EncodeOptions {
            prefix: self.config.cssprefix.clone(),
            custom_selectors: self.config.customselectors.clone(),
            default_width: self.config.default_width.clone(),
            default_height: self.config.default_height.clone(),
            mode,
        }
    }

    fn raster_options(&self) -> Result<RasterOptions, ConfigError> {
        let size = |field: &'static str, value: &str| {
            parse_px(value).ok_or_else(|| ConfigError::InvalidSize {
                field,
                value: value.to_string(),
            })
        };
        Ok(RasterOptions {
            png_folder: self.config.png_folder(),
            default_width: size("defaultWidth", &self.config.default_width)?,
            default_height: size("defaultHeight", &self.config.default_height)?,
        })
    }

    /// Configured source, else the directory holding the first input.
    fn source_dir(&self, manifest: &FileManifest) -> PathBuf {
        if let Some(src) = &self.config.src {
            return src.clone();
        }
        manifest
            .files()
            .first()
            .and_then(|f| f.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

struct Staged {
    variants: Vec<String>,
    transferred: Vec<String>,
    rasters: Vec<PathBuf>,
    artifacts: Vec<WrittenArtifact>,
}

/// Copy files the colorizer does not own, flattened to their base names.
/// When two inputs share a name the later one wins.
fn transfer(manifest: &FileManifest, work_dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut transferred = vec![];
    let mut seen: HashMap<OsString, &PathBuf> = HashMap::new();
    for file in manifest.transfer_files() {
        let Some(name) = file.file_name() else {
            continue;
        };
        fs::copy(file, work_dir.join(name)).map_err(|source| PipelineError::Transfer {
            path: file.clone(),
            source,
        })?;
        match seen.insert(name.to_os_string(), file) {
            Some(previous) => warn!(
                name = %name.to_string_lossy(),
                replaced = %previous.display(),
                kept = %file.display(),
                "Icons share a file name once flattened, the later one is kept"
            ),
            None => transferred.push(name.to_string_lossy().into_owned()),
        }
    }
    Ok(transferred)
}

/// Color-owned manifest entries the colorizer will not see: it only reads
/// the top level of the source directory.
fn nested_color_sources<'a>(manifest: &'a FileManifest, src: &Path) -> Vec<&'a PathBuf> {
    manifest
        .files()
        .iter()
        .filter(|f| is_color_source(f) && f.parent() != Some(src))
        .collect()
}

fn artifact(kind: ArtifactKind, path: PathBuf) -> Result<WrittenArtifact, PipelineError> {
    let sha256 = file_sha256(&path).map_err(|source| PipelineError::Hash {
        path: path.clone(),
        source,
    })?;
    Ok(WrittenArtifact { kind, path, sha256 })
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct RecordingColorizer(Log);

    impl Colorizer for RecordingColorizer {
        fn convert(
            &self,
            _source_dir: &Path,
            dest_dir: &Path,
            _palette: &Palette,
            mode: ColorMode,
        ) -> Result<Vec<PathBuf>, ColorizeError> {
            let stale = fs::read_dir(dest_dir).map(|d| d.count()).unwrap_or(0);
            self.0.borrow_mut().push(format!("colorize:{:?}:{}", mode, stale));
            Ok(vec![])
        }
    }

    struct RecordingRasterizer(Log);

    impl Rasterizer for RecordingRasterizer {
        fn convert(
            &self,
            source_dir: &Path,
            dest_dir: &Path,
            options: &RasterOptions,
        ) -> Result<Vec<PathBuf>, RasterizeError> {
            let staged = fs::read_dir(source_dir).map(|d| d.count()).unwrap_or(0);
            self.0.borrow_mut().push(format!("rasterize:{}", staged));
            fs::create_dir_all(dest_dir.join(&options.png_folder)).unwrap();
            Ok(vec![])
        }
    }

    struct RecordingEncoder {
        log: Log,
        fail_on: Option<&'static str>,
    }

    impl Encoder for RecordingEncoder {
        fn encode(
            &self,
            _source_dir: &Path,
            output: &Path,
            options: &EncodeOptions,
        ) -> Result<Vec<String>, EncodeError> {
            let name = output.file_name().unwrap().to_string_lossy().into_owned();
            self.log.borrow_mut().push(format!("encode:{}", name));
            if self.fail_on == Some(name.as_str()) {
                return Err(EncodeError::Write {
                    path: output.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            let body = match &options.mode {
                EncodeMode::DataUri => "inline",
                EncodeMode::Url { .. } => "url",
            };
            fs::write(output, body).unwrap();
            Ok(vec![])
        }
    }

    fn setup(fail_on: Option<&'static str>) -> (tempfile::TempDir, IconPipeline, Log, FileManifest) {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("plain.svg"), "<svg/>").unwrap();

        let config = IconsheetConfig {
            src: Some(src.clone()),
            dest: Some(root.path().join("out")),
            work_root: Some(root.path().to_path_buf()),
            ..Default::default()
        };
        let log: Log = Rc::default();
        let pipeline = IconPipeline::new(config)
            .with_colorizer(RecordingColorizer(log.clone()))
            .with_rasterizer(RecordingRasterizer(log.clone()))
            .with_encoder(RecordingEncoder {
                log: log.clone(),
                fail_on,
            });
        let manifest = FileManifest::from_paths([src.join("plain.svg")]);
        (root, pipeline, log, manifest)
    }

    #[test]
    fn test_stage_order() {
        let (_root, pipeline, log, manifest) = setup(None);
        let report = match pipeline.run(&manifest).unwrap() {
            RunOutcome::Completed(report) => report,
            RunOutcome::NothingToProcess => panic!("expected a completed build"),
        };

        assert_eq!(
            *log.borrow(),
            vec![
                "colorize:CopyThrough:0",
                "rasterize:1",
                "encode:icons.data.svg.css",
                "encode:icons.data.png.css",
                "encode:icons.fallback.css",
            ]
        );
        assert_eq!(report.work_dir, pipeline.work_dir_path());
        assert!(!report.work_dir.exists());
    }

    #[test]
    fn test_unique_work_dir_recorded_in_report() {
        let (root, pipeline, _log, manifest) = setup(None);
        let mut config = pipeline.config().clone();
        config.unique_work_dir = true;
        let pipeline = IconPipeline::new(config)
            .with_rasterizer(RecordingRasterizer(Rc::default()))
            .with_encoder(RecordingEncoder {
                log: Rc::default(),
                fail_on: None,
            });

        let report = match pipeline.run(&manifest).unwrap() {
            RunOutcome::Completed(report) => report,
            RunOutcome::NothingToProcess => panic!("expected a completed build"),
        };
        assert_eq!(report.work_dir.parent(), Some(root.path()));
        let name = report.work_dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("iconsheet-tmp-"), "{}", name);
        assert!(!report.work_dir.exists());
    }

    #[test]
    fn test_transfer_flattens_and_reports_collisions() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(root.path().join("a")).unwrap();
        fs::create_dir_all(root.path().join("b")).unwrap();
        fs::create_dir(&work).unwrap();
        fs::write(root.path().join("a").join("dot.svg"), "first").unwrap();
        fs::write(root.path().join("b").join("dot.svg"), "second").unwrap();
        fs::write(root.path().join("b").join("ring.svg"), "ring").unwrap();

        let manifest = FileManifest::from_paths([
            root.path().join("a").join("dot.svg"),
            root.path().join("b").join("dot.svg"),
            root.path().join("b").join("ring.svg"),
        ]);
        let transferred = transfer(&manifest, &work).unwrap();

        assert_eq!(transferred, vec!["dot.svg", "ring.svg"]);
        assert_eq!(fs::read_to_string(work.join("dot.svg")).unwrap(), "second");
    }

    #[test]
    fn test_nested_color_sources_detected() {
        let manifest = FileManifest::from_paths([
            "icons/star.colors.svg",
            "icons/sub/moon.colors-red.svg",
            "icons/sub/plain.svg",
        ]);
        let nested = nested_color_sources(&manifest, Path::new("icons"));
        assert_eq!(nested, vec![&PathBuf::from("icons/sub/moon.colors-red.svg")]);
    }

    #[test]
    fn test_encode_failure_aborts_remaining_passes() {
        let (_root, pipeline, log, manifest) = setup(Some("icons.data.png.css"));
        let err = pipeline.run(&manifest).unwrap_err();

        assert!(matches!(err, PipelineError::Encode { ref stylesheet, .. } if stylesheet == "icons.data.png.css"));
        assert!(!log.borrow().iter().any(|e| e == "encode:icons.fallback.css"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_invalid_default_size_fails_before_io() {
        let (_root, pipeline, log, manifest) = setup(None);
        let mut config = pipeline.config().clone();
        config.default_width = "wide".to_string();
        let dest = config.dest.clone().unwrap();
        let pipeline = IconPipeline::new(config).with_colorizer(RecordingColorizer(log.clone()));

        let err = pipeline.run(&manifest).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::InvalidSize { .. })));
        assert!(!dest.exists());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_source_dir_falls_back_to_first_input() {
        let pipeline = IconPipeline::new(IconsheetConfig::default());
        let manifest = FileManifest::from_paths(["icons/a.svg"]);
        assert_eq!(pipeline.source_dir(&manifest), PathBuf::from("icons"));
        let bare = FileManifest::from_paths(["a.svg"]);
        assert_eq!(pipeline.source_dir(&bare), PathBuf::from("."));
    }
}
