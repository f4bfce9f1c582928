//! Rasterizer - SVG to PNG
//!
//! Renders with resvg. Icons without root `width`/`height` attributes are
//! rendered at the configured default size.

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::manifest::has_extension;
use crate::svg;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid SVG {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Cannot render {path} at {width}x{height}")]
    Render {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("Cannot write PNG {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Subfolder of the destination receiving the images
    pub png_folder: PathBuf,
    pub default_width: f32,
    pub default_height: f32,
}

pub trait Rasterizer {
    /// Write one PNG per icon in `source_dir` to `dest_dir/<png_folder>`.
    fn convert(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        options: &RasterOptions,
    ) -> Result<Vec<PathBuf>, RasterizeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResvgRasterizer;

impl Rasterizer for ResvgRasterizer {
    fn convert(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        options: &RasterOptions,
    ) -> Result<Vec<PathBuf>, RasterizeError> {
        let out_dir = dest_dir.join(&options.png_folder);
        fs::create_dir_all(&out_dir).map_err(|source| RasterizeError::Io {
            path: out_dir.clone(),
            source,
        })?;

        let mut written = vec![];
        for path in sorted_files(source_dir)? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let out = out_dir.join(format!("{}.png", stem));

            if has_extension(&path, &["svg"]) {
                let content = fs::read_to_string(&path).map_err(|source| RasterizeError::Io {
                    path: path.clone(),
                    source,
                })?;
                let image = render(&path, &content, options)?;
                image.save(&out).map_err(|source| RasterizeError::Write {
                    path: out.clone(),
                    source,
                })?;
                debug!(png = %out.display(), width = image.width(), height = image.height(), "Rasterized");
            } else if has_extension(&path, &["png"]) {
                fs::copy(&path, &out).map_err(|source| RasterizeError::Io {
                    path: out.clone(),
                    source,
                })?;
            } else {
                continue;
            }
            written.push(out);
        }

        Ok(written)
    }
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
    let wrap = |source| RasterizeError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = vec![];
    for entry in fs::read_dir(dir).map_err(wrap)? {
        let path = entry.map_err(wrap)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn render(path: &Path, content: &str, options: &RasterOptions) -> Result<RgbaImage, RasterizeError> {
    let tree = Tree::from_str(content, &Options::default()).map_err(|e| RasterizeError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (width, height) = svg::intrinsic_size(content);
    let width = width.unwrap_or(options.default_width).ceil() as u32;
    let height = height.unwrap_or(options.default_height).ceil() as u32;

    let size = tree.size();
    let transform = Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| RasterizeError::Render {
        path: path.to_path_buf(),
        width,
        height,
    })?;
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    Ok(pixmap_to_rgba_image(&pixmap))
}

fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, out) in pixmap.pixels().iter().zip(img.pixels_mut()) {
        let color = pixel.demultiply();
        *out = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RasterOptions {
        RasterOptions {
            png_folder: PathBuf::from("png"),
            default_width: 40.0,
            default_height: 30.0,
        }
    }

    #[test]
    fn test_renders_intrinsic_and_default_sizes() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(
            src.path().join("sized.svg"),
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="8"><rect width="16" height="8" fill="#f00"/></svg>"##,
        )
        .unwrap();
        fs::write(
            src.path().join("unsized.svg"),
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 4 3"><rect width="4" height="3" fill="#00f"/></svg>"##,
        )
        .unwrap();

        let written = ResvgRasterizer.convert(src.path(), dest.path(), &options()).unwrap();
        assert_eq!(written.len(), 2);

        let sized = image::open(dest.path().join("png").join("sized.png")).unwrap();
        assert_eq!((sized.width(), sized.height()), (16, 8));
        let unsized_ = image::open(dest.path().join("png").join("unsized.png")).unwrap();
        assert_eq!((unsized_.width(), unsized_.height()), (40, 30));
    }

    #[test]
    fn test_invalid_svg_fails() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("broken.svg"), "not svg at all").unwrap();

        let result = ResvgRasterizer.convert(src.path(), dest.path(), &options());
        assert!(matches!(result, Err(RasterizeError::Parse { .. })));
    }
}
