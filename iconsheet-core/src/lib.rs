//! Iconsheet Core - Icon Stylesheet Compiler
//!
//! Turns a directory of SVG icons into three stylesheets:
//! 1. Inline SVG data URIs
//! 2. Inline PNG data URIs
//! 3. PNG URLs for clients without data URI support
//!
//! Colored variants come from a palette declared in a preprocessor
//! stylesheet. All staging happens in a working directory owned by one run.

pub mod config;
pub mod palette;
pub mod manifest;
pub mod workdir;
pub mod svg;
pub mod colorize;
pub mod rasterize;
pub mod encode;
pub mod loader;
pub mod preview;
pub mod hashing;
pub mod pipeline;

pub use config::{IconsheetConfig, ConfigError, LoaderFiles};
pub use palette::{Palette, parse_variables, extract_palette, load_palette};
pub use manifest::FileManifest;
pub use colorize::{Colorizer, ColorMode, DirectoryColorizer};
pub use rasterize::{Rasterizer, RasterOptions, ResvgRasterizer};
pub use encode::{Encoder, EncodeMode, EncodeOptions, DirectoryEncoder};
pub use preview::{PreviewAssembler, HtmlPreview};
pub use hashing::{compute_report_hash, compute_input_hash, canonical_json};
pub use pipeline::{IconPipeline, BuildReport, RunOutcome, ArtifactKind, PipelineError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
