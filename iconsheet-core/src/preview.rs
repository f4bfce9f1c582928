//! Preview Page

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::IconsheetConfig;
use crate::encode::write_atomic;
use crate::manifest::is_icon;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write preview {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub trait PreviewAssembler {
    /// Render a page showing every icon staged in `work_dir`.
    fn assemble(
        &self,
        work_dir: &Path,
        dest: &Path,
        config: &IconsheetConfig,
    ) -> Result<PathBuf, PreviewError>;
}

const DEFAULT_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Icon preview</title>
<style>body { font-family: sans-serif; } .icon { display: inline-block; margin: 1em; } pre { margin: 0; }</style>
<script>{{loader}}</script>
</head>
<body>
{{icons}}
</body>
</html>
"#;

/// Placeholder-substituting HTML page (`{{icons}}`, `{{loader}}`, `{{cssprefix}}`).
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlPreview;

impl PreviewAssembler for HtmlPreview {
    fn assemble(
        &self,
        work_dir: &Path,
        dest: &Path,
        config: &IconsheetConfig,
    ) -> Result<PathBuf, PreviewError> {
        let template = match &config.preview_template {
            Some(path) => read(path)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        let loader = if config.loader {
            read(&dest.join(&config.loadersnippet))?
        } else {
            String::new()
        };

        let class_prefix = config.cssprefix.trim_start_matches('.');
        let mut icons = String::new();
        for name in icon_names(work_dir)? {
            let _ = writeln!(
                icons,
                "<div class=\"icon\"><div class=\"{}{}\"></div><pre>{}{}</pre></div>",
                class_prefix, name, config.cssprefix, name
            );
        }

        let html = template
            .replace("{{icons}}", icons.trim_end())
            .replace("{{loader}}", &loader)
            .replace("{{cssprefix}}", &config.cssprefix);

        let out = dest.join(&config.previewhtml);
        write_atomic(&out, html.as_bytes()).map_err(|source| PreviewError::Write {
            path: out.clone(),
            source,
        })?;
        Ok(out)
    }
}

fn read(path: &Path) -> Result<String, PreviewError> {
    fs::read_to_string(path).map_err(|source| PreviewError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn icon_names(dir: &Path) -> Result<Vec<String>, PreviewError> {
    let wrap = |source| PreviewError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = vec![];
    for entry in fs::read_dir(dir).map_err(wrap)? {
        let path = entry.map_err(wrap)?.path();
        if path.is_file() && is_icon(&path) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preview_lists_icons() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(work.path().join("star-dark.svg"), "<svg/>").unwrap();
        fs::write(work.path().join("moon.png"), [0u8]).unwrap();

        let config = IconsheetConfig::default();
        let out = HtmlPreview.assemble(work.path(), dest.path(), &config).unwrap();

        let html = fs::read_to_string(out).unwrap();
        assert!(html.contains(r#"<div class="icon-moon"></div><pre>.icon-moon</pre>"#));
        assert!(html.contains(r#"<div class="icon-star-dark"></div>"#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_custom_template() {
        let work = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let template = dest.path().join("preview.tpl");
        fs::write(&template, "prefix={{cssprefix}}").unwrap();

        let config = IconsheetConfig {
            preview_template: Some(template),
            previewhtml: "index.html".to_string(),
            ..Default::default()
        };
        let out = HtmlPreview.assemble(work.path(), dest.path(), &config).unwrap();
        assert_eq!(out, dest.path().join("index.html"));
        assert_eq!(fs::read_to_string(out).unwrap(), "prefix=.icon-");
    }

    #[test]
    fn test_missing_template_fails() {
        let work = tempfile::tempdir().unwrap();
        let config = IconsheetConfig {
            preview_template: Some(work.path().join("nope.tpl")),
            ..Default::default()
        };
        let result = HtmlPreview.assemble(work.path(), work.path(), &config);
        assert!(matches!(result, Err(PreviewError::Read { .. })));
    }
}
