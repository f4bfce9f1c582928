//! Input File Manifest

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the pipeline treats as icons.
pub const ICON_EXTENSIONS: &[&str] = &["svg", "png"];

/// Marker in a file name that hands the file to the colorizer.
pub const COLORS_MARKER: &str = ".colors";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileManifest {
    files: Vec<PathBuf>,
}

impl FileManifest {
    /// Keep only paths with a recognized icon extension, in the given order.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let files = paths
            .into_iter()
            .map(Into::into)
            .filter(|p| is_icon(p))
            .collect();
        Self { files }
    }

    /// Recursively collect icons below `dir`, sorted by path.
    pub fn discover(dir: &Path) -> Self {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_icon(p))
            .collect();
        files.sort();
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Files the colorizer does not produce variants for.
    pub fn transfer_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().filter(|p| !is_color_source(p))
    }
}

pub fn is_icon(path: &Path) -> bool {
    has_extension(path, ICON_EXTENSIONS)
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| *e == ext)
        })
        .unwrap_or(false)
}

pub fn is_color_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(COLORS_MARKER))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_from_paths_filters_extensions() {
        let manifest = FileManifest::from_paths(["a.svg", "b.PNG", "c.txt", "d"]);
        assert_eq!(manifest.files(), &[PathBuf::from("a.svg"), PathBuf::from("b.PNG")]);
    }

    #[test]
    fn test_transfer_excludes_color_sources() {
        let manifest = FileManifest::from_paths(["icons/bear.colors-red.svg", "icons/sub/cat.svg"]);
        let transfer: Vec<_> = manifest.transfer_files().collect();
        assert_eq!(transfer, vec![&PathBuf::from("icons/sub/cat.svg")]);
    }

    #[test]
    fn test_discover_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("z.svg"), "<svg/>").unwrap();
        fs::write(dir.path().join("nested").join("a.png"), [0u8]).unwrap();
        fs::write(dir.path().join("notes.md"), "x").unwrap();

        let manifest = FileManifest::discover(dir.path());
        assert_eq!(manifest.len(), 2);
        assert!(manifest.files()[0].ends_with("nested/a.png"));
        assert!(manifest.files()[1].ends_with("z.svg"));
    }
}
