//! Color Palette - Stylesheet Variable Extraction
//!
//! Reads top-level `@name: value;` declarations from a preprocessor
//! source. A value that references another variable is resolved with a
//! single lookup into the declarations seen so far; forward references
//! and chains through unresolved names stay unresolved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub type Palette = BTreeMap<String, String>;

const SIGIL: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum VariableValue {
    Resolved(String),
    /// Reference to a variable not declared above this line
    Unresolved(String),
}

impl VariableValue {
    pub fn as_resolved(&self) -> Option<&str> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Unresolved(_) => None,
        }
    }
}

/// Variable name (sigil included) -> value.
pub type Variables = BTreeMap<String, VariableValue>;

pub fn parse_variables(source: &str) -> Variables {
    let mut vars = Variables::new();

    for line in source.lines() {
        if !line.starts_with(SIGIL) {
            continue;
        }
        let statement = line.split(';').next().unwrap_or_default();
        let Some((name, value)) = statement.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        let resolved = if value.contains(SIGIL) {
            match vars.get(value).and_then(VariableValue::as_resolved) {
                Some(target) => VariableValue::Resolved(target.to_string()),
                None => VariableValue::Unresolved(value.to_string()),
            }
        } else {
            VariableValue::Resolved(value.to_string())
        };
        vars.insert(name.to_string(), resolved);
    }

    vars
}

/// Keep variables named `@<prefix>...`, keyed by the remainder of the name.
pub fn extract_palette(source: &str, prefix: &str) -> Palette {
    let mut palette = Palette::new();

    for (name, value) in parse_variables(source) {
        let Some(color_name) = name
            .strip_prefix(SIGIL)
            .and_then(|bare| bare.strip_prefix(prefix))
        else {
            continue;
        };
        if color_name.is_empty() {
            continue;
        }
        match value {
            VariableValue::Resolved(color) => {
                palette.insert(color_name.to_string(), color);
            }
            VariableValue::Unresolved(reference) => {
                warn!(variable = %name, %reference, "Color variable references an undeclared name, skipping");
            }
        }
    }

    palette
}

/// Merge `base` with colors extracted from `stylesheet`.
///
/// A missing stylesheet, a directory, or an unreadable file contributes
/// nothing. Names already in `base` are never overwritten.
pub fn load_palette(base: &Palette, stylesheet: Option<&Path>, prefix: &str) -> Palette {
    let mut palette = base.clone();

    let Some(path) = stylesheet else {
        return palette;
    };
    if !path.is_file() {
        debug!(path = %path.display(), "No color stylesheet, using configured colors only");
        return palette;
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            for (name, value) in extract_palette(&source, prefix) {
                palette.entry(name).or_insert(value);
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Color stylesheet unreadable, using configured colors only");
        }
    }

    palette
}
