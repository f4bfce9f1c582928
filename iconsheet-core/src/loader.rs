//! Runtime Loader Script
//!
//! Banner comment + minified loader source, written next to the stylesheets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::IconsheetConfig;
use crate::encode::write_atomic;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Loader requested but no {0} file configured")]
    MissingSource(&'static str),

    #[error("Cannot read loader source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Loader source {path} has an unterminated {what}")]
    Unterminated { path: PathBuf, what: &'static str },

    #[error("Cannot write loader {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Build and write the loader snippet, returning its path.
pub fn write_loader(config: &IconsheetConfig, dest: &Path) -> Result<PathBuf, LoaderError> {
    let banner_path = config
        .files
        .banner
        .as_deref()
        .ok_or(LoaderError::MissingSource("banner"))?;
    let loader_path = config
        .files
        .loader
        .as_deref()
        .ok_or(LoaderError::MissingSource("loader"))?;

    let banner = read(banner_path)?;
    let source = read(loader_path)?;
    let minified = minify(&source).map_err(|what| LoaderError::Unterminated {
        path: loader_path.to_path_buf(),
        what,
    })?;

    let out = dest.join(&config.loadersnippet);
    let contents = format!("{}\n{}", banner, minified);
    write_atomic(&out, contents.as_bytes()).map_err(|source| LoaderError::Write {
        path: out.clone(),
        source,
    })?;

    Ok(out)
}

fn read(path: &Path) -> Result<String, LoaderError> {
    fs::read_to_string(path).map_err(|source| LoaderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Strip comments, indentation and blank lines. Line breaks are kept so
/// automatic semicolon insertion still sees the same statements.
pub fn minify(source: &str) -> Result<String, &'static str> {
    let stripped = strip_comments(source)?;
    let lines: Vec<&str> = stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    Ok(lines.join("\n"))
}

fn strip_comments(source: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' | '`' => {
                out.push(c);
                let mut closed = false;
                while let Some(s) = chars.next() {
                    out.push(s);
                    if s == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if s == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err("string literal");
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for s in chars.by_ref() {
                    if s == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for s in chars.by_ref() {
                    if s == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && s == '/' {
                        closed = true;
                        break;
                    }
                    prev = s;
                }
                if !closed {
                    return Err("block comment");
                }
            }
            '/' if regex_allowed(&out) => {
                out.push(c);
                let mut in_class = false;
                let mut closed = false;
                while let Some(s) = chars.next() {
                    if s == '\n' {
                        break;
                    }
                    out.push(s);
                    match s {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '[' => in_class = true,
                        ']' => in_class = false,
                        '/' if !in_class => {
                            closed = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return Err("regular expression");
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// A `/` starts a regular expression literal rather than a division when
/// it opens a line or follows an operator, an opening bracket or one of
/// the keywords that take an expression.
fn regex_allowed(out: &str) -> bool {
    let before = out.trim_end_matches(|c: char| c == ' ' || c == '\t');
    let Some(last) = before.chars().next_back() else {
        return true;
    };
    // `i++ / 2`
    if before.ends_with("++") || before.ends_with("--") {
        return false;
    }
    if matches!(
        last,
        '\n' | '\r' | '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '+' | '-' | '*' | '%' | '<' | '>' | '~' | '^'
    ) {
        return true;
    }

    let word_start = before
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .map_or(0, |i| i + 1);
    matches!(
        &before[word_start..],
        "return" | "typeof" | "case" | "do" | "else" | "in" | "of" | "void" | "delete" | "throw" | "new"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderFiles;

    #[test]
    fn test_minify_strips_comments_keeps_strings() {
        let source = "/* header */\nvar a = \"//not a comment\"; // trailing\n\n    var b = '/*x*/';\n";
        let min = minify(source).unwrap();
        assert_eq!(min, "var a = \"//not a comment\";\nvar b = '/*x*/';");
    }

    #[test]
    fn test_minify_rejects_unterminated_comment() {
        assert_eq!(minify("var a; /* open"), Err("block comment"));
        assert_eq!(minify("var a = 'open"), Err("string literal"));
    }

    #[test]
    fn test_minify_keeps_regex_literals() {
        let source = "var q = /['\"]/g; // quotes\nvar c = s.replace(/\\/\\*|[/]/, '');\nreturn /x/.test(a) ? a / 2 : b / 3;\n";
        let min = minify(source).unwrap();
        assert_eq!(
            min,
            "var q = /['\"]/g;\nvar c = s.replace(/\\/\\*|[/]/, '');\nreturn /x/.test(a) ? a / 2 : b / 3;"
        );
    }

    #[test]
    fn test_minify_rejects_unterminated_regex() {
        assert_eq!(minify("var r = /abc\nvar x = 1;"), Err("regular expression"));
    }

    #[test]
    fn test_write_loader_prepends_banner() {
        let dir = tempfile::tempdir().unwrap();
        let banner = dir.path().join("banner.js");
        let loader = dir.path().join("loader.js");
        fs::write(&banner, "/*! loader v1 */").unwrap();
        fs::write(&loader, "  // setup\n  window.x = 1;\n").unwrap();

        let config = IconsheetConfig {
            loader: true,
            files: LoaderFiles {
                loader: Some(loader),
                banner: Some(banner),
            },
            ..Default::default()
        };
        let out = write_loader(&config, dir.path()).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "/*! loader v1 */\nwindow.x = 1;");
    }

    #[test]
    fn test_write_loader_requires_sources() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_loader(&IconsheetConfig::default(), dir.path());
        assert!(matches!(result, Err(LoaderError::MissingSource("banner"))));
    }
}
