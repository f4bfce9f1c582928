//! Text-level SVG helpers shared by the colorizer, rasterizer and encoder.

/// The root `<svg ...>` start tag, if any.
pub fn root_tag(svg: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(found) = svg[offset..].find("<svg") {
        let start = offset + found;
        let after = svg[start + 4..].chars().next();
        if matches!(after, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            let end = svg[start..].find('>')?;
            return Some(&svg[start..=start + end]);
        }
        offset = start + 4;
    }
    None
}

/// Value of attribute `name` on the root element.
pub fn root_attr<'a>(svg: &'a str, name: &str) -> Option<&'a str> {
    attr_value(root_tag(svg)?, name)
}

fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut offset = 0;
    while let Some(found) = tag[offset..].find(name) {
        let start = offset + found;
        offset = start + name.len();

        let before = tag[..start].chars().next_back();
        if !matches!(before, Some(c) if c.is_whitespace()) {
            continue;
        }
        let rest = tag[offset..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let quote = rest.chars().next()?;
        if quote != '"' && quote != '\'' {
            continue;
        }
        let value = &rest[1..];
        let end = value.find(quote)?;
        return Some(&value[..end]);
    }
    None
}

/// Intrinsic size from the root `width`/`height` attributes.
pub fn intrinsic_size(svg: &str) -> (Option<f32>, Option<f32>) {
    let width = root_attr(svg, "width").and_then(crate::config::parse_px);
    let height = root_attr(svg, "height").and_then(crate::config::parse_px);
    (width, height)
}

/// Replace every `fill`/`stroke` value with `color`, keeping `none` and
/// `transparent`. Documents without any fill get one on the root element.
pub fn recolor(svg: &str, color: &str) -> String {
    let has_fill = !value_spans(svg, "fill").is_empty();
    let mut result = replace_color_attr(svg, "fill", color);
    result = replace_color_attr(&result, "stroke", color);

    if !has_fill {
        if let Some(tag) = root_tag(&result) {
            let insert_at = result.find(tag).map(|pos| pos + 4);
            if let Some(pos) = insert_at {
                result.insert_str(pos, &format!(" fill=\"{}\"", color));
            }
        }
    }

    result
}

/// Byte ranges of every quoted `attr` value in the document, either quote
/// style. Compound names such as `data-fill` do not match.
fn value_spans(svg: &str, attr: &str) -> Vec<(usize, usize)> {
    let mut spans = vec![];
    let mut offset = 0;
    while let Some(found) = svg[offset..].find(attr) {
        let start = offset + found;
        offset = start + attr.len();

        let before = svg[..start].chars().next_back();
        if !matches!(before, Some(c) if c.is_whitespace()) {
            continue;
        }
        let after_name = &svg[offset..];
        let Some(rest) = after_name.trim_start().strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let value_start = svg.len() - rest.len() + 1;
        let Some(len) = svg[value_start..].find(quote) else {
            break;
        };
        spans.push((value_start, value_start + len));
        offset = value_start + len + 1;
    }
    spans
}

fn replace_color_attr(svg: &str, attr: &str, new_color: &str) -> String {
    let mut result = String::with_capacity(svg.len());
    let mut copied = 0;

    for (start, end) in value_spans(svg, attr) {
        let value = &svg[start..end];
        result.push_str(&svg[copied..start]);
        if value == "none" || value == "transparent" {
            result.push_str(value);
        } else {
            result.push_str(new_color);
        }
        copied = end;
    }

    result.push_str(&svg[copied..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICON: &str = r##"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" width="24px" height='16' viewBox="0 0 24 16"><path fill="#000" stroke="none" d="M0 0"/></svg>"##;

    #[test]
    fn test_root_attrs() {
        assert_eq!(root_attr(ICON, "width"), Some("24px"));
        assert_eq!(root_attr(ICON, "height"), Some("16"));
        assert_eq!(root_attr(ICON, "fill"), None);
        assert_eq!(intrinsic_size(ICON), (Some(24.0), Some(16.0)));
    }

    #[test]
    fn test_missing_dimensions() {
        let svg = r#"<svg viewBox="0 0 10 10"></svg>"#;
        assert_eq!(intrinsic_size(svg), (None, None));
    }

    #[test]
    fn test_recolor_preserves_none() {
        let out = recolor(ICON, "#ff0000");
        assert!(out.contains(r##"fill="#ff0000""##));
        assert!(out.contains(r#"stroke="none""#));
        assert!(!out.contains(r##"fill="#000""##));
    }

    #[test]
    fn test_recolor_injects_root_fill() {
        let out = recolor(r#"<svg viewBox="0 0 1 1"><path d="M0 0"/></svg>"#, "blue");
        assert!(out.starts_with(r#"<svg fill="blue" viewBox"#));
    }

    #[test]
    fn test_recolor_single_quotes() {
        let svg = r##"<svg viewBox="0 0 1 1"><path fill='#000' stroke = 'red' d="M0 0"/></svg>"##;
        let out = recolor(svg, "#00ff00");
        assert!(out.contains("fill='#00ff00'"));
        assert!(out.contains("stroke = '#00ff00'"));
        assert!(!out.contains("<svg fill="));
    }

    #[test]
    fn test_recolor_ignores_compound_names() {
        let svg = r##"<svg viewBox="0 0 1 1"><path data-fill="#000" d="M0 0"/></svg>"##;
        let out = recolor(svg, "blue");
        assert!(out.contains(r##"data-fill="#000""##));
        assert!(out.starts_with(r#"<svg fill="blue" viewBox"#));
    }
}
