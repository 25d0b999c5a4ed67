//! Normalization of engine SVG output
//!
//! Engines pin the root `<svg>` to its natural width with an inline
//! `max-width` declaration; left in place it clips large diagrams inside the
//! viewport, so it is always removed. Nested `max-width` rules (label
//! wrapping inside `foreignObject`) are left alone.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn root_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<svg\b[^>]*>").expect("valid root tag regex"))
}

fn style_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\sstyle\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
            .expect("valid style regex")
    })
}

fn max_width_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"max-width\s*:[^;]*;?\s*").expect("valid max-width regex"))
}

fn view_box() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\sviewBox\s*=\s*["'](?P<v>[^"']+)["']"#).expect("valid viewBox regex")
    })
}

fn dimension(name: &str) -> Regex {
    let pattern = format!(r#"\s{}\s*=\s*["'](?P<v>[0-9]*\.?[0-9]+)(?:px)?["']"#, name);
    Regex::new(&pattern).expect("valid dimension regex")
}

fn width_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| dimension("width"))
}

fn height_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| dimension("height"))
}

/// Remove `max-width` declarations from the root element's inline style
///
/// The `style` attribute is dropped entirely when nothing else remains in it.
pub fn strip_max_width(markup: &str) -> String {
    let Some(tag) = root_tag().find(markup) else {
        return markup.to_string();
    };

    let cleaned = style_attr().replace_all(tag.as_str(), |caps: &Captures| {
        let (value, quote) = match (caps.name("dq"), caps.name("sq")) {
            (Some(v), _) => (v.as_str(), '"'),
            (None, Some(v)) => (v.as_str(), '\''),
            (None, None) => ("", '"'),
        };
        let remaining = max_width_decl().replace_all(value, "");
        let remaining = remaining.trim();
        if remaining.is_empty() {
            String::new()
        } else {
            format!(" style={quote}{remaining}{quote}")
        }
    });

    let mut out = String::with_capacity(markup.len());
    out.push_str(&markup[..tag.start()]);
    out.push_str(&cleaned);
    out.push_str(&markup[tag.end()..]);
    out
}

/// Intrinsic size of the root element
///
/// Read from `viewBox` when present, otherwise from numeric `width` and
/// `height` attributes. Percentages and missing values yield `None`.
pub fn intrinsic_size(markup: &str) -> Option<(f64, f64)> {
    let tag = root_tag().find(markup)?.as_str();

    if let Some(caps) = view_box().captures(tag) {
        let parts: Vec<f64> = caps["v"]
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse().ok())
            .collect();
        if let [_, _, width, height] = parts[..] {
            if is_positive(width) && is_positive(height) {
                return Some((width, height));
            }
        }
    }

    let width: f64 = width_attr().captures(tag)?["v"].parse().ok()?;
    let height: f64 = height_attr().captures(tag)?["v"].parse().ok()?;
    (is_positive(width) && is_positive(height)).then_some((width, height))
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
