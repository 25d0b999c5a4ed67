//! Display boundary: trusted SVG inside a transformed container
//!
//! This is the only place markup is injected into a document. It accepts
//! [`TrustedSvg`] and nothing else.

use crate::engine::{RenderArtifact, TrustedSvg};
use crate::viewport::ViewportTransform;

/// A renderable frame: one artifact under one viewport transform
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    svg: &'a TrustedSvg,
    width: f64,
    height: f64,
    transform: ViewportTransform,
}

impl<'a> Frame<'a> {
    pub fn new(artifact: &'a RenderArtifact, transform: ViewportTransform) -> Self {
        Self {
            svg: artifact.svg(),
            width: artifact.width(),
            height: artifact.height(),
            transform,
        }
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn svg(&self) -> &'a TrustedSvg {
        self.svg
    }

    /// Inline style of the transformed container
    pub fn container_style(&self) -> String {
        let mut style = format!(
            "transform: {}; transform-origin: 0 0;",
            self.transform.css()
        );
        if self.width > 0.0 && self.height > 0.0 {
            style.push_str(&format!(
                " width: {}px; height: {}px;",
                self.width, self.height
            ));
        }
        style
    }

    /// HTML fragment: the surface with the transformed artifact inside
    pub fn to_html(&self) -> String {
        format!(
            "<div class=\"studio-surface\" style=\"position: relative; overflow: hidden;\">\
             <div class=\"studio-artifact\" style=\"{}\">{}</div></div>",
            self.container_style(),
            self.svg.as_str()
        )
    }

    /// Standalone HTML document wrapping the fragment
    pub fn to_document(&self, title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{}</title>\n\
             <style>body {{ margin: 0; }} .studio-surface {{ width: 100vw; height: 100vh; }}</style>\n\
             </head>\n<body>\n{}\n</body>\n</html>\n",
            escape_text(title),
            self.to_html()
        )
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
