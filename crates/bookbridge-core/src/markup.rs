//! HTML snapshots and visible-text extraction.
//!
//! Queries go through `scraper`; review-listing fragments cut out by
//! [`crate::reviews`] are flattened with [`fragment_text`].

use scraper::{ElementRef, Html, Selector};

use crate::extract::PageSource;

/// A snapshot of a loaded document.
///
/// Keeps the markup rather than a parsed [`Html`], which is not `Sync`; each
/// query parses afresh.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    html: String,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

impl PageSource for HtmlPage {
    fn select_text(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        let document = Html::parse_document(&self.html);
        document.select(&selector).next().map(visible_text)
    }

    fn body_text(&self) -> Option<String> {
        let body = Selector::parse("body").ok()?;
        let document = Html::parse_document(&self.html);
        let text = match document.select(&body).next() {
            Some(body) => visible_text(body),
            None => visible_text(document.root_element()),
        };
        Some(text)
    }
}

/// Text nodes under `element` on one line, skipping script and style.
pub fn visible_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .is_some_and(|parent| matches!(parent.name(), "script" | "style" | "noscript"));
            (!hidden).then_some(&**text)
        })
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of a markup fragment, entities decoded.
pub fn fragment_text(markup: &str) -> String {
    visible_text(Html::parse_fragment(markup).root_element())
}
