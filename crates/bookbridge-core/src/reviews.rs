//! Short-review extraction from the aggregator's review listing page.
//!
//! The listing repeats one `<div class="comment">` block per review. A strict
//! pass keeps only rated reviews whose text fits the display length; when
//! that finds nothing, a lenient pass keeps any review with text.

use std::sync::LazyLock;

use regex::Regex;

use crate::markup::fragment_text;
use crate::types::ReviewSummary;

const FRAGMENT_MARKER: &str = r#"<div class="comment">"#;

static STAR_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"allstar(\d{2})").unwrap());
static SHORT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<span class="short">(.*?)</span>"#).unwrap());
static AUTHOR_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a [^>]*?href="https?://www\.douban\.com/people/[^"]+"[^>]*?>([^<]+)</a>"#)
        .unwrap()
});

/// Result of parsing a review listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The listing could not be fetched at all.
    Unavailable,
    /// The listing was parsed; may be empty.
    Reviews(Vec<ReviewSummary>),
}

impl ReviewOutcome {
    pub fn reviews(&self) -> &[ReviewSummary] {
        match self {
            Self::Unavailable => &[],
            Self::Reviews(reviews) => reviews,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Strict,
    Lenient,
}

/// Parse up to `max_count` review summaries from a listing page.
///
/// `None` markup means the fetch failed and yields
/// [`ReviewOutcome::Unavailable`], which is distinct from a listing with no
/// usable reviews.
pub fn parse_reviews(markup: Option<&str>, max_count: usize, max_text_len: usize) -> ReviewOutcome {
    let Some(markup) = markup else {
        return ReviewOutcome::Unavailable;
    };
    let strict = collect(markup, max_count, max_text_len, Pass::Strict);
    if !strict.is_empty() {
        return ReviewOutcome::Reviews(strict);
    }
    ReviewOutcome::Reviews(collect(markup, max_count, max_text_len, Pass::Lenient))
}

fn collect(markup: &str, max_count: usize, max_text_len: usize, pass: Pass) -> Vec<ReviewSummary> {
    markup
        .split(FRAGMENT_MARKER)
        .skip(1)
        .filter_map(|fragment| summarize(fragment, max_text_len, pass))
        .take(max_count)
        .collect()
}

fn summarize(fragment: &str, max_text_len: usize, pass: Pass) -> Option<ReviewSummary> {
    let stars = STAR_CODE.captures(fragment).map(|caps| {
        let code: u8 = caps[1].parse().unwrap_or(0);
        (code / 10).clamp(1, 5)
    });
    if pass == Pass::Strict && stars.is_none() {
        return None;
    }

    let raw = SHORT_TEXT.captures(fragment)?;
    let text = fragment_text(&raw[1]);
    if text.is_empty() {
        return None;
    }
    if pass == Pass::Strict && text.chars().count() > max_text_len {
        return None;
    }

    let author = AUTHOR_LINK
        .captures(fragment)
        .map(|caps| fragment_text(&caps[1]))
        .filter(|name| !name.is_empty());

    Some(ReviewSummary {
        stars: stars.unwrap_or(0),
        author,
        text,
    })
}
