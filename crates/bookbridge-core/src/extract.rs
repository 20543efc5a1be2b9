//! Identifying-key extraction from a bookseller detail page.
//!
//! The ISBN is searched for in the most specific page regions first. A title
//! is detected alongside it as the fallback key. Because the bookseller
//! renders parts of the page late, [`detect`] re-scans the ISBN regions on a
//! short bounded poll.

use std::sync::LazyLock;

use regex::Regex;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::Config;
use crate::types::{IdentifyingKey, Isbn, Title};

/// Regions likely to hold the product parameters, most specific first.
pub const ISBN_REGIONS: &[&str] = &[
    ".detail-info",
    ".bookinfo",
    ".product-params",
    ".spu-params",
    ".tab_con",
    "#bookDesc",
];

/// Heading-like elements tried in order for the title fallback.
pub const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    ".book-title",
    ".product-title",
    ".detail-right .title",
    ".product-name",
    "title",
];

static ISBN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?-u:\b)(?:ISBN[:：]?\s*)?(97[89]-?[0-9]{1,5}-?[0-9]{1,7}-?[0-9]{1,7}-?[0-9]|[0-9]{9}[0-9Xx])(?-u:\b)",
    )
    .unwrap()
});

static BRACKET_TAG_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^【[^】]{1,20}】\s*").unwrap());
static MARKETING_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:新书|二手|现货|包邮|正版|清仓|促销|热销|自营|店铺自营)\s*[·・:：\-—~ ]+\s*")
        .unwrap()
});
static SEPARATOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[·・:：\-—~ ]+\s*").unwrap());
static TRAILING_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(【\[][^）)】\]]{0,20}[）)】\]]\s*$").unwrap());
static SITE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"孔夫子旧书网|拍卖|二手|优品").unwrap());
static STOPWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:新书|二手|现货|包邮|正版)$").unwrap());

/// Read-only view of the currently loaded document.
pub trait PageSource: Send + Sync {
    /// Visible text of the first element matching `selector`.
    fn select_text(&self, selector: &str) -> Option<String>;

    /// Visible text of the whole page.
    fn body_text(&self) -> Option<String>;
}

/// What was found on the page during one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    pub isbn: Option<Isbn>,
    pub title: Option<Title>,
}

impl Detection {
    /// The lookup key: the ISBN when present, the title otherwise.
    pub fn key(&self) -> Option<IdentifyingKey> {
        match (&self.isbn, &self.title) {
            (Some(isbn), _) => Some(IdentifyingKey::Isbn(isbn.clone())),
            (None, Some(title)) => Some(IdentifyingKey::Title(title.clone())),
            (None, None) => None,
        }
    }
}

/// Map full-width digits and dash variants to ASCII.
pub fn to_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            'Ｘ' => 'X',
            'ｘ' => 'x',
            '－' | '—' | '–' | '‐' => '-',
            _ => c,
        })
        .collect()
}

/// First ISBN-shaped token in `text` that normalises to 10 or 13 characters.
pub fn find_isbn(text: &str) -> Option<Isbn> {
    let ascii = to_ascii(text);
    ISBN_PATTERN
        .captures_iter(&ascii)
        .find_map(|caps| Isbn::normalize(&caps[1]))
}

/// Strip promotional decoration from a raw heading.
pub fn clean_title(raw: &str) -> String {
    let mut title = to_ascii(raw.trim());
    for pattern in [
        &*BRACKET_TAG_PREFIX,
        &*MARKETING_PREFIX,
        &*SEPARATOR_PREFIX,
        &*TRAILING_NOTE,
    ] {
        title = pattern.replace(&title, "").into_owned();
    }
    SITE_WORDS.replace_all(&title, "").trim().to_string()
}

/// Cleaned, usable title from a raw heading, if any.
pub fn title_from_heading(raw: &str) -> Option<Title> {
    let cleaned = clean_title(raw);
    if STOPWORD.is_match(&cleaned) {
        return None;
    }
    Title::new(&cleaned)
}

fn scan_regions(page: &dyn PageSource) -> Option<Isbn> {
    ISBN_REGIONS
        .iter()
        .filter_map(|selector| page.select_text(selector))
        .find_map(|text| find_isbn(&text))
}

fn find_title(page: &dyn PageSource) -> Option<Title> {
    TITLE_SELECTORS
        .iter()
        .filter_map(|selector| page.select_text(selector))
        .find_map(|text| title_from_heading(&text))
}

/// Single extraction pass over the page.
pub fn extract(page: &dyn PageSource, body_fallback: bool) -> Detection {
    let mut isbn = scan_regions(page);
    if isbn.is_none() && body_fallback {
        isbn = page.body_text().and_then(|text| find_isbn(&text));
    }
    Detection {
        isbn,
        title: find_title(page),
    }
}

/// Extraction with a bounded poll on the ISBN regions.
///
/// The title is read once up front. The regions are re-scanned every
/// `isbn_poll` until an ISBN appears or `isbn_wait` has elapsed; the body
/// fallback, when enabled, runs once after the poll gives up.
pub async fn detect(page: &dyn PageSource, config: &Config) -> Detection {
    let deadline = Instant::now() + config.isbn_wait();
    let mut isbn = scan_regions(page);
    let title = find_title(page);

    let mut polls = 0u32;
    while isbn.is_none() && Instant::now() < deadline {
        sleep(config.isbn_poll()).await;
        polls += 1;
        isbn = scan_regions(page);
    }
    if isbn.is_none() && config.body_isbn_fallback {
        isbn = page.body_text().and_then(|text| find_isbn(&text));
    }

    debug!(
        isbn = ?isbn.as_ref().map(Isbn::as_str),
        title = ?title.as_ref().map(Title::as_str),
        polls,
        "page key detection finished"
    );
    Detection { isbn, title }
}
