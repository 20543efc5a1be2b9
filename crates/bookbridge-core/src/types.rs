//! Shared book types passed between the extraction, resolution and display stages.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Shortest usable cleaned title, in characters.
pub const MIN_TITLE_CHARS: usize = 4;
/// Titles longer than this are cut before lookup.
pub const MAX_TITLE_CHARS: usize = 60;

static SUBJECT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://book\.douban\.com/subject/(\d+)/").unwrap());
static OG_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"property="og:url" content="https?://book\.douban\.com/subject/(\d+)/"#).unwrap()
});

/// A normalised ISBN: ASCII digits with an optional trailing `X`.
///
/// The check digit is never validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn(String);

impl Isbn {
    /// Strip separators and uppercase the check character.
    ///
    /// Returns `None` unless the result is 10 or 13 characters of digits,
    /// where only the last character of a 10-character form may be `X`.
    pub fn normalize(raw: &str) -> Option<Self> {
        let value: String = raw
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if !value.is_ascii() {
            return None;
        }

        let (body, last) = value.split_at(value.len().checked_sub(1)?);
        let shape_ok = match value.len() {
            13 => value.bytes().all(|b| b.is_ascii_digit()),
            10 => {
                body.bytes().all(|b| b.is_ascii_digit())
                    && (last == "X" || last.bytes().all(|b| b.is_ascii_digit()))
            }
            _ => false,
        };
        shape_ok.then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cleaned book title of at least [`MIN_TITLE_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Title(String);

impl Title {
    /// Accept an already-cleaned title, truncating it to [`MAX_TITLE_CHARS`].
    pub fn new(cleaned: &str) -> Option<Self> {
        let cleaned = cleaned.trim();
        if cleaned.chars().count() < MIN_TITLE_CHARS {
            return None;
        }
        Some(Self(cleaned.chars().take(MAX_TITLE_CHARS).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The key a canonical record is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentifyingKey {
    Isbn(Isbn),
    Title(Title),
}

impl fmt::Display for IdentifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isbn(isbn) => write!(f, "ISBN {isbn}"),
            Self::Title(title) => write!(f, "title \"{title}\""),
        }
    }
}

/// The aggregator's identifier for a book entry.
///
/// Only obtainable by scanning a lookup response ([`CanonicalId::from_markup`])
/// or by reading back a previously cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Find the first subject link embedded in a lookup response.
    pub fn from_markup(markup: &str) -> Option<Self> {
        SUBJECT_URL
            .captures(markup)
            .or_else(|| OG_URL.captures(markup))
            .map(|caps| Self(caps[1].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value))
        } else {
            Err(format!("not a subject id: {value:?}"))
        }
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Average rating and vote count for one canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    /// Decimal string, e.g. `"8.6"`.
    pub score: String,
    pub votes: Option<String>,
}

/// One short review, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    /// 0 when the review carried no star marker, otherwise 1–5.
    pub stars: u8,
    pub author: Option<String>,
    pub text: String,
}

impl fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.stars {
            f.write_str("★")?;
        }
        if let Some(author) = &self.author {
            if self.stars > 0 {
                f.write_str(" ")?;
            }
            write!(f, "({author})")?;
        }
        if self.stars > 0 || self.author.is_some() {
            f.write_str(": ")?;
        }
        f.write_str(&self.text)
    }
}
