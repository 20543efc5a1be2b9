//! Which addresses count as a book detail page.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static DETAIL_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/\d{3,}/\d{6,}/?$").unwrap());

/// Matches detail pages on one marketplace host, e.g.
/// `https://book.kongfz.com/12345/6789012/`.
#[derive(Debug, Clone)]
pub struct DetailPages {
    host: String,
}

impl DetailPages {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn matches(&self, address: &str) -> bool {
        Url::parse(address).is_ok_and(|url| {
            url.host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
                && DETAIL_PATH.is_match(url.path())
        })
    }
}
