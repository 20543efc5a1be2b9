//! Address book of the aggregator endpoints.

use bookbridge_core::{CanonicalId, EndpointConfig, Isbn};
use url::Url;

use crate::FetchError;

/// Search category for books on the desktop site.
const BOOK_CATEGORY: &str = "1001";

#[derive(Debug, Clone)]
pub struct Endpoints {
    book: Url,
    mobile: Url,
}

impl Endpoints {
    pub fn new(config: &EndpointConfig) -> Result<Self, FetchError> {
        Ok(Self {
            book: Url::parse(&config.book_base)?,
            mobile: Url::parse(&config.mobile_base)?,
        })
    }

    /// `base` with `path` appended to whatever path it already carries, so a
    /// base mounted under a prefix keeps it.
    fn under(base: &Url, path: &str) -> Url {
        let mut url = base.clone();
        let prefix = base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{path}"));
        url.set_fragment(None);
        url
    }

    fn at(base: &Url, path: &str, query: Option<&str>) -> String {
        let mut url = Self::under(base, path);
        url.set_query(query);
        url.into()
    }

    /// Free-text search.
    pub fn search(&self, text: &str) -> String {
        let mut url = Self::under(&self.book, "/subject_search");
        url.query_pairs_mut()
            .clear()
            .append_pair("search_text", text)
            .append_pair("cat", BOOK_CATEGORY);
        url.into()
    }

    /// Direct lookup by ISBN; answers with (or redirects to) the record page.
    pub fn isbn_lookup(&self, isbn: &Isbn) -> String {
        Self::at(&self.book, &format!("/isbn/{isbn}/"), None)
    }

    /// The two mobile API variants serving the rating payload.
    pub fn rating_variants(&self, id: &CanonicalId) -> [String; 2] {
        [
            Self::at(
                &self.mobile,
                &format!("/rexxar/api/v2/book/{id}"),
                Some("for_mobile=1"),
            ),
            Self::at(
                &self.mobile,
                &format!("/rexxar/api/v2/subject/{id}"),
                Some("for_mobile=1"),
            ),
        ]
    }

    /// Referer the mobile API expects alongside a rating request.
    pub fn mobile_record(&self, id: &CanonicalId) -> String {
        Self::at(&self.mobile, &format!("/book/subject/{id}/"), None)
    }

    /// Listing of approved short reviews.
    pub fn reviews(&self, id: &CanonicalId) -> String {
        Self::at(&self.book, &format!("/subject/{id}/comments/"), Some("status=P"))
    }

    /// Canonical record page, the link shown to the reader.
    pub fn record(&self, id: &CanonicalId) -> String {
        Self::at(&self.book, &format!("/subject/{id}/"), None)
    }
}
