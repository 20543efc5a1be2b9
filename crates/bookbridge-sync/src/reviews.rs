//! Review listing download.

use std::sync::Arc;

use bookbridge_core::{CanonicalId, ReviewOutcome, parse_reviews};
use tracing::debug;

use crate::{Endpoints, HttpRequest, Transport};

#[derive(Clone)]
pub struct ReviewFetcher {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl ReviewFetcher {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Raw listing markup, or `None` when the request failed.
    pub async fn fetch_markup(&self, id: &CanonicalId) -> Option<String> {
        let url = self.endpoints.reviews(id);
        match self.transport.get(&HttpRequest::get(url.as_str())).await {
            Ok(markup) => Some(markup),
            Err(e) => {
                debug!(%id, url = %url, error = %e, "review listing unavailable");
                None
            }
        }
    }

    /// Fetch and parse the listing in one step.
    pub async fn fetch(&self, id: &CanonicalId, max_count: usize, max_text_len: usize) -> ReviewOutcome {
        let markup = self.fetch_markup(id).await;
        parse_reviews(markup.as_deref(), max_count, max_text_len)
    }
}
