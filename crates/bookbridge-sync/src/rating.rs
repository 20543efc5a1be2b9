//! Canonical id → rating, via the aggregator's mobile API.

use std::sync::Arc;

use bookbridge_core::{CanonicalId, RatingRecord};
use bookbridge_store::Cache;
use serde_json::Value;
use tracing::{debug, info};

use crate::race::first_some;
use crate::{Endpoints, FetchError, HttpRequest, Transport};

const MOBILE_USER_AGENT: &str = "Mozilla/5.0";

/// Decode a mobile API payload.
///
/// The rating object may be called `rating` or `rating_info`, and its fields
/// have several historical names. `Ok(None)` means the payload parsed but has
/// no numeric average, which callers must treat like a failed fetch.
pub fn decode_rating(payload: &str) -> Result<Option<RatingRecord>, FetchError> {
    let doc: Value = serde_json::from_str(payload)?;
    let Some(rating) = ["rating", "rating_info"]
        .iter()
        .filter_map(|key| doc.get(key))
        .find(|v| v.is_object())
    else {
        return Ok(None);
    };

    let Some(score) = first_present(rating, &["value", "average", "score"]).and_then(numeric) else {
        return Ok(None);
    };
    let votes = first_present(rating, &["count", "numRaters", "total"]).and_then(|v| match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    });

    Ok(Some(RatingRecord { score, votes }))
}

fn first_present<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|v| !v.is_null())
}

fn numeric(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
            Some(s.trim().to_string())
        }
        _ => None,
    }
}

/// Fetches ratings, racing the two mobile API variants.
///
/// Successful ratings are cached per canonical id for the cache's rating
/// TTL. A payload without an average is never cached, so a transient empty
/// answer is retried on the next request.
#[derive(Clone)]
pub struct RatingFetcher {
    transport: Arc<dyn Transport>,
    cache: Cache,
    endpoints: Endpoints,
}

impl RatingFetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: Cache, endpoints: Endpoints) -> Self {
        Self {
            transport,
            cache,
            endpoints,
        }
    }

    pub async fn fetch(&self, id: &CanonicalId) -> Option<RatingRecord> {
        if let Some(rating) = self.cache.rating_for(id) {
            debug!(%id, "rating cache hit");
            return Some(rating);
        }

        let referer = self.endpoints.mobile_record(id);
        let rating = first_some(
            self.endpoints
                .rating_variants(id)
                .into_iter()
                .map(|url| self.fetch_variant(url, &referer)),
            None,
        )
        .await;

        match &rating {
            Some(r) => {
                info!(%id, score = %r.score, votes = ?r.votes, "rating fetched");
                self.cache.remember_rating(id, r);
            }
            None => info!(%id, "no rating available"),
        }
        rating
    }

    async fn fetch_variant(&self, url: String, referer: &str) -> Option<RatingRecord> {
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .header("Referer", referer)
            .header("User-Agent", MOBILE_USER_AGENT);

        let decoded = match self.transport.get(&request).await {
            Ok(body) => decode_rating(&body),
            Err(e) => Err(e),
        };
        match decoded {
            Ok(Some(rating)) => Some(rating),
            Ok(None) => {
                debug!(url = %request.url, "rating payload without average");
                None
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "rating request failed");
                None
            }
        }
    }
}
