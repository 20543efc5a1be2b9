//! Namespaced cache over a [`KvStore`].
//!
//! Each namespace is persisted as one JSON object under its own store key,
//! mapping entry keys to [`CacheEntry`] rows. Rows are replaced wholesale on
//! write. Only the rating namespace expires; an expired row is deleted by the
//! read that finds it.
//!
//! Cache failures never reach the caller: a store error or an unreadable row
//! is logged and behaves as a miss (or a dropped write).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bookbridge_core::{CanonicalId, Isbn, RatingRecord};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::KvStore;

/// Default lifetime of a cached rating.
pub const DEFAULT_RATING_TTL: Duration = Duration::from_secs(6 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// ISBN → canonical id. Never expires.
    SubjectByIsbn,
    /// Canonical id → rating. Expires after the rating TTL.
    RatingBySubject,
}

impl Namespace {
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::SubjectByIsbn => "isbn2sid_v1",
            Self::RatingBySubject => "sid2rating_v1",
        }
    }
}

/// One cached value and when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
}

type Rows = BTreeMap<String, CacheEntry<serde_json::Value>>;

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KvStore>,
    rating_ttl: Duration,
}

impl Cache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            rating_ttl: DEFAULT_RATING_TTL,
        }
    }

    pub fn with_rating_ttl(mut self, ttl: Duration) -> Self {
        self.rating_ttl = ttl;
        self
    }

    fn ttl(&self, namespace: Namespace) -> Option<Duration> {
        match namespace {
            Namespace::SubjectByIsbn => None,
            Namespace::RatingBySubject => Some(self.rating_ttl),
        }
    }

    pub fn get<V: DeserializeOwned>(&self, namespace: Namespace, key: &str) -> Option<V> {
        self.get_at(namespace, key, Utc::now())
    }

    /// Look up `key` as of `now`, evicting the row if it has outlived its TTL.
    pub fn get_at<V: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<V> {
        let mut rows = self.read_rows(namespace);
        let entry = rows.get(key)?;

        if let Some(ttl) = self.ttl(namespace) {
            // A row stamped in the future (clock skew) counts as fresh.
            let expired = (now - entry.stored_at).to_std().is_ok_and(|age| age > ttl);
            if expired {
                debug!(namespace = namespace.storage_key(), key, "cache row expired");
                rows.remove(key);
                self.write_rows(namespace, &rows);
                return None;
            }
        }

        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace = namespace.storage_key(), key, error = %e, "unreadable cache row");
                None
            }
        }
    }

    pub fn set<V: Serialize>(&self, namespace: Namespace, key: &str, value: &V) {
        self.set_at(namespace, key, value, Utc::now());
    }

    pub fn set_at<V: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &V,
        now: DateTime<Utc>,
    ) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(namespace = namespace.storage_key(), key, error = %e, "cannot encode cache row");
                return;
            }
        };
        let mut rows = self.read_rows(namespace);
        rows.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
            },
        );
        self.write_rows(namespace, &rows);
    }

    // ── Typed namespaces ──

    pub fn subject_for(&self, isbn: &Isbn) -> Option<CanonicalId> {
        self.get(Namespace::SubjectByIsbn, isbn.as_str())
    }

    pub fn remember_subject(&self, isbn: &Isbn, id: &CanonicalId) {
        self.set(Namespace::SubjectByIsbn, isbn.as_str(), id);
    }

    pub fn rating_for(&self, id: &CanonicalId) -> Option<RatingRecord> {
        self.get(Namespace::RatingBySubject, id.as_str())
    }

    pub fn remember_rating(&self, id: &CanonicalId, rating: &RatingRecord) {
        self.set(Namespace::RatingBySubject, id.as_str(), rating);
    }

    // ── Row blobs ──

    fn read_rows(&self, namespace: Namespace) -> Rows {
        let text = match self.store.get(namespace.storage_key()) {
            Ok(Some(text)) => text,
            Ok(None) => return Rows::new(),
            Err(e) => {
                warn!(namespace = namespace.storage_key(), error = %e, "cache read failed");
                return Rows::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(namespace = namespace.storage_key(), error = %e, "discarding corrupt cache namespace");
            Rows::new()
        })
    }

    fn write_rows(&self, namespace: Namespace, rows: &Rows) {
        let text = match serde_json::to_string(rows) {
            Ok(text) => text,
            Err(e) => {
                warn!(namespace = namespace.storage_key(), error = %e, "cannot encode cache namespace");
                return;
            }
        };
        if let Err(e) = self.store.set(namespace.storage_key(), &text) {
            warn!(namespace = namespace.storage_key(), error = %e, "cache write failed");
        }
    }
}
