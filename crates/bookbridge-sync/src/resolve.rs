//! Identifying key → canonical record id.

use std::sync::Arc;
use std::time::Duration;

use bookbridge_core::{CanonicalId, IdentifyingKey, Isbn, Title};
use bookbridge_store::Cache;
use tracing::{debug, info};

use crate::race::first_some;
use crate::{Endpoints, HttpRequest, Transport};

/// Resolves ISBNs and titles to canonical ids.
///
/// An ISBN is looked up two ways at once, text search and direct identifier
/// lookup, under one wall-clock cap; the first response carrying an id wins
/// and is cached. Titles get a single search bounded only by the request
/// timeout.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn Transport>,
    cache: Cache,
    endpoints: Endpoints,
    isbn_cap: Duration,
}

impl Resolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Cache,
        endpoints: Endpoints,
        isbn_cap: Duration,
    ) -> Self {
        Self {
            transport,
            cache,
            endpoints,
            isbn_cap,
        }
    }

    pub async fn resolve(&self, key: &IdentifyingKey) -> Option<CanonicalId> {
        match key {
            IdentifyingKey::Isbn(isbn) => self.resolve_isbn(isbn).await,
            IdentifyingKey::Title(title) => self.resolve_title(title).await,
        }
    }

    pub async fn resolve_isbn(&self, isbn: &Isbn) -> Option<CanonicalId> {
        if let Some(id) = self.cache.subject_for(isbn) {
            debug!(%isbn, %id, "subject cache hit");
            return Some(id);
        }

        let lookups = [
            self.endpoints.search(isbn.as_str()),
            self.endpoints.isbn_lookup(isbn),
        ];
        let id = first_some(
            lookups.into_iter().map(|url| self.lookup(url)),
            Some(self.isbn_cap),
        )
        .await;

        match &id {
            Some(id) => {
                info!(%isbn, %id, "resolved by ISBN");
                self.cache.remember_subject(isbn, id);
            }
            None => info!(%isbn, cap_ms = self.isbn_cap.as_millis() as u64, "ISBN not resolved"),
        }
        id
    }

    pub async fn resolve_title(&self, title: &Title) -> Option<CanonicalId> {
        let id = self.lookup(self.endpoints.search(title.as_str())).await;
        match &id {
            Some(id) => info!(%title, %id, "resolved by title"),
            None => info!(%title, "title not resolved"),
        }
        id
    }

    async fn lookup(&self, url: String) -> Option<CanonicalId> {
        match self.transport.get(&HttpRequest::get(url.as_str())).await {
            Ok(body) => {
                let id = CanonicalId::from_markup(&body);
                debug!(url = %url, found = id.is_some(), "lookup settled");
                id
            }
            Err(e) => {
                debug!(url = %url, error = %e, "lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{Reply, StubTransport};
    use bookbridge_core::EndpointConfig;
    use bookbridge_store::MemoryStore;
    use tokio::time::Instant;

    const CAP: Duration = Duration::from_millis(700);

    fn subject_page(id: &str) -> String {
        format!(r#"<a href="https://book.douban.com/subject/{id}/">book</a>"#)
    }

    fn resolver(transport: Arc<StubTransport>, cache: Cache) -> Resolver {
        Resolver::new(
            transport,
            cache,
            Endpoints::new(&EndpointConfig::default()).unwrap(),
            CAP,
        )
    }

    fn isbn() -> Isbn {
        Isbn::normalize("9787020002207").unwrap()
    }

    fn memory_cache() -> Cache {
        Cache::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn first_settled_lookup_wins() {
        for (search_ms, lookup_ms, expected) in [(50, 200, "111"), (200, 50, "222")] {
            let transport = Arc::new(
                StubTransport::new()
                    .route(
                        "/subject_search",
                        Duration::from_millis(search_ms),
                        Reply::Body(subject_page("111")),
                    )
                    .route(
                        "/isbn/",
                        Duration::from_millis(lookup_ms),
                        Reply::Body(subject_page("222")),
                    ),
            );
            let id = resolver(transport, memory_cache())
                .resolve_isbn(&isbn())
                .await
                .unwrap();
            assert_eq!(id.as_str(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_does_not_win() {
        let transport = Arc::new(
            StubTransport::new()
                .body("/subject_search", "<html>nothing found</html>")
                .route(
                    "/isbn/",
                    Duration::from_millis(300),
                    Reply::Body(subject_page("333")),
                ),
        );
        let id = resolver(transport, memory_cache()).resolve_isbn(&isbn()).await;
        assert_eq!(id.unwrap().as_str(), "333");
    }

    #[tokio::test(start_paused = true)]
    async fn cap_bounds_hung_lookups() {
        let transport = Arc::new(
            StubTransport::new()
                .route("/subject_search", Duration::ZERO, Reply::Hang)
                .route("/isbn/", Duration::ZERO, Reply::Hang),
        );
        let cache = memory_cache();
        let start = Instant::now();
        let id = resolver(transport, cache.clone()).resolve_isbn(&isbn()).await;

        assert_eq!(id, None);
        let elapsed = start.elapsed();
        assert!(elapsed >= CAP);
        assert!(elapsed < CAP + Duration::from_millis(10));
        assert_eq!(cache.subject_for(&isbn()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_cap_is_ignored() {
        let transport = Arc::new(
            StubTransport::new()
                .route("/subject_search", Duration::from_millis(900), Reply::Body(subject_page("9")))
                .route("/isbn/", Duration::ZERO, Reply::Status(404)),
        );
        let id = resolver(transport, memory_cache()).resolve_isbn(&isbn()).await;
        assert_eq!(id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn hit_is_cached_and_short_circuits() {
        let transport = Arc::new(StubTransport::new().body("/isbn/", &subject_page("123456")));
        let cache = memory_cache();
        let resolver = resolver(transport.clone(), cache.clone());

        assert_eq!(resolver.resolve_isbn(&isbn()).await.unwrap().as_str(), "123456");
        assert_eq!(cache.subject_for(&isbn()).unwrap().as_str(), "123456");

        let before = transport.requests().len();
        assert_eq!(resolver.resolve_isbn(&isbn()).await.unwrap().as_str(), "123456");
        assert_eq!(transport.requests().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn both_lookups_hit_distinct_endpoints() {
        let transport = Arc::new(StubTransport::new());
        let id = resolver(transport.clone(), memory_cache())
            .resolve_isbn(&isbn())
            .await;
        assert_eq!(id, None);
        assert_eq!(transport.hits("search_text=9787020002207"), 1);
        assert_eq!(transport.hits("/isbn/9787020002207/"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn title_uses_single_search_without_cap() {
        let transport = Arc::new(StubTransport::new().route(
            "/subject_search",
            Duration::from_millis(1500),
            Reply::Body(subject_page("4242")),
        ));
        let cache = memory_cache();
        let key = IdentifyingKey::Title(Title::new("红楼梦 脂评本").unwrap());
        let id = resolver(transport.clone(), cache).resolve(&key).await;

        assert_eq!(id.unwrap().as_str(), "4242");
        assert_eq!(transport.requests().len(), 1);
        assert!(transport.hits("/isbn/") == 0);
    }
}
