//! Session controller: one pipeline run per detail-page visit.
//!
//! Every accepted navigation bumps a generation counter. A run carries the
//! generation it was started under and re-checks it, under the same lock that
//! guards the counter, before each stage transition and each publish. Once a
//! newer navigation has bumped the counter the old run stops at its next
//! check and nothing it computed reaches the presenter. Its outstanding
//! requests are simply dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bookbridge_core::{Config, PageSource};
use bookbridge_store::Cache;
use bookbridge_sync::{FetchError, Transport};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span};

use crate::navigation::DetailPages;
use crate::pipeline::{Live, Pipeline, RunGuard, RunOutcome, Stage, Superseded};
use crate::presenter::Presenter;

/// What a navigation event did.
#[derive(Debug)]
pub enum Navigation {
    Started(JoinHandle<RunOutcome>),
    /// Same address as the last accepted detail page; nothing restarted.
    Unchanged,
    /// Not a detail page; results were torn down.
    Cleared,
}

/// Reacts to navigation and owns the generation counter.
///
/// Must be driven from inside a tokio runtime: each accepted navigation
/// spawns its run as a task.
pub struct SessionController {
    pipeline: Arc<Pipeline>,
    detail_pages: DetailPages,
    presenter: Arc<dyn Presenter>,
    live: Arc<Mutex<Live>>,
    rendered: Mutex<Option<String>>,
}

impl SessionController {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        cache: Cache,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, FetchError> {
        let pipeline = Pipeline::new(config, transport, cache)?;
        Ok(Self {
            detail_pages: DetailPages::new(pipeline.config().detail_host.clone()),
            pipeline: Arc::new(pipeline),
            presenter,
            live: Arc::new(Mutex::new(Live::new())),
            rendered: Mutex::new(None),
        })
    }

    /// Stage of the live run, or `Idle` when none has started.
    pub fn stage(&self) -> Stage {
        self.lock_live().stage
    }

    pub fn generation(&self) -> u64 {
        self.lock_live().generation
    }

    /// Handle a page transition to `address`, whose document is `page`.
    pub fn on_navigation(&self, address: &str, page: Arc<dyn PageSource>) -> Navigation {
        if !self.detail_pages.matches(address) {
            *self.lock_rendered() = None;
            let mut live = self.lock_live();
            live.generation += 1;
            live.stage = Stage::Idle;
            self.presenter.teardown();
            debug!(url = %address, generation = live.generation, "left detail pages");
            return Navigation::Cleared;
        }

        {
            let mut rendered = self.lock_rendered();
            if rendered.as_deref() == Some(address) {
                debug!(url = %address, "same page, not restarting");
                return Navigation::Unchanged;
            }
            *rendered = Some(address.to_string());
        }

        let generation = {
            let mut live = self.lock_live();
            live.generation += 1;
            live.stage = Stage::Extracting;
            live.generation
        };
        info!(generation, url = %address, "run started");

        let guard = RunGuard::session(generation, self.live.clone(), self.presenter.clone());
        let pipeline = self.pipeline.clone();
        let span = info_span!("run", generation, url = %address);
        Navigation::Started(tokio::spawn(
            async move {
                match pipeline.run(&guard, page.as_ref()).await {
                    Ok(outcome) => outcome,
                    Err(Superseded) => {
                        debug!(generation, "run abandoned");
                        RunOutcome::Abandoned
                    }
                }
            }
            .instrument(span),
        ))
    }

    fn lock_live(&self) -> MutexGuard<'_, Live> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_rendered(&self) -> MutexGuard<'_, Option<String>> {
        self.rendered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Miss;
    use crate::presenter::{SlotPresenter, Status, describe};
    use bookbridge_core::{Detection, HtmlPage, RatingRecord, ReviewOutcome};
    use bookbridge_store::MemoryStore;
    use bookbridge_sync::stub::{Reply, StubTransport};
    use std::time::Duration;

    const PAGE_A: &str = "https://book.kongfz.com/12345/1000001/";
    const PAGE_B: &str = "https://book.kongfz.com/12345/1000002/";

    /// Slot presenter that also keeps a log of every call.
    #[derive(Default)]
    struct Recording {
        slots: SlotPresenter,
        log: Mutex<Vec<String>>,
    }

    impl Recording {
        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Presenter for Recording {
        fn reset(&self) {
            self.push("reset".into());
            self.slots.reset();
        }
        fn teardown(&self) {
            self.push("teardown".into());
            self.slots.teardown();
        }
        fn show_status(&self, status: Option<Status>) {
            self.push(format!("status {status:?}"));
            self.slots.show_status(status);
        }
        fn show_detection(&self, detection: &Detection) {
            self.push(format!("found {}", describe(detection)));
            self.slots.show_detection(detection);
        }
        fn show_link(&self, url: &str) {
            self.push(format!("link {url}"));
            self.slots.show_link(url);
        }
        fn show_rating(&self, rating: Option<&RatingRecord>) {
            self.push(format!("rating {rating:?}"));
            self.slots.show_rating(rating);
        }
        fn show_reviews(&self, reviews: &ReviewOutcome) {
            self.push(format!("reviews {}", reviews.reviews().len()));
            self.slots.show_reviews(reviews);
        }
    }

    fn subject_page(id: &str) -> String {
        format!(r#"<a href="https://book.douban.com/subject/{id}/">book</a>"#)
    }

    fn rating_body(score: &str, votes: &str) -> String {
        format!(r#"{{"rating":{{"value":"{score}","count":"{votes}"}}}}"#)
    }

    fn book_page(isbn: Option<&str>, heading: &str) -> Arc<dyn PageSource> {
        let params = isbn
            .map(|isbn| format!(r#"<div class="detail-info"><span>ISBN：{isbn}</span></div>"#))
            .unwrap_or_default();
        Arc::new(HtmlPage::new(format!(
            "<html><body><h1>{heading}</h1>{params}</body></html>"
        )))
    }

    fn controller(transport: Arc<StubTransport>) -> (SessionController, Arc<Recording>) {
        let presenter = Arc::new(Recording::default());
        let controller = SessionController::new(
            Config::default(),
            transport,
            Cache::new(Arc::new(MemoryStore::new())),
            presenter.clone(),
        )
        .unwrap();
        (controller, presenter)
    }

    async fn finish(navigation: Navigation) -> RunOutcome {
        match navigation {
            Navigation::Started(handle) => handle.await.unwrap(),
            other => panic!("expected a run, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_fills_every_slot() {
        let listing = r#"<div class="comment"><span class="allstar40"></span>
            <a href="https://www.douban.com/people/reader/">读者</a>
            <span class="short">值得一读</span></div>"#;
        let transport = Arc::new(
            StubTransport::new()
                .body("/isbn/9787020002207/", &subject_page("123456"))
                .body("/rexxar/api/v2/book/123456", &rating_body("8.6", "5000"))
                .body("/subject/123456/comments/", listing),
        );
        let (controller, presenter) = controller(transport);

        let outcome = finish(controller.on_navigation(PAGE_A, book_page(Some("978-7-02-000220-7"), "红楼梦 脂评本"))).await;
        let RunOutcome::Rendered(rendered) = outcome else {
            panic!("expected a rendered run, got {outcome:?}");
        };
        assert_eq!(rendered.id.as_str(), "123456");
        assert_eq!(controller.stage(), Stage::Done);

        let slots = presenter.slots.snapshot();
        assert!(slots.visible);
        assert_eq!(slots.status, None);
        assert_eq!(slots.found.as_deref(), Some("ISBN 9787020002207 · 红楼梦 脂评本"));
        assert_eq!(slots.score.as_deref(), Some("8.6"));
        assert_eq!(slots.votes.as_deref(), Some("5000"));
        assert_eq!(slots.link.as_deref(), Some("https://book.douban.com/subject/123456/"));
        let reviews = slots.reviews.unwrap();
        assert_eq!(reviews.reviews()[0].to_string(), "★★★★ (读者): 值得一读");
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_run_never_publishes() {
        let transport = Arc::new(
            StubTransport::new()
                .route(
                    "/isbn/9787020002207/",
                    Duration::from_millis(300),
                    Reply::Body(subject_page("111")),
                )
                .body("/isbn/9787544253994/", &subject_page("222"))
                .body("/rexxar/api/v2/book/111", &rating_body("1.1", "10"))
                .body("/rexxar/api/v2/book/222", &rating_body("2.2", "20")),
        );
        let (controller, presenter) = controller(transport.clone());

        let first = controller.on_navigation(PAGE_A, book_page(Some("9787020002207"), "红楼梦 脂评本"));
        // Let the first run reach its lookup.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.stage(), Stage::Resolving);

        let second = controller.on_navigation(PAGE_B, book_page(Some("9787544253994"), "许三观卖血记"));
        assert!(matches!(finish(second).await, RunOutcome::Rendered(_)));
        assert_eq!(finish(first).await, RunOutcome::Abandoned);

        let log = presenter.log();
        assert!(log.iter().all(|entry| !entry.contains("/subject/111/")));
        assert!(log.iter().all(|entry| !entry.contains("1.1")));
        assert_eq!(transport.hits("/rexxar/api/v2/book/111"), 0);

        let slots = presenter.slots.snapshot();
        assert_eq!(slots.score.as_deref(), Some("2.2"));
        assert_eq!(slots.link.as_deref(), Some("https://book.douban.com/subject/222/"));
        assert_eq!(controller.stage(), Stage::Done);
        assert_eq!(controller.generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn same_address_does_not_restart() {
        let transport = Arc::new(StubTransport::new());
        let (controller, _) = controller(transport.clone());
        let page = book_page(Some("9787020002207"), "红楼梦 脂评本");

        finish(controller.on_navigation(PAGE_A, page.clone())).await;
        let calls = transport.requests().len();

        assert!(matches!(
            controller.on_navigation(PAGE_A, page),
            Navigation::Unchanged
        ));
        assert_eq!(controller.generation(), 1);
        assert_eq!(transport.requests().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_detail_pages_tears_down() {
        let transport = Arc::new(StubTransport::new());
        let (controller, presenter) = controller(transport.clone());
        let page = book_page(Some("9787020002207"), "红楼梦 脂评本");

        finish(controller.on_navigation(PAGE_A, page.clone())).await;
        assert!(presenter.slots.snapshot().visible);

        let listing = book_page(None, "搜索结果");
        assert!(matches!(
            controller.on_navigation("https://search.kongfz.com/product/?keyword=x", listing),
            Navigation::Cleared
        ));
        assert_eq!(controller.stage(), Stage::Idle);
        assert!(!presenter.slots.snapshot().visible);
        assert_eq!(presenter.log().last().map(String::as_str), Some("teardown"));

        // Coming back to the same page is a fresh visit.
        assert!(matches!(
            finish(controller.on_navigation(PAGE_A, page)).await,
            RunOutcome::NotFound(Miss::Isbn(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn title_key_is_used_without_isbn() {
        let transport = Arc::new(
            StubTransport::new()
                .body("/subject_search", &subject_page("4242"))
                .body("/rexxar/api/v2/book/4242", &rating_body("9.0", "7")),
        );
        let (controller, presenter) = controller(transport.clone());

        let outcome = finish(controller.on_navigation(PAGE_A, book_page(None, "【正版】红楼梦 脂评本"))).await;
        assert!(matches!(outcome, RunOutcome::Rendered(ref r) if r.id.as_str() == "4242"));
        assert_eq!(transport.hits("/subject_search"), 1);
        assert_eq!(transport.hits("/isbn/"), 0);
        assert!(presenter.log().contains(&"status Some(ResolvingTitle)".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn isbn_miss_does_not_fall_back_to_title() {
        let transport = Arc::new(StubTransport::new());
        let (controller, presenter) = controller(transport.clone());

        let outcome = finish(controller.on_navigation(PAGE_A, book_page(Some("9787020002207"), "红楼梦 脂评本"))).await;
        assert!(matches!(outcome, RunOutcome::NotFound(Miss::Isbn(ref i)) if i.as_str() == "9787020002207"));
        assert_eq!(transport.hits("/subject_search"), 1);
        assert_eq!(transport.hits("search_text=9787020002207"), 1);
        assert_eq!(presenter.slots.snapshot().status, Some(Status::IsbnMiss));
    }

    #[tokio::test(start_paused = true)]
    async fn page_without_key_reports_no_key() {
        let transport = Arc::new(StubTransport::new());
        let (controller, presenter) = controller(transport.clone());

        let outcome = finish(controller.on_navigation(PAGE_A, book_page(None, "新书"))).await;
        assert_eq!(outcome, RunOutcome::NotFound(Miss::NoKey));
        assert!(transport.requests().is_empty());

        let slots = presenter.slots.snapshot();
        assert_eq!(slots.status, Some(Status::NoKey));
        assert_eq!(slots.found.as_deref(), Some("no ISBN"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_rating_still_fetches_reviews() {
        let listing = r#"<div class="comment"><span class="short">好书</span></div>"#;
        let transport = Arc::new(
            StubTransport::new()
                .body("/isbn/9787020002207/", &subject_page("77"))
                .body("/rexxar/", r#"{"rating":{}}"#)
                .body("/subject/77/comments/", listing),
        );
        let (controller, presenter) = controller(transport);

        let outcome = finish(controller.on_navigation(PAGE_A, book_page(Some("9787020002207"), "红楼梦 脂评本"))).await;
        let RunOutcome::Rendered(rendered) = outcome else {
            panic!("expected a rendered run, got {outcome:?}");
        };
        assert_eq!(rendered.rating, None);
        assert_eq!(rendered.reviews.reviews().len(), 1);

        let slots = presenter.slots.snapshot();
        assert_eq!(slots.status, Some(Status::RatingUnavailable));
        assert_eq!(slots.score, None);
        assert_eq!(slots.reviews.map(|r| r.reviews().len()), Some(1));
    }
}
