//! The stage sequence: extract, resolve, rating, reviews.
//!
//! A run publishes through a [`RunGuard`]. Guards handed out by the session
//! controller are tied to a generation and refuse once it is superseded;
//! detached guards (one-shot lookups) always publish.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bookbridge_core::{
    CanonicalId, Config, Detection, IdentifyingKey, Isbn, PageSource, RatingRecord,
    ReviewOutcome, Title, detect,
};
use bookbridge_store::Cache;
use bookbridge_sync::{Endpoints, FetchError, RatingFetcher, Resolver, ReviewFetcher, Transport};
use tracing::{debug, info};

use crate::presenter::{Presenter, Status};

/// Where the live run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting,
    Resolving,
    FetchingRating,
    FetchingReviews,
    Done,
}

/// Why a run ended without a canonical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    /// Neither an ISBN nor a usable title on the page.
    NoKey,
    Isbn(Isbn),
    Title(Title),
}

/// Everything a completed run published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub id: CanonicalId,
    pub link: String,
    pub rating: Option<RatingRecord>,
    pub reviews: ReviewOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rendered(Rendered),
    NotFound(Miss),
    /// A newer navigation superseded this run before it finished.
    Abandoned,
}

pub(crate) struct Live {
    pub(crate) generation: u64,
    pub(crate) stage: Stage,
}

impl Live {
    pub(crate) fn new() -> Self {
        Self {
            generation: 0,
            stage: Stage::Idle,
        }
    }
}

/// Marker for a run whose generation is no longer current.
pub(crate) struct Superseded;

/// A run's handle on the presenter and, for session runs, the shared
/// generation counter.
pub(crate) struct RunGuard {
    generation: u64,
    live: Option<Arc<Mutex<Live>>>,
    presenter: Arc<dyn Presenter>,
}

impl RunGuard {
    pub(crate) fn session(
        generation: u64,
        live: Arc<Mutex<Live>>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            generation,
            live: Some(live),
            presenter,
        }
    }

    fn detached(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            generation: 0,
            live: None,
            presenter,
        }
    }

    fn current(&self) -> Result<Option<MutexGuard<'_, Live>>, Superseded> {
        let Some(live) = &self.live else {
            return Ok(None);
        };
        let live = live.lock().unwrap_or_else(PoisonError::into_inner);
        if live.generation == self.generation {
            Ok(Some(live))
        } else {
            Err(Superseded)
        }
    }

    fn enter(&self, stage: Stage) -> Result<(), Superseded> {
        if let Some(mut live) = self.current()? {
            live.stage = stage;
        }
        debug!(generation = self.generation, ?stage, "stage");
        Ok(())
    }

    /// Run `f` against the presenter only if this run is still live. The
    /// lock is held for the duration so a concurrent navigation cannot slip
    /// in between the check and the publish.
    fn publish(&self, f: impl FnOnce(&dyn Presenter)) -> Result<(), Superseded> {
        let _live = self.current()?;
        f(self.presenter.as_ref());
        Ok(())
    }
}

/// Resolver, fetchers and settings shared by every run.
pub struct Pipeline {
    config: Config,
    resolver: Resolver,
    ratings: RatingFetcher,
    reviews: ReviewFetcher,
    endpoints: Endpoints,
}

impl Pipeline {
    pub fn new(config: Config, transport: Arc<dyn Transport>, cache: Cache) -> Result<Self, FetchError> {
        let endpoints = Endpoints::new(&config.endpoints)?;
        let cache = cache.with_rating_ttl(config.rating_ttl());
        Ok(Self {
            resolver: Resolver::new(
                transport.clone(),
                cache.clone(),
                endpoints.clone(),
                config.isbn_resolve_cap(),
            ),
            ratings: RatingFetcher::new(transport.clone(), cache, endpoints.clone()),
            reviews: ReviewFetcher::new(transport, endpoints.clone()),
            endpoints,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage after extraction for an already-known detection,
    /// publishing to `presenter` unconditionally.
    pub async fn lookup(&self, detection: &Detection, presenter: Arc<dyn Presenter>) -> RunOutcome {
        let guard = RunGuard::detached(presenter);
        if guard.publish(|p| p.reset()).is_err() {
            return RunOutcome::Abandoned;
        }
        self.from_detection(&guard, detection)
            .await
            .unwrap_or(RunOutcome::Abandoned)
    }

    /// Full run over a live page.
    pub(crate) async fn run(
        &self,
        guard: &RunGuard,
        page: &dyn PageSource,
    ) -> Result<RunOutcome, Superseded> {
        guard.publish(|p| {
            p.reset();
            p.show_status(Some(Status::Identifying));
        })?;

        let detection = detect(page, &self.config).await;
        self.from_detection(guard, &detection).await
    }

    async fn from_detection(
        &self,
        guard: &RunGuard,
        detection: &Detection,
    ) -> Result<RunOutcome, Superseded> {
        guard.publish(|p| p.show_detection(detection))?;

        let Some(key) = detection.key() else {
            return self.miss(guard, Status::NoKey, Miss::NoKey);
        };

        guard.enter(Stage::Resolving)?;
        let resolving = match &key {
            IdentifyingKey::Isbn(_) => Status::ResolvingIsbn,
            IdentifyingKey::Title(_) => Status::ResolvingTitle,
        };
        guard.publish(|p| p.show_status(Some(resolving)))?;

        let Some(id) = self.resolver.resolve(&key).await else {
            return match key {
                IdentifyingKey::Isbn(isbn) => self.miss(guard, Status::IsbnMiss, Miss::Isbn(isbn)),
                IdentifyingKey::Title(title) => {
                    self.miss(guard, Status::TitleMiss, Miss::Title(title))
                }
            };
        };

        guard.enter(Stage::FetchingRating)?;
        let link = self.endpoints.record(&id);
        guard.publish(|p| {
            p.show_link(&link);
            p.show_status(Some(Status::FetchingRating));
        })?;

        let rating = self.ratings.fetch(&id).await;
        guard.publish(|p| {
            p.show_rating(rating.as_ref());
            p.show_status(rating.is_none().then_some(Status::RatingUnavailable));
        })?;

        guard.enter(Stage::FetchingReviews)?;
        let reviews = self
            .reviews
            .fetch(&id, self.config.max_reviews, self.config.max_review_len)
            .await;
        guard.publish(|p| p.show_reviews(&reviews))?;

        guard.enter(Stage::Done)?;
        info!(
            generation = guard.generation,
            %id,
            rated = rating.is_some(),
            reviews = reviews.reviews().len(),
            "run complete"
        );
        Ok(RunOutcome::Rendered(Rendered {
            id,
            link,
            rating,
            reviews,
        }))
    }

    fn miss(&self, guard: &RunGuard, status: Status, miss: Miss) -> Result<RunOutcome, Superseded> {
        guard.publish(|p| p.show_status(Some(status)))?;
        guard.enter(Stage::Done)?;
        info!(generation = guard.generation, ?miss, "run found nothing");
        Ok(RunOutcome::NotFound(miss))
    }
}
