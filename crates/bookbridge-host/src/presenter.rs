//! Output slots and the presenter that receives them.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use bookbridge_core::{Detection, RatingRecord, ReviewOutcome};

/// Progress or failure line shown above the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Identifying,
    ResolvingIsbn,
    IsbnMiss,
    NoKey,
    ResolvingTitle,
    TitleMiss,
    FetchingRating,
    RatingUnavailable,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Identifying => "identifying book...",
            Self::ResolvingIsbn => "looking up by ISBN...",
            Self::IsbnMiss => "no match for this ISBN",
            Self::NoKey => "no ISBN found and the title is not usable",
            Self::ResolvingTitle => "looking up by title...",
            Self::TitleMiss => "no match for this title",
            Self::FetchingRating => "fetching rating...",
            Self::RatingUnavailable => "rating unavailable",
        })
    }
}

/// Receives slot updates for the current page.
///
/// Calls arrive in pipeline order and only from the live generation; a
/// presenter never has to filter stale results itself.
pub trait Presenter: Send + Sync {
    /// A new run started: show the widget with every result slot empty.
    fn reset(&self);
    /// The page is not a detail page: remove everything.
    fn teardown(&self);
    fn show_status(&self, status: Option<Status>);
    fn show_detection(&self, detection: &Detection);
    fn show_link(&self, url: &str);
    fn show_rating(&self, rating: Option<&RatingRecord>);
    fn show_reviews(&self, reviews: &ReviewOutcome);
}

/// Snapshot of every output slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    pub visible: bool,
    pub status: Option<Status>,
    pub found: Option<String>,
    pub score: Option<String>,
    pub votes: Option<String>,
    pub reviews: Option<ReviewOutcome>,
    pub link: Option<String>,
}

/// Human summary of what extraction found, e.g. `ISBN 9787020002207 · 红楼梦`.
pub fn describe(detection: &Detection) -> String {
    let isbn = match &detection.isbn {
        Some(isbn) => format!("ISBN {isbn}"),
        None => "no ISBN".to_string(),
    };
    match &detection.title {
        Some(title) => format!("{isbn} · {title}"),
        None => isbn,
    }
}

/// Keeps slots in memory.
#[derive(Debug, Default)]
pub struct SlotPresenter {
    slots: Mutex<Slots>,
}

impl SlotPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Slots {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut Slots)) {
        f(&mut self.slots.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl Presenter for SlotPresenter {
    fn reset(&self) {
        self.update(|s| {
            *s = Slots {
                visible: true,
                ..Slots::default()
            }
        });
    }

    fn teardown(&self) {
        self.update(|s| *s = Slots::default());
    }

    fn show_status(&self, status: Option<Status>) {
        self.update(|s| s.status = status);
    }

    fn show_detection(&self, detection: &Detection) {
        self.update(|s| s.found = Some(describe(detection)));
    }

    fn show_link(&self, url: &str) {
        self.update(|s| s.link = Some(url.to_string()));
    }

    fn show_rating(&self, rating: Option<&RatingRecord>) {
        self.update(|s| {
            s.score = rating.map(|r| r.score.clone());
            s.votes = rating.and_then(|r| r.votes.clone());
        });
    }

    fn show_reviews(&self, reviews: &ReviewOutcome) {
        self.update(|s| s.reviews = Some(reviews.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookbridge_core::{Isbn, Title};

    #[test]
    fn describe_lists_what_was_found() {
        let both = Detection {
            isbn: Isbn::normalize("978-7-02-000220-7"),
            title: Title::new("红楼梦 脂评本"),
        };
        assert_eq!(describe(&both), "ISBN 9787020002207 · 红楼梦 脂评本");

        let title_only = Detection {
            isbn: None,
            title: Title::new("红楼梦 脂评本"),
        };
        assert_eq!(describe(&title_only), "no ISBN · 红楼梦 脂评本");
        assert_eq!(describe(&Detection::default()), "no ISBN");
    }

    #[test]
    fn reset_clears_previous_results() {
        let presenter = SlotPresenter::new();
        presenter.reset();
        presenter.show_link("https://book.douban.com/subject/1/");
        presenter.show_rating(Some(&RatingRecord {
            score: "8.6".into(),
            votes: Some("5000".into()),
        }));
        presenter.reset();

        let slots = presenter.snapshot();
        assert!(slots.visible);
        assert_eq!(slots.link, None);
        assert_eq!(slots.score, None);
    }

    #[test]
    fn missing_rating_empties_score_and_votes() {
        let presenter = SlotPresenter::new();
        presenter.show_rating(Some(&RatingRecord {
            score: "7.0".into(),
            votes: None,
        }));
        assert_eq!(presenter.snapshot().score.as_deref(), Some("7.0"));

        presenter.show_rating(None);
        let slots = presenter.snapshot();
        assert_eq!(slots.score, None);
        assert_eq!(slots.votes, None);
    }

    #[test]
    fn teardown_hides_everything() {
        let presenter = SlotPresenter::new();
        presenter.reset();
        presenter.show_status(Some(Status::Identifying));
        presenter.teardown();
        assert_eq!(presenter.snapshot(), Slots::default());
    }
}
