//! Core layer: book types, configuration, page key extraction and review parsing.

pub mod config;
pub mod extract;
pub mod markup;
pub mod reviews;
pub mod types;

pub use config::{Config, ConfigError, EndpointConfig};
pub use extract::{Detection, PageSource, detect, extract};
pub use markup::HtmlPage;
pub use reviews::{ReviewOutcome, parse_reviews};
pub use types::{CanonicalId, IdentifyingKey, Isbn, RatingRecord, ReviewSummary, Title};
