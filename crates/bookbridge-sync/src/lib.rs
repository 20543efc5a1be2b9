//! Sync layer: everything that talks to the aggregator over the network.

pub mod endpoints;
pub mod http;
pub mod race;
pub mod rating;
pub mod resolve;
pub mod reviews;

#[cfg(any(test, feature = "testing"))]
pub mod stub;

pub use endpoints::Endpoints;
pub use http::{FetchError, HttpRequest, HttpTransport, Transport};
pub use race::first_some;
pub use rating::RatingFetcher;
pub use resolve::Resolver;
pub use reviews::ReviewFetcher;
