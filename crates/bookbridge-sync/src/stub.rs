//! Canned [`Transport`] for tests.
//!
//! Routes match on a URL substring; the first matching route answers after its
//! delay. Unrouted URLs answer 404 immediately.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{FetchError, HttpRequest, Transport};

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
    /// Never answers.
    Hang,
}

#[derive(Debug, Clone)]
struct Route {
    fragment: String,
    delay: Duration,
    reply: Reply,
}

#[derive(Debug, Default)]
pub struct StubTransport {
    routes: Vec<Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: &str, delay: Duration, reply: Reply) -> Self {
        self.routes.push(Route {
            fragment: fragment.to_string(),
            delay,
            reply,
        });
        self
    }

    /// Shorthand for an immediate body reply.
    pub fn body(self, fragment: &str, body: &str) -> Self {
        self.route(fragment, Duration::ZERO, Reply::Body(body.to_string()))
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn hits(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get(&self, request: &HttpRequest) -> Result<String, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let Some(route) = self
            .routes
            .iter()
            .find(|r| request.url.contains(&r.fragment))
        else {
            return Err(FetchError::Server {
                status: 404,
                body: String::new(),
            });
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        match &route.reply {
            Reply::Body(body) => Ok(body.clone()),
            Reply::Status(status) => Err(FetchError::Server {
                status: *status,
                body: String::new(),
            }),
            Reply::Hang => std::future::pending().await,
        }
    }
}
