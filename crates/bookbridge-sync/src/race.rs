//! First-success race over equivalent lookups.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

/// Run every task concurrently and return the first `Some` to settle.
///
/// Tasks that settle with `None` drop out of the race. When all of them have
/// dropped out, or `deadline` passes first, the race yields `None`. Whatever
/// is still outstanding at that point is dropped and its result ignored.
pub async fn first_some<I, F, T>(tasks: I, deadline: Option<Duration>) -> Option<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Option<T>>,
{
    let mut pending: FuturesUnordered<F> = tasks.into_iter().collect();
    let race = async move {
        while let Some(settled) = pending.next().await {
            if settled.is_some() {
                return settled;
            }
        }
        None
    };

    match deadline {
        Some(limit) => tokio::time::timeout(limit, race).await.unwrap_or(None),
        None => race.await,
    }
}
