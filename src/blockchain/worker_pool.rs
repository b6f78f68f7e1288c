use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `work` over every item with at most `limit` futures in flight and
/// collect the outputs in completion order.
pub async fn run_bounded<T, F, Fut, R>(items: Vec<T>, limit: usize, work: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(work)
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
