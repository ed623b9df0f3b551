use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::AnalysisError;

/// Spawns one task per item with at most `concurrency` running at once.
/// Output order follows completion; callers key results themselves.
pub(crate) async fn run_bounded<I, T, F, Fut>(
    items: I,
    concurrency: usize,
    mut task: F,
) -> Result<Vec<T>, AnalysisError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for item in items {
        let semaphore = semaphore.clone();
        let work = task(item);

        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| AnalysisError::Task("analysis semaphore closed".to_owned()))?;
            Ok::<_, AnalysisError>(work.await)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result?),
            Err(err) => return Err(AnalysisError::Task(format!("analysis task join error: {err}"))),
        }
    }

    Ok(results)
}
