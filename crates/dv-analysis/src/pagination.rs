use std::future::Future;

pub const DEFAULT_START_PAGE: u32 = 1;

/// Calls `fetch` with increasing page numbers starting at `start_page` and
/// accumulates the rows. Stops at the first empty page or after `max_pages`
/// calls. The first error aborts the whole accumulation.
pub async fn fetch_all_pages<T, E, F, Fut>(
    mut fetch: F,
    max_pages: u32,
    start_page: u32,
) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut accumulated = Vec::new();
    for offset in 0..max_pages {
        let page = start_page.saturating_add(offset);
        let rows = fetch(page).await?;
        tracing::trace!(page, rows = rows.len(), "fetched page");
        if rows.is_empty() {
            break;
        }
        accumulated.extend(rows);
    }
    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn full_pages_stop_after_exactly_max_pages() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let rows = fetch_all_pages(
            move |page| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(vec![page; 1000]) }
            },
            7,
            DEFAULT_START_PAGE,
        )
        .await
        .expect("pages");

        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert_eq!(rows.len(), 7000);
        assert_eq!(rows.first(), Some(&1));
        assert_eq!(rows.last(), Some(&7));
    }

    #[tokio::test]
    async fn empty_page_ends_accumulation() {
        let mut seen = Vec::new();
        let rows = fetch_all_pages(
            |page| {
                seen.push(page);
                async move {
                    if page < 5 {
                        Ok::<_, String>(vec![page, page])
                    } else {
                        Ok(Vec::new())
                    }
                }
            },
            100,
            3,
        )
        .await
        .expect("pages");

        assert_eq!(seen, vec![3, 4, 5]);
        assert_eq!(rows, vec![3, 3, 4, 4]);
    }

    #[tokio::test]
    async fn errors_abort_without_partial_results() {
        let result = fetch_all_pages(
            |page| async move {
                if page == 2 {
                    Err("indexer unavailable".to_owned())
                } else {
                    Ok(vec![page])
                }
            },
            10,
            DEFAULT_START_PAGE,
        )
        .await;

        assert_eq!(result, Err("indexer unavailable".to_owned()));
    }

    #[tokio::test]
    async fn zero_max_pages_never_calls_fetch() {
        let rows = fetch_all_pages(
            |_page| async move { Err::<Vec<u32>, _>("should not be called") },
            0,
            DEFAULT_START_PAGE,
        )
        .await
        .expect("no pages");
        assert!(rows.is_empty());
    }
}
