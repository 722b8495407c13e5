//! Background consumer of [`ClickEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::LinkRepository;

/// Retries after the first failed write.
const MAX_RETRIES: usize = 3;

/// Consumes click events until every sender is dropped and the queue is drained.
///
/// Each event increments the link's counter. Transient storage failures are
/// retried with jittered exponential backoff; an event that still fails is
/// logged and counted, never reported to the client that triggered it.
pub async fn run_click_worker<R>(mut rx: mpsc::Receiver<ClickEvent>, repository: Arc<R>)
where
    R: LinkRepository + ?Sized,
{
    tracing::info!("Click worker started");

    while let Some(event) = rx.recv().await {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(500))
            .map(jitter)
            .take(MAX_RETRIES);

        let result = Retry::spawn(strategy, || {
            repository.record_click(&event.code, event.clicked_at)
        })
        .await;

        match result {
            Ok(true) => metrics::counter!("clicks_recorded_total").increment(1),
            Ok(false) => {
                tracing::debug!(code = %event.code, "Click for a deleted link ignored");
            }
            Err(e) => {
                metrics::counter!("clicks_failed_total").increment(1);
                tracing::warn!(code = %event.code, error = %e, "Failed to record click");
            }
        }
    }

    tracing::info!("Click worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockLinkRepository;
    use crate::error::AppError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_worker_records_each_event() {
        let mut repo = MockLinkRepository::new();
        repo.expect_record_click()
            .withf(|code, _| code == "abcd1234")
            .times(2)
            .returning(|_, _| Ok(true));

        let (tx, rx) = mpsc::channel(8);
        tx.send(ClickEvent::new("abcd1234")).await.unwrap();
        tx.send(ClickEvent::new("abcd1234")).await.unwrap();
        drop(tx);

        run_click_worker(rx, Arc::new(repo)).await;
    }

    #[tokio::test]
    async fn test_worker_retries_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut repo = MockLinkRepository::new();
        repo.expect_record_click().times(3).returning(move |_, _| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::internal("Database error", json!({})))
            } else {
                Ok(true)
            }
        });

        let (tx, rx) = mpsc::channel(1);
        tx.send(ClickEvent::new("retry123")).await.unwrap();
        drop(tx);

        run_click_worker(rx, Arc::new(repo)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_worker_gives_up_and_continues() {
        let mut repo = MockLinkRepository::new();
        repo.expect_record_click()
            .withf(|code, _| code == "broken12")
            .times(MAX_RETRIES + 1)
            .returning(|_, _| Err(AppError::internal("Database error", json!({}))));
        repo.expect_record_click()
            .withf(|code, _| code == "healthy1")
            .times(1)
            .returning(|_, _| Ok(true));

        let (tx, rx) = mpsc::channel(4);
        tx.send(ClickEvent::new("broken12")).await.unwrap();
        tx.send(ClickEvent::new("healthy1")).await.unwrap();
        drop(tx);

        run_click_worker(rx, Arc::new(repo)).await;
    }
}
