use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::Instrument as _;

/// Background staging jobs. At most `max_concurrency` book fetches run at
/// once; the rest wait for a permit.
#[derive(Debug, Clone)]
pub struct InProcessQueue {
    semaphore: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
}

impl InProcessQueue {
    pub fn new(max_concurrency: usize) -> Self {
        let permits = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Jobs spawned but not yet holding a permit.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Runs `fut` inside a `stage` span tagged with `book_id`.
    pub fn spawn_for_book<F>(&self, book_id: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let waiting = Arc::clone(&self.waiting);
        waiting.fetch_add(1, Ordering::SeqCst);
        let span = tracing::info_span!("stage", book_id = %book_id);

        tokio::spawn(
            async move {
                let permit = semaphore.acquire_owned().await;
                waiting.fetch_sub(1, Ordering::SeqCst);
                let Ok(_permit) = permit else {
                    tracing::error!("staging queue is closed; dropping job");
                    return;
                };
                fut.await;
            }
            .instrument(span),
        );
    }
}
