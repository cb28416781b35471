//! Book-data staging.
//!
//! The stager is the only writer of `bookData-<id>` cache entries. A staging
//! fetches one book's payload on the in-process queue, persists it, and then
//! publishes the outcome on a `watch` channel. Readers await that signal
//! instead of polling the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::watch;

use crate::app::queue::InProcessQueue;
use crate::cache::{CacheKey, LocalCache};
use crate::formats::{BookPayload, PageBody};
use crate::sheets::SheetSource;

#[derive(Debug, Clone)]
pub enum StageState {
    Pending,
    Ready(Arc<BookPayload>),
    Failed(String),
}

impl StageState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Handle on one staging's completion signal.
#[derive(Debug, Clone)]
pub struct StageTicket {
    book_id: String,
    rx: watch::Receiver<StageState>,
}

impl StageTicket {
    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn state(&self) -> StageState {
        self.rx.borrow().clone()
    }

    /// Waits up to `limit` for the staging to finish. `None` when it failed
    /// or did not finish in time.
    pub async fn wait(mut self, limit: Duration) -> Option<Arc<BookPayload>> {
        let outcome = tokio::time::timeout(limit, self.rx.wait_for(|state| !state.is_pending()))
            .await
            .map(|done| done.map(|state| (*state).clone()));

        match outcome {
            Ok(Ok(StageState::Ready(payload))) => Some(payload),
            Ok(Ok(StageState::Failed(message))) => {
                tracing::debug!(book_id = %self.book_id, %message, "staging failed");
                None
            }
            Ok(Ok(StageState::Pending)) | Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!(
                    book_id = %self.book_id,
                    ?limit,
                    "timed out waiting for staged book payload"
                );
                None
            }
        }
    }
}

type Inflight = Arc<Mutex<HashMap<String, watch::Receiver<StageState>>>>;

pub struct Stager {
    source: Arc<dyn SheetSource>,
    cache: Arc<LocalCache>,
    queue: InProcessQueue,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    inflight: Inflight,
}

impl Stager {
    pub fn new(source: Arc<dyn SheetSource>, cache: Arc<LocalCache>, queue: InProcessQueue) -> Self {
        Self {
            source,
            cache,
            queue,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts a background fetch of `book_id`, or joins the one already in
    /// flight. The caller does not have to wait for it.
    pub fn stage(&self, book_id: &str) -> StageTicket {
        if let Some(rx) = self.pending(book_id) {
            tracing::debug!(book_id, "joining in-flight staging");
            return StageTicket {
                book_id: book_id.to_owned(),
                rx,
            };
        }
        self.spawn_fetch(book_id)
    }

    /// Always issues a fresh fetch, bypassing both the cache and any
    /// in-flight staging.
    pub fn restage(&self, book_id: &str) -> StageTicket {
        self.spawn_fetch(book_id)
    }

    /// Cached payload if present, otherwise the outcome of staging it.
    pub async fn ensure(&self, book_id: &str, wait: Duration) -> Option<Arc<BookPayload>> {
        match self.cached(book_id).await {
            Ok(Some(payload)) => return Some(Arc::new(payload)),
            Ok(None) => {}
            Err(err) => tracing::warn!(book_id, ?err, "reading staged payload failed"),
        }
        self.stage(book_id).wait(wait).await
    }

    /// A payload that is staged or being staged, without starting a fetch.
    /// An in-flight staging is awaited for up to `wait`.
    pub async fn staged(&self, book_id: &str, wait: Duration) -> Option<Arc<BookPayload>> {
        // A staging persists before it leaves `Pending`, so once none is in
        // flight the cache is authoritative.
        if let Some(rx) = self.pending(book_id) {
            let ticket = StageTicket {
                book_id: book_id.to_owned(),
                rx,
            };
            return ticket.wait(wait).await;
        }
        match self.cached(book_id).await {
            Ok(payload) => payload.map(Arc::new),
            Err(err) => {
                tracing::warn!(book_id, ?err, "reading staged payload failed");
                None
            }
        }
    }

    pub async fn cached(&self, book_id: &str) -> anyhow::Result<Option<BookPayload>> {
        self.cache.get(&CacheKey::book_data(book_id)).await
    }

    /// Writes a page body into the staged payload, replacing any body with the
    /// same page id.
    pub async fn backfill(&self, book_id: &str, page: PageBody) -> anyhow::Result<BookPayload> {
        let _guard = self.write_lock.lock().await;
        let key = CacheKey::book_data(book_id);
        let Some(mut payload) = self.cache.get::<BookPayload>(&key).await? else {
            anyhow::bail!("book payload is not staged: {book_id}");
        };
        let page_id = page.page_id.clone();
        payload.upsert_page(page);
        self.cache
            .put(&key, &payload)
            .await
            .context("persist backfilled page")?;
        tracing::debug!(book_id, %page_id, "backfilled page body");
        Ok(payload)
    }

    fn pending(&self, book_id: &str) -> Option<watch::Receiver<StageState>> {
        let inflight = self.inflight.lock().ok()?;
        inflight
            .get(book_id)
            .filter(|rx| rx.borrow().is_pending())
            .cloned()
    }

    fn spawn_fetch(&self, book_id: &str) -> StageTicket {
        let (tx, rx) = watch::channel(StageState::Pending);
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.insert(book_id.to_owned(), rx.clone());
        }

        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let write_lock = Arc::clone(&self.write_lock);
        let inflight = Arc::clone(&self.inflight);
        let id = book_id.to_owned();
        let own_rx = rx.clone();

        self.queue.spawn_for_book(book_id, async move {
            let state = match fetch_and_store(source.as_ref(), &cache, &write_lock, &id).await {
                Ok(payload) => {
                    tracing::info!(
                        book_id = %id,
                        pages = payload.index.len(),
                        "staged book payload"
                    );
                    StageState::Ready(Arc::new(payload))
                }
                Err(err) => {
                    tracing::warn!(book_id = %id, ?err, "failed to stage book payload");
                    StageState::Failed(format!("{err:#}"))
                }
            };
            tx.send_replace(state);

            if let Ok(mut inflight) = inflight.lock() {
                if inflight.get(&id).is_some_and(|rx| rx.same_channel(&own_rx)) {
                    inflight.remove(&id);
                }
            }
        });

        StageTicket {
            book_id: book_id.to_owned(),
            rx,
        }
    }
}

async fn fetch_and_store(
    source: &dyn SheetSource,
    cache: &LocalCache,
    write_lock: &tokio::sync::Mutex<()>,
    book_id: &str,
) -> anyhow::Result<BookPayload> {
    let payload = source.book_payload(book_id).await?;
    let _guard = write_lock.lock().await;
    cache
        .put(&CacheKey::book_data(book_id), &payload)
        .await
        .context("persist staged payload")?;
    Ok(payload)
}
