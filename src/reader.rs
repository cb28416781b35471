//! Book index and page views over staged payloads.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::cache::LocalCache;
use crate::catalog::{Catalog, cached_catalog};
use crate::formats::{Book, BookPayload, IndexEntry, PageBody};
use crate::stager::Stager;

pub const UNTITLED_BOOK: &str = "Untitled Book";

/// Book and page identifiers taken from a `/book/:bookId/page/:pageId` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub book_id: String,
    pub page_id: String,
}

impl Cursor {
    pub fn new(book_id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            page_id: page_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookLink {
    pub book_id: String,
    pub title: String,
}

impl From<&Book> for BookLink {
    fn from(book: &Book) -> Self {
        Self {
            book_id: book.book_id.clone(),
            title: book.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexView {
    pub book_id: String,
    pub title: String,
    /// False when no payload could be staged within the wait window.
    pub staged: bool,
    pub entries: Vec<IndexEntry>,
    pub prev_book: Option<BookLink>,
    pub next_book: Option<BookLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub book_id: String,
    pub book_title: String,
    /// `None` renders as "Page not found".
    pub page: Option<PageBody>,
    pub position: Option<usize>,
    pub total: usize,
    pub prev: Option<IndexEntry>,
    pub next: Option<IndexEntry>,
}

/// Position of a page within the index and its neighbours. Both neighbours
/// are `None` when the page is not in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub position: Option<usize>,
    pub prev: Option<IndexEntry>,
    pub next: Option<IndexEntry>,
}

impl Pagination {
    pub fn locate(index: &[IndexEntry], page_id: &str) -> Self {
        let Some(position) = index.iter().position(|entry| entry.page_id == page_id) else {
            return Self {
                position: None,
                prev: None,
                next: None,
            };
        };
        Self {
            position: Some(position),
            prev: position.checked_sub(1).and_then(|i| index.get(i)).cloned(),
            next: index.get(position + 1).cloned(),
        }
    }

    pub fn has_prev(&self) -> bool {
        self.prev.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolvedPage {
    Stored(PageBody),
    /// Derived from the index; must be written back into the payload.
    Backfill(PageBody),
    Missing,
}

fn resolve_page(payload: &BookPayload, page_id: &str) -> ResolvedPage {
    let entry = payload.index_entry(page_id);
    match (payload.page(page_id), entry) {
        (Some(body), Some(entry))
            if (body.page_title.is_empty() || body.page_text.is_empty())
                && !entry.page_title.is_empty()
                && body.page_title != entry.page_title =>
        {
            ResolvedPage::Backfill(PageBody {
                page_title: entry.page_title.clone(),
                ..body.clone()
            })
        }
        (Some(body), _) => ResolvedPage::Stored(body.clone()),
        (None, Some(entry)) => ResolvedPage::Backfill(PageBody::from_index(entry)),
        (None, None) => ResolvedPage::Missing,
    }
}

fn index_title(book_id: &str, payload: Option<&BookPayload>, catalog: &Catalog) -> String {
    catalog
        .get(book_id)
        .map(|book| book.title.trim())
        .filter(|title| !title.is_empty())
        .map(str::to_owned)
        .or_else(|| payload.and_then(|p| p.title.clone()))
        .unwrap_or_else(|| UNTITLED_BOOK.to_owned())
}

fn page_book_title(payload: &BookPayload, catalog: &Catalog) -> String {
    payload
        .title
        .clone()
        .or_else(|| {
            catalog
                .get(&payload.book_id)
                .map(|book| book.title.trim().to_owned())
                .filter(|title| !title.is_empty())
        })
        .or_else(|| {
            payload
                .index
                .first()
                .map(|entry| entry.page_title.clone())
                .filter(|title| !title.is_empty())
        })
        .unwrap_or_else(|| UNTITLED_BOOK.to_owned())
}

pub struct Reader {
    stager: Arc<Stager>,
    cache: Arc<LocalCache>,
    stage_wait: Duration,
}

impl Reader {
    pub fn new(stager: Arc<Stager>, cache: Arc<LocalCache>, stage_wait: Duration) -> Self {
        Self {
            stager,
            cache,
            stage_wait,
        }
    }

    /// Index of a book. Never fails: an unstaged book renders as an empty
    /// "Untitled Book" index.
    pub async fn open_index(&self, book_id: &str) -> IndexView {
        let payload = self.stager.ensure(book_id, self.stage_wait).await;
        self.index_view(book_id, payload.as_deref()).await
    }

    /// Moves to an adjacent book: always re-fetches its payload before
    /// rendering the index.
    pub async fn switch_book(&self, book_id: &str) -> IndexView {
        let payload = self.stager.restage(book_id).wait(self.stage_wait).await;
        self.index_view(book_id, payload.as_deref()).await
    }

    /// One page of a staged book, or `None` when the book has no payload.
    /// Never starts a fetch; an in-flight staging is waited on.
    pub async fn open_page(&self, cursor: &Cursor) -> anyhow::Result<Option<PageView>> {
        let Some(payload) = self.stager.staged(&cursor.book_id, self.stage_wait).await else {
            tracing::warn!(book_id = %cursor.book_id, "no staged payload for page view");
            return Ok(None);
        };
        let catalog = cached_catalog(&self.cache).await;

        let page = match resolve_page(&payload, &cursor.page_id) {
            ResolvedPage::Stored(body) => Some(body),
            ResolvedPage::Backfill(body) => {
                self.stager
                    .backfill(&cursor.book_id, body.clone())
                    .await
                    .context("backfill page body")?;
                Some(body)
            }
            ResolvedPage::Missing => None,
        };
        let pagination = Pagination::locate(&payload.index, &cursor.page_id);

        Ok(Some(PageView {
            book_id: cursor.book_id.clone(),
            book_title: page_book_title(&payload, &catalog),
            page,
            position: pagination.position,
            total: payload.index.len(),
            prev: pagination.prev,
            next: pagination.next,
        }))
    }

    async fn index_view(&self, book_id: &str, payload: Option<&BookPayload>) -> IndexView {
        let catalog = cached_catalog(&self.cache).await;
        let (prev_book, next_book) = catalog.neighbors(book_id);
        IndexView {
            book_id: book_id.to_owned(),
            title: index_title(book_id, payload, &catalog),
            staged: payload.is_some(),
            entries: payload.map(|p| p.index.clone()).unwrap_or_default(),
            prev_book: prev_book.map(BookLink::from),
            next_book: next_book.map(BookLink::from),
        }
    }
}
