use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, LocalCache};
use crate::formats::Book;
use crate::search::contains_ci;
use crate::sheets::SheetSource;

/// Fetches the book catalog and keeps the last copy under `allBooks`.
pub struct CatalogLoader {
    source: Arc<dyn SheetSource>,
    cache: Arc<LocalCache>,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn SheetSource>, cache: Arc<LocalCache>) -> Self {
        Self { source, cache }
    }

    pub async fn load(&self) -> anyhow::Result<Catalog> {
        let books = self.source.books().await?;
        self.cache
            .put(&CacheKey::Catalog, &books)
            .await
            .context("persist book catalog")?;
        tracing::info!(books = books.len(), "loaded book catalog");
        Ok(Catalog::new(books))
    }

    /// Like [`CatalogLoader::load`], but failures leave the catalog empty.
    pub async fn load_or_empty(&self) -> Catalog {
        match self.load().await {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::warn!(?err, "failed to load book catalog");
                Catalog::default()
            }
        }
    }

    pub async fn cached(&self) -> Catalog {
        cached_catalog(&self.cache).await
    }
}

/// Last persisted catalog, or an empty one.
pub async fn cached_catalog(cache: &LocalCache) -> Catalog {
    match cache.get::<Vec<Book>>(&CacheKey::Catalog).await {
        Ok(books) => Catalog::new(books.unwrap_or_default()),
        Err(err) => {
            tracing::warn!(?err, "failed to read cached book catalog");
            Catalog::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogQuery {
    pub search: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    books: Vec<Book>,
}

impl Catalog {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, book_id: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.book_id == book_id)
    }

    /// Exact category match (empty = any) and a case-insensitive search over
    /// title or category (empty = all).
    pub fn filter(&self, query: &CatalogQuery) -> Vec<&Book> {
        self.books
            .iter()
            .filter(|book| query.category.is_empty() || book.category == query.category)
            .filter(|book| {
                contains_ci(&book.title, &query.search) || contains_ci(&book.category, &query.search)
            })
            .collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.books
            .iter()
            .map(|book| book.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Books before and after `book_id` in catalog order.
    pub fn neighbors(&self, book_id: &str) -> (Option<&Book>, Option<&Book>) {
        let Some(position) = self.books.iter().position(|book| book.book_id == book_id) else {
            return (None, None);
        };
        let prev = position.checked_sub(1).and_then(|i| self.books.get(i));
        let next = self.books.get(position + 1);
        (prev, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stager::tests::StubSource;

    fn book(id: &str, title: &str, category: &str) -> Book {
        Book {
            book_id: id.to_owned(),
            title: title.to_owned(),
            cover_image_url: String::new(),
            category: category.to_owned(),
        }
    }

    fn sample() -> Catalog {
        Catalog::new(vec![
            book("B1", "Bhagavad Gita", "Scripture"),
            book("B2", "Nitai Charitra", "Biography"),
            book("B3", "Kirtan Songs", "Songs"),
            book("B4", "Srimad Bhagavatam", "Scripture"),
        ])
    }

    fn ids(books: Vec<&Book>) -> Vec<&str> {
        books.into_iter().map(|b| b.book_id.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_everything() {
        assert_eq!(ids(sample().filter(&CatalogQuery::default())).len(), 4);
    }

    #[test]
    fn search_matches_title_or_category_case_insensitively() {
        let catalog = sample();
        let query = CatalogQuery {
            search: "SCRIP".to_owned(),
            category: String::new(),
        };
        assert_eq!(ids(catalog.filter(&query)), vec!["B1", "B4"]);

        let query = CatalogQuery {
            search: "charitra".to_owned(),
            category: String::new(),
        };
        assert_eq!(ids(catalog.filter(&query)), vec!["B2"]);
    }

    #[test]
    fn category_filter_is_exact_and_combines_with_search() {
        let catalog = sample();
        let query = CatalogQuery {
            search: "gita".to_owned(),
            category: "Scripture".to_owned(),
        };
        assert_eq!(ids(catalog.filter(&query)), vec!["B1"]);

        let query = CatalogQuery {
            search: String::new(),
            category: "scripture".to_owned(),
        };
        assert!(catalog.filter(&query).is_empty());
    }

    #[test]
    fn categories_are_distinct_and_sorted() {
        assert_eq!(sample().categories(), vec!["Biography", "Scripture", "Songs"]);
    }

    #[test]
    fn neighbors_stop_at_catalog_edges() {
        let catalog = sample();
        let (prev, next) = catalog.neighbors("B1");
        assert!(prev.is_none());
        assert_eq!(next.map(|b| b.book_id.as_str()), Some("B2"));

        let (prev, next) = catalog.neighbors("B4");
        assert_eq!(prev.map(|b| b.book_id.as_str()), Some("B3"));
        assert!(next.is_none());

        assert_eq!(catalog.neighbors("nope"), (None, None));
    }

    #[tokio::test]
    async fn load_persists_catalog_for_other_views() {
        let source = Arc::new(StubSource::new(
            vec![book("B1", "Gita", "Scripture")],
            Vec::new(),
        ));
        let cache = Arc::new(LocalCache::in_memory());
        let loader = CatalogLoader::new(source, Arc::clone(&cache));

        assert!(loader.cached().await.is_empty());
        let loaded = loader.load_or_empty().await;
        assert_eq!(loaded.books().len(), 1);
        assert_eq!(cached_catalog(&cache).await, loaded);
    }
}
