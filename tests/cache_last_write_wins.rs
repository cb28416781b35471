use std::sync::Arc;

use kripadham::cache::{CacheKey, CachePolicy, LocalCache, LocalFsCacheStore};
use serde_json::{Value, json};

fn open(dir: &std::path::Path) -> LocalCache {
    LocalCache::new(
        Arc::new(LocalFsCacheStore::new(dir)),
        CachePolicy::default(),
    )
}

#[tokio::test]
async fn second_writer_replaces_first_for_every_reader() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let first = open(temp.path());
    let second = open(temp.path());
    let key = CacheKey::book_data("B1");

    first
        .put(&key, &json!({ "book_id": "B1", "index": [{ "page_id": "P1" }] }))
        .await?;
    second
        .put(&key, &json!({ "book_id": "B1", "index": [{ "page_id": "P2" }] }))
        .await?;

    let expected = json!({ "book_id": "B1", "index": [{ "page_id": "P2" }] });
    for reader in [&first, &second, &open(temp.path())] {
        let value: Option<Value> = reader.get(&key).await?;
        assert_eq!(value.as_ref(), Some(&expected));
    }
    Ok(())
}
