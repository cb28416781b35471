mod sheet_stub;

use std::path::Path;

use predicates::prelude::*;
use serde_json::Value;
use sheet_stub::SheetStub;

fn kripadham(stub: &SheetStub, cache_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kripadham");
    stub.configure(&mut cmd);
    cmd.arg("--cache-dir").arg(cache_dir);
    cmd
}

fn staged_payload(cache_dir: &Path, book_id: &str) -> anyhow::Result<Value> {
    let path = cache_dir
        .join("entries")
        .join(format!("bookData-{book_id}.json"));
    let envelope: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    Ok(envelope["value"].clone())
}

#[test]
fn catalog_then_read_shows_book_title() -> anyhow::Result<()> {
    let stub = SheetStub::spawn();
    let temp = tempfile::TempDir::new()?;

    kripadham(&stub, temp.path())
        .args(["books"])
        .assert()
        .success()
        .stdout(predicate::str::contains("B1\tGita\tScripture"));

    kripadham(&stub, temp.path())
        .args(["read", "--book", "B1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Gita\n"))
        .stdout(predicate::str::contains("P2\tChapter 2"))
        .stdout(predicate::str::contains("next book: Nitai Charitra (B2)"));

    let payload = staged_payload(temp.path(), "B1")?;
    assert_eq!(payload["book_id"], "B1");
    assert_eq!(payload["index"].as_array().map(Vec::len), Some(2));

    kripadham(&stub, temp.path())
        .args(["open", "/book/B1/"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Gita\n"));
    Ok(())
}

#[test]
fn missing_page_body_is_backfilled_and_read_back_from_cache() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    {
        let stub = SheetStub::spawn();
        kripadham(&stub, temp.path())
            .args(["read", "--book", "B1", "--page", "P2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[2/2] Chapter 2"))
            .stdout(predicate::str::contains("prev: Chapter 1 (P1)"))
            .stdout(predicate::str::contains("next:").not());
    }

    let payload = staged_payload(temp.path(), "B1")?;
    let pages = payload["pages"].as_array().cloned().unwrap_or_default();
    assert!(pages.iter().any(|p| p["page_id"] == "P2" && p["page_title"] == "Chapter 2"));

    // The stub is gone; the page must come from the cache.
    let offline = SheetStub::spawn();
    kripadham(&offline, temp.path())
        .env("KRIPADHAM_BOOKS_URL", "http://127.0.0.1:9/books")
        .args(["open", "/book/B1/page/P2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[2/2] Chapter 2"));
    assert!(offline.requests.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn opening_a_page_link_of_an_unstaged_book_does_not_fetch_it() -> anyhow::Result<()> {
    let stub = SheetStub::spawn();
    let temp = tempfile::TempDir::new()?;

    kripadham(&stub, temp.path())
        .args(["open", "/book/B1/page/P1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Page not found"));

    let book_fetches = stub
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.url.contains("getBookData"))
        .count();
    assert_eq!(book_fetches, 0);
    assert!(staged_payload(temp.path(), "B1").is_err());
    Ok(())
}

#[test]
fn unknown_book_renders_untitled_fallback() -> anyhow::Result<()> {
    let stub = SheetStub::spawn();
    let temp = tempfile::TempDir::new()?;

    kripadham(&stub, temp.path())
        .args(["read", "--book", "B9"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Untitled Book\n"))
        .stdout(predicate::str::contains("(no pages)"));

    kripadham(&stub, temp.path())
        .args(["read", "--book", "B9", "--page", "P1"])
        .assert()
        .success()
        .stdout("Page not found\n");
    Ok(())
}

#[test]
fn kirtans_group_by_state_and_export_csv() -> anyhow::Result<()> {
    let stub = SheetStub::spawn();
    let temp = tempfile::TempDir::new()?;
    let csv_path = temp.path().join("kirtans.csv");

    kripadham(&stub, temp.path())
        .args(["kirtans", "--csv"])
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Unknown\n  Shyam\tPune"))
        .stdout(predicate::str::contains("Uttar Pradesh\n  Radha\tAgra"));

    let csv = std::fs::read_to_string(&csv_path)?;
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "\"Name\",\"Address\",\"Phone Number\",\"City\",\"State\",\"Country\",\"Timings\""
    );
    assert_eq!(lines.len(), 4);
    assert!(csv.contains("\"Gopal \"\"Ji\"\"\",\"Sector 5\",\"9540917385\""));
    Ok(())
}

#[test]
fn rust_log_debug_emits_parsed_cli_to_stderr() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kripadham");
    cmd.env("RUST_LOG", "debug")
        .args(["chat", "what is the darshan timing"])
        .assert()
        .success()
        .stdout("Our temple darshan timings are 6 AM - 12 PM and 4 PM - 8 PM.\n")
        .stderr(predicate::str::contains("parsed cli"));
}

#[test]
fn youtube_link_validation_fails_with_message() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kripadham");
    cmd.args(["youtube", "https://youtu.be/abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter a valid YouTube link."));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kripadham");
    cmd.args(["youtube", "https://www.youtube.com/watch?v=abc"])
        .assert()
        .success()
        .stdout("https://www.youtube.com/embed/abc\n");
}
