use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use url::Url;

use crate::config::{AppConfig, Endpoints};
use crate::formats::{
    BhajanRecord, Book, BookPayload, DevoteeRecord, Katha, KathaVideo, KirtanRecord, Row,
    StoreBook, rows_from_response,
};
use crate::media::KathaLibrary;

/// Read side of the spreadsheet endpoints.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn books(&self) -> anyhow::Result<Vec<Book>>;
    async fn book_payload(&self, book_id: &str) -> anyhow::Result<BookPayload>;
    async fn devotees(&self) -> anyhow::Result<Vec<DevoteeRecord>>;
    async fn kirtans(&self) -> anyhow::Result<Vec<KirtanRecord>>;
    async fn bhajans(&self) -> anyhow::Result<Vec<BhajanRecord>>;
    async fn kathas(&self) -> anyhow::Result<KathaLibrary>;
    async fn store_books(&self) -> anyhow::Result<Vec<StoreBook>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEndpoint {
    Initiation,
    Event,
    Store,
}

/// Write side of the spreadsheet endpoints.
#[async_trait]
pub trait FormSink: Send + Sync {
    /// URL-encoded POST; succeeds on any 2xx.
    async fn post_form(
        &self,
        endpoint: FormEndpoint,
        fields: Vec<(String, String)>,
    ) -> anyhow::Result<()>;

    /// Multipart POST; returns the parsed JSON response body.
    async fn post_multipart(
        &self,
        endpoint: FormEndpoint,
        fields: Vec<(String, String)>,
    ) -> anyhow::Result<Value>;

    /// JSON POST; succeeds on any 2xx.
    async fn post_json(&self, endpoint: FormEndpoint, body: Value) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct SheetClient {
    client: reqwest::Client,
    endpoints: Endpoints,
    user_agent: String,
}

impl SheetClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http.timeout())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build sheets http client")?;
        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            user_agent: config.http.user_agent.clone(),
        })
    }

    async fn get_json(&self, url: Url) -> anyhow::Result<Value> {
        tracing::debug!(%url, "fetching sheet");
        let resp = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        resp.json::<Value>()
            .await
            .with_context(|| format!("parse json from {url}"))
    }

    async fn get_rows(&self, raw_url: &str) -> anyhow::Result<Vec<Row>> {
        let url = endpoint_url(raw_url, &[])?;
        Ok(rows_from_response(self.get_json(url).await?))
    }

    fn post_url(&self, endpoint: FormEndpoint) -> anyhow::Result<Url> {
        let raw = match endpoint {
            FormEndpoint::Initiation => &self.endpoints.devotees,
            FormEndpoint::Event => &self.endpoints.event,
            FormEndpoint::Store => &self.endpoints.store,
        };
        endpoint_url(raw, &[])
    }
}

#[async_trait]
impl SheetSource for SheetClient {
    async fn books(&self) -> anyhow::Result<Vec<Book>> {
        let url = endpoint_url(&self.endpoints.books, &[("action", "getBooks")])?;
        let value = self.get_json(url).await.context("fetch book catalog")?;
        let Some(row) = Row::from_value(value) else {
            anyhow::bail!("book catalog response must be a JSON object");
        };
        if !row.has("books") {
            tracing::warn!("book catalog response has no `books` field; treating as empty");
        }
        Ok(row.rows("books").iter().map(Book::from_row).collect())
    }

    async fn book_payload(&self, book_id: &str) -> anyhow::Result<BookPayload> {
        let url = endpoint_url(
            &self.endpoints.books,
            &[("action", "getBookData"), ("bookId", book_id)],
        )?;
        let value = self
            .get_json(url)
            .await
            .with_context(|| format!("fetch book data: {book_id}"))?;
        BookPayload::from_response(book_id, value)
    }

    async fn devotees(&self) -> anyhow::Result<Vec<DevoteeRecord>> {
        let rows = self
            .get_rows(&self.endpoints.devotees)
            .await
            .context("fetch devotee list")?;
        Ok(rows.iter().map(DevoteeRecord::from_row).collect())
    }

    async fn kirtans(&self) -> anyhow::Result<Vec<KirtanRecord>> {
        let rows = self
            .get_rows(&self.endpoints.kirtans)
            .await
            .context("fetch ekadashi kirtan list")?;
        Ok(rows.iter().map(KirtanRecord::from_row).collect())
    }

    async fn bhajans(&self) -> anyhow::Result<Vec<BhajanRecord>> {
        let rows = self
            .get_rows(&self.endpoints.bhajans)
            .await
            .context("fetch bhajan list")?;
        Ok(rows.iter().map(BhajanRecord::from_row).collect())
    }

    async fn kathas(&self) -> anyhow::Result<KathaLibrary> {
        let url = endpoint_url(&self.endpoints.kathas, &[])?;
        let value = self.get_json(url).await.context("fetch katha playlist")?;
        let row = Row::from_value(value).unwrap_or_default();
        Ok(KathaLibrary::new(
            row.rows("kathas").iter().map(Katha::from_row).collect(),
            row.rows("videos").iter().map(KathaVideo::from_row).collect(),
        ))
    }

    async fn store_books(&self) -> anyhow::Result<Vec<StoreBook>> {
        let rows = self
            .get_rows(&self.endpoints.store)
            .await
            .context("fetch book store")?;
        Ok(rows.iter().map(StoreBook::from_row).collect())
    }
}

#[async_trait]
impl FormSink for SheetClient {
    async fn post_form(
        &self,
        endpoint: FormEndpoint,
        fields: Vec<(String, String)>,
    ) -> anyhow::Result<()> {
        let url = self.post_url(endpoint)?;
        let resp = self
            .client
            .post(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .form(&fields)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("POST {url} failed ({status})");
        }
        Ok(())
    }

    async fn post_multipart(
        &self,
        endpoint: FormEndpoint,
        fields: Vec<(String, String)>,
    ) -> anyhow::Result<Value> {
        let url = self.post_url(endpoint)?;
        let form = fields
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, (key, value)| {
                form.text(key, value)
            });
        let resp = self
            .client
            .post(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        resp.json::<Value>()
            .await
            .with_context(|| format!("parse json from {url}"))
    }

    async fn post_json(&self, endpoint: FormEndpoint, body: Value) -> anyhow::Result<()> {
        let url = self.post_url(endpoint)?;
        let resp = self
            .client
            .post(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("POST {url} failed ({status})");
        }
        Ok(())
    }
}

fn endpoint_url(raw: &str, query: &[(&str, &str)]) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid endpoint url: {raw}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("endpoint url must be http/https: {url}");
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
