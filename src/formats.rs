//! Normalized entity schemas for the spreadsheet endpoints.
//!
//! The sheet web-apps return loosely-typed rows whose column names vary
//! between sheets (`Pincode` vs `Pincode `) and whose cells may be numbers
//! where text is expected. Every entity is built from a [`Row`] at the
//! boundary so the rest of the crate only sees typed, defaulted fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single loosely-typed spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// First non-empty cell among `keys`, rendered as text.
    pub fn text(&self, keys: &[&str]) -> String {
        keys.iter()
            .filter_map(|key| self.0.get(*key).and_then(cell_text))
            .find(|text| !text.is_empty())
            .unwrap_or_default()
    }

    pub fn number(&self, keys: &[&str]) -> f64 {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(|value| match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(cell_text)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(other) => cell_text(other)
                .filter(|s| !s.is_empty())
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn object(&self, key: &str) -> Option<Row> {
        self.0.get(key).cloned().and_then(Row::from_value)
    }

    pub fn rows(&self, key: &str) -> Vec<Row> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().cloned().filter_map(Row::from_value).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Rows of a list endpoint: either `{ "data": [...] }` or a bare array.
pub fn rows_from_response(value: Value) -> Vec<Row> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                tracing::warn!("list response has no `data` array; treating as empty");
                Vec::new()
            }
        },
        _ => {
            tracing::warn!("list response is neither an object nor an array; treating as empty");
            Vec::new()
        }
    };
    items.into_iter().filter_map(Row::from_value).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub cover_image_url: String,
    pub category: String,
}

impl Book {
    pub fn from_row(row: &Row) -> Self {
        Self {
            book_id: row.text(&["BookID"]),
            title: row.text(&["Title"]),
            cover_image_url: row.text(&["CoverImageUrl"]),
            category: row.text(&["Category"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub page_id: String,
    pub page_title: String,
}

impl IndexEntry {
    pub fn from_row(row: &Row) -> Self {
        Self {
            page_id: row.text(&["PageID"]),
            page_title: row.text(&["PageTitle"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBody {
    pub page_id: String,
    pub page_title: String,
    pub page_text: String,
}

impl PageBody {
    pub fn from_row(row: &Row) -> Self {
        Self {
            page_id: row.text(&["PageID"]),
            page_title: row.text(&["PageTitle"]),
            page_text: row.text(&["PageText"]),
        }
    }

    /// Body derived from index metadata when the sheet has no text for it.
    pub fn from_index(entry: &IndexEntry) -> Self {
        Self {
            page_id: entry.page_id.clone(),
            page_title: entry.page_title.clone(),
            page_text: String::new(),
        }
    }
}

/// One book's page index and page bodies, as staged into the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPayload {
    pub book_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub index: Vec<IndexEntry>,
    #[serde(default)]
    pub pages: Vec<PageBody>,
}

impl BookPayload {
    pub fn from_response(book_id: &str, value: Value) -> anyhow::Result<Self> {
        let row = Row::from_value(value)
            .ok_or_else(|| anyhow::anyhow!("book data response must be a JSON object"))?;
        if !row.has("index") && !row.has("pages") {
            tracing::warn!(book_id, "book data response has neither `index` nor `pages`");
        }

        let title = row
            .object("book")
            .map(|book| book.text(&["Title"]).trim().to_owned())
            .filter(|title| !title.is_empty());

        Ok(Self {
            book_id: book_id.to_owned(),
            title,
            index: row.rows("index").iter().map(IndexEntry::from_row).collect(),
            pages: row.rows("pages").iter().map(PageBody::from_row).collect(),
        })
    }

    pub fn page(&self, page_id: &str) -> Option<&PageBody> {
        self.pages.iter().find(|page| page.page_id == page_id)
    }

    pub fn index_entry(&self, page_id: &str) -> Option<&IndexEntry> {
        self.index.iter().find(|entry| entry.page_id == page_id)
    }

    /// Replaces the body with the same page id, or appends it.
    pub fn upsert_page(&mut self, body: PageBody) {
        match self.pages.iter_mut().find(|page| page.page_id == body.page_id) {
            Some(existing) => *existing = body,
            None => self.pages.push(body),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevoteeRecord {
    pub legal_name: String,
    pub initiated_name: String,
    pub initiation_date: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub nearby_centre: String,
    pub created_at: String,
}

impl DevoteeRecord {
    pub fn from_row(row: &Row) -> Self {
        Self {
            legal_name: row.text(&["Legal Name"]),
            initiated_name: row.text(&["Initiated Name"]),
            initiation_date: row.text(&["Initiation Date"]),
            phone_number: row.text(&["PhoneNumber"]),
            address: row.text(&["Address"]),
            city: row.text(&["City"]),
            state: row.text(&["State"]),
            pincode: row.text(&["Pincode", "Pincode "]),
            nearby_centre: row.text(&["Nearby Centre"]),
            created_at: row.text(&["Created At"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KirtanRecord {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub timings: String,
}

impl KirtanRecord {
    pub fn from_row(row: &Row) -> Self {
        Self {
            name: row.text(&["Name"]),
            address: row.text(&["Address"]),
            phone_number: row.text(&["PhoneNumber"]),
            city: row.text(&["City"]),
            state: row.text(&["State"]),
            country: row.text(&["Country"]),
            timings: row.text(&["Timings"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BhajanRecord {
    pub serial: String,
    pub title: String,
    pub youtube_link: String,
    pub youtube_text: String,
    pub category: String,
}

impl BhajanRecord {
    pub fn from_row(row: &Row) -> Self {
        Self {
            serial: row.text(&["SNo"]),
            title: row.text(&["title"]),
            youtube_link: row.text(&["bhajan_youtube_link"]),
            youtube_text: row.text(&["bhajan_youtube_text"]),
            category: row.text(&["category"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Katha {
    pub id: String,
    pub name: String,
    pub date: String,
    pub venue: String,
    pub image_url: String,
}

impl Katha {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.text(&["id"]),
            name: row.text(&["katha_name"]),
            date: row.text(&["date"]),
            venue: row.text(&["venue"]),
            image_url: row.text(&["image_url"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KathaVideo {
    pub katha_id: String,
    pub title: String,
    pub youtube_link: String,
    pub description: String,
}

impl KathaVideo {
    pub fn from_row(row: &Row) -> Self {
        Self {
            katha_id: row.text(&["katha_id"]),
            title: row.text(&["title"]),
            youtube_link: row.text(&["youtube_link"]),
            description: row.text(&["description"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreBook {
    pub id: String,
    pub title: String,
    pub author: String,
    pub price: f64,
    pub delivery_charges: f64,
    pub quantity: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl StoreBook {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.text(&["id"]),
            title: row.text(&["title"]),
            author: row.text(&["author"]),
            price: row.number(&["price"]),
            delivery_charges: row.number(&["deliveryCharges"]),
            quantity: row.number(&["quantity"]).max(0.0) as u32,
            images: row.strings("images"),
        }
    }
}
