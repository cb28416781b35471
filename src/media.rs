//! Bhajan list and the katha video playlist.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::formats::{BhajanRecord, Katha, KathaVideo};
use crate::search::contains_ci;

const EMBED_BASE: &str = "https://www.youtube.com/embed/";

/// Embed URL for a `watch?v=<id>` link; the id runs up to the next `&`.
pub fn youtube_embed_url(link: &str) -> String {
    let id = link
        .split_once("v=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or_default())
        .unwrap_or_default();
    format!("{EMBED_BASE}{id}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BhajanQuery {
    pub search: String,
    pub category: String,
}

pub fn filter_bhajans<'a>(records: &'a [BhajanRecord], query: &BhajanQuery) -> Vec<&'a BhajanRecord> {
    records
        .iter()
        .filter(|r| contains_ci(&r.title, &query.search) || contains_ci(&r.youtube_text, &query.search))
        .filter(|r| query.category.is_empty() || r.category == query.category)
        .collect()
}

pub fn bhajan_categories(records: &[BhajanRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.category.is_empty())
        .map(|r| r.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Groups by category with sorted keys; blank categories go under
/// "Uncategorized".
pub fn group_by_category<'a>(
    records: &[&'a BhajanRecord],
) -> BTreeMap<String, Vec<&'a BhajanRecord>> {
    let mut groups: BTreeMap<String, Vec<&'a BhajanRecord>> = BTreeMap::new();
    for &record in records {
        let category = if record.category.is_empty() {
            "Uncategorized".to_owned()
        } else {
            record.category.clone()
        };
        groups.entry(category).or_default().push(record);
    }
    groups
}

/// Kathas and their videos as returned by the playlist endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KathaLibrary {
    pub kathas: Vec<Katha>,
    pub videos: Vec<KathaVideo>,
}

impl KathaLibrary {
    pub fn new(kathas: Vec<Katha>, videos: Vec<KathaVideo>) -> Self {
        Self { kathas, videos }
    }

    pub fn katha(&self, katha_id: &str) -> Option<&Katha> {
        self.kathas.iter().find(|k| k.id == katha_id)
    }

    pub fn videos_for(&self, katha_id: &str) -> impl Iterator<Item = &KathaVideo> {
        self.videos.iter().filter(move |v| v.katha_id == katha_id)
    }

    /// Video auto-selected when a katha is opened.
    pub fn first_video(&self, katha_id: &str) -> Option<&KathaVideo> {
        self.videos_for(katha_id).next()
    }

    pub fn search_videos(&self, katha_id: &str, search: &str) -> Vec<&KathaVideo> {
        self.videos_for(katha_id)
            .filter(|v| contains_ci(&v.title, search))
            .collect()
    }

    /// The selection a viewer lands on after choosing `katha_id`.
    pub fn select(&self, katha_id: &str, search: &str) -> Option<KathaSelection<'_>> {
        let katha = self.katha(katha_id)?;
        Some(KathaSelection {
            katha,
            current: self.first_video(katha_id),
            videos: self.search_videos(katha_id, search),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KathaSelection<'a> {
    pub katha: &'a Katha,
    pub current: Option<&'a KathaVideo>,
    pub videos: Vec<&'a KathaVideo>,
}
