//! Devotee and Ekadashi kirtan registries.

use serde::{Deserialize, Serialize};

use crate::formats::{DevoteeRecord, KirtanRecord};
use crate::search::{SortDirection, cmp_ci, contains_ci};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DevoteeField {
    LegalName,
    InitiatedName,
    InitiationDate,
    PhoneNumber,
    Address,
    City,
    State,
    Pincode,
    NearbyCentre,
    CreatedAt,
}

impl DevoteeField {
    pub fn value(self, record: &DevoteeRecord) -> &str {
        match self {
            Self::LegalName => &record.legal_name,
            Self::InitiatedName => &record.initiated_name,
            Self::InitiationDate => &record.initiation_date,
            Self::PhoneNumber => &record.phone_number,
            Self::Address => &record.address,
            Self::City => &record.city,
            Self::State => &record.state,
            Self::Pincode => &record.pincode,
            Self::NearbyCentre => &record.nearby_centre,
            Self::CreatedAt => &record.created_at,
        }
    }
}

/// Column sort state; clicking the active column flips its direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevoteeSort {
    pub field: Option<DevoteeField>,
    pub direction: SortDirection,
}

impl DevoteeSort {
    pub fn toggle(self, field: DevoteeField) -> Self {
        if self.field == Some(field) {
            Self {
                field: Some(field),
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                field: Some(field),
                direction: SortDirection::Asc,
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevoteeQuery {
    pub initiated_name: String,
    pub city: String,
    pub state: String,
    #[serde(flatten)]
    pub sort: DevoteeSort,
}

/// Rows matching every non-empty filter, in sort order (input order when
/// unsorted).
pub fn query_devotees<'a>(records: &'a [DevoteeRecord], query: &DevoteeQuery) -> Vec<&'a DevoteeRecord> {
    let mut rows = records
        .iter()
        .filter(|r| contains_ci(&r.initiated_name, &query.initiated_name))
        .filter(|r| contains_ci(&r.city, &query.city))
        .filter(|r| contains_ci(&r.state, &query.state))
        .collect::<Vec<_>>();

    if let Some(field) = query.sort.field {
        rows.sort_by(|a, b| query.sort.direction.apply(cmp_ci(field.value(a), field.value(b))));
    }
    rows
}

/// Orders kirtan hosts by state, then city, ignoring case.
pub fn sort_kirtans(records: &mut [KirtanRecord]) {
    records.sort_by(|a, b| cmp_ci(&a.state, &b.state).then_with(|| cmp_ci(&a.city, &b.city)));
}

pub fn search_kirtans<'a>(records: &'a [KirtanRecord], query: &str) -> Vec<&'a KirtanRecord> {
    records
        .iter()
        .filter(|r| {
            contains_ci(&r.name, query) || contains_ci(&r.city, query) || contains_ci(&r.state, query)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateGroup<'a> {
    pub state: String,
    pub records: Vec<&'a KirtanRecord>,
}

/// Groups by state in first-seen order; blank states go under "Unknown".
pub fn group_by_state<'a>(records: &[&'a KirtanRecord]) -> Vec<StateGroup<'a>> {
    let mut groups: Vec<StateGroup<'a>> = Vec::new();
    for &record in records {
        let state = if record.state.is_empty() {
            "Unknown"
        } else {
            record.state.as_str()
        };
        match groups.iter_mut().find(|g| g.state == state) {
            Some(group) => group.records.push(record),
            None => groups.push(StateGroup {
                state: state.to_owned(),
                records: vec![record],
            }),
        }
    }
    groups
}

const KIRTAN_CSV_HEADER: [&str; 7] = [
    "Name",
    "Address",
    "Phone Number",
    "City",
    "State",
    "Country",
    "Timings",
];

pub fn kirtans_to_csv(records: &[&KirtanRecord]) -> String {
    let mut lines = vec![csv_line(KIRTAN_CSV_HEADER.iter().copied())];
    for r in records {
        lines.push(csv_line(
            [
                r.name.as_str(),
                &r.address,
                &r.phone_number,
                &r.city,
                &r.state,
                &r.country,
                &r.timings,
            ]
            .into_iter(),
        ));
    }
    lines.join("\n")
}

fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}
