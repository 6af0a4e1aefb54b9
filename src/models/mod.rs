//! Core data models for the conference paper database.
//!
//! This module contains the fixed set of tracked venues, their prestige
//! ordering, and the paper record persisted by the storage layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A security venue tracked by the crawler.
///
/// The declaration order is the hand-curated prestige ordering used as the
/// ranking tie-breaker (index 0 is the most prestigious).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Conference {
    #[serde(rename = "NDSS")]
    Ndss,
    #[serde(rename = "IEEE S&P")]
    IeeeSp,
    #[serde(rename = "USENIX")]
    Usenix,
    #[serde(rename = "CCS")]
    Ccs,
    #[serde(rename = "IEEE EuroS&P")]
    IeeeEuroSp,
    #[serde(rename = "RAID")]
    Raid,
    #[serde(rename = "ESORICS")]
    Esorics,
    #[serde(rename = "ACSAC")]
    Acsac,
    #[serde(rename = "AsiaCCS")]
    AsiaCcs,
    #[serde(rename = "PETS")]
    Pets,
}

impl Conference {
    /// Every venue, in prestige order.
    pub const ALL: [Conference; 10] = [
        Conference::Ndss,
        Conference::IeeeSp,
        Conference::Usenix,
        Conference::Ccs,
        Conference::IeeeEuroSp,
        Conference::Raid,
        Conference::Esorics,
        Conference::Acsac,
        Conference::AsiaCcs,
        Conference::Pets,
    ];

    /// Name as stored in the database and shown to users.
    pub fn name(&self) -> &'static str {
        match self {
            Conference::Ndss => "NDSS",
            Conference::IeeeSp => "IEEE S&P",
            Conference::Usenix => "USENIX",
            Conference::Ccs => "CCS",
            Conference::IeeeEuroSp => "IEEE EuroS&P",
            Conference::Raid => "RAID",
            Conference::Esorics => "ESORICS",
            Conference::Acsac => "ACSAC",
            Conference::AsiaCcs => "AsiaCCS",
            Conference::Pets => "PETS",
        }
    }

    /// Zero-based position in the prestige ordering.
    pub fn prestige_index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or(Self::ALL.len() - 1)
    }

    /// Ranking weight in `0..ALL.len()`, higher for more prestigious venues.
    ///
    /// Used as `year + venue_rank / 10` so that venue only breaks ties within
    /// the same year.
    pub fn venue_rank(&self) -> usize {
        Self::ALL.len() - 1 - self.prestige_index()
    }
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Error returned when a string does not name a tracked venue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown conference: {0}")]
pub struct UnknownConference(pub String);

impl FromStr for Conference {
    type Err = UnknownConference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let conference = match key.as_str() {
            "ndss" => Conference::Ndss,
            "ieee s&p" | "s&p" | "sp" | "oakland" => Conference::IeeeSp,
            "usenix" | "uss" | "usenix security" => Conference::Usenix,
            "ccs" => Conference::Ccs,
            "ieee euros&p" | "euros&p" | "eurosp" => Conference::IeeeEuroSp,
            "raid" => Conference::Raid,
            "esorics" => Conference::Esorics,
            "acsac" => Conference::Acsac,
            "asiaccs" => Conference::AsiaCcs,
            "pets" | "popets" => Conference::Pets,
            _ => return Err(UnknownConference(s.to_string())),
        };
        Ok(conference)
    }
}

/// A stored paper record.
///
/// `(conference, year, title)` is the logical key. An empty `abstract_text`
/// means the abstract has not been fetched yet; an empty `url` means the
/// publisher link is unknown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Database primary key (None until inserted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    pub conference: Conference,

    pub year: i32,

    pub title: String,

    /// Authors in listing order
    pub authors: Vec<String>,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    pub url: String,
}

impl Paper {
    /// Create a record that has not been stored yet.
    pub fn new(conference: Conference, year: i32, title: String, authors: Vec<String>) -> Self {
        Self {
            id: None,
            conference,
            year,
            title,
            authors,
            abstract_text: String::new(),
            url: String::new(),
        }
    }

    pub fn with_abstract(mut self, abstract_text: String) -> Self {
        self.abstract_text = abstract_text;
        self
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    pub fn has_abstract(&self) -> bool {
        !self.abstract_text.is_empty()
    }

    /// Composite recency/prestige key; larger sorts first.
    pub fn ranking_key(&self) -> f64 {
        self.year as f64 + self.conference.venue_rank() as f64 / 10.0
    }
}

impl fmt::Display for Paper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:8} - {}", self.year, self.conference, self.title)
    }
}

/// Separator used when authors are flattened into a single column.
pub const AUTHOR_SEPARATOR: &str = ", ";

/// Join an author list for storage.
pub fn join_authors(authors: &[String]) -> String {
    authors.join(AUTHOR_SEPARATOR)
}

/// Split a stored author column back into an ordered list.
pub fn split_authors(authors: &str) -> Vec<String> {
    if authors.trim().is_empty() {
        return Vec::new();
    }
    authors
        .split(AUTHOR_SEPARATOR)
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}
