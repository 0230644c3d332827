//! Statistical data domain: the DataService trait and its value types.
//!
//! An indicator is a statistical variable (e.g. `Count_Person`); a place is
//! a geographic entity (e.g. `country/IND`). `search` resolves free text to
//! (variable, place) pairs; `observe` fetches dated values for one pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::DataServiceError;

/// Free-text indicator search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    /// Place names to scope the search (e.g. "India", "United States")
    #[serde(default)]
    pub places: BTreeSet<String>,

    /// Whether topic categories may be returned alongside variables
    #[serde(default = "default_true")]
    pub include_topics: bool,
}

fn default_true() -> bool {
    true
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            places: BTreeSet::new(),
            include_topics: true,
        }
    }

    pub fn with_places<I, S>(mut self, places: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.places.extend(places.into_iter().map(Into::into));
        self
    }

    /// Reject blank queries and blank place hints without a network call.
    pub fn validate(&self) -> Result<(), DataServiceError> {
        if self.query.trim().is_empty() {
            return Err(DataServiceError::InvalidArgument("query must not be empty".into()));
        }
        if self.places.iter().any(|p| p.trim().is_empty()) {
            return Err(DataServiceError::InvalidArgument("place names must not be empty".into()));
        }
        Ok(())
    }
}

/// One search hit: an indicator resolved for a place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorMatch {
    pub variable_id: String,
    pub place_id: String,
    /// Display name of the variable
    pub name: String,
}

/// Which observations to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateFilter {
    #[default]
    Latest,
    All,
    Range,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    Exact(String),
}

impl DateFilter {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Latest => "latest",
            Self::All => "all",
            Self::Range => "range",
            Self::Exact(d) => d,
        }
    }
}

impl std::fmt::Display for DateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateFilter {
    type Err = DataServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "latest" => return Ok(Self::Latest),
            "all" => return Ok(Self::All),
            "range" => return Ok(Self::Range),
            _ => {}
        }
        let s = s.trim();
        if is_partial_date(s) {
            Ok(Self::Exact(s.to_string()))
        } else {
            Err(DataServiceError::InvalidArgument(format!(
                "date must be 'latest', 'all', 'range', YYYY, YYYY-MM or YYYY-MM-DD, got '{s}'"
            )))
        }
    }
}

impl Serialize for DateFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DateFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn is_partial_date(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    let widths: &[usize] = match parts.len() {
        1 => &[4],
        2 => &[4, 2],
        3 => &[4, 2, 2],
        _ => return false,
    };
    parts
        .iter()
        .zip(widths)
        .all(|(p, w)| p.len() == *w && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Observations for one (variable, place) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRequest {
    pub variable_id: String,
    pub place_id: String,
    #[serde(default)]
    pub date: DateFilter,
    /// Fetch for all children of this type instead (e.g. "State")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_place_type: Option<String>,
}

impl ObservationRequest {
    pub fn new(variable_id: impl Into<String>, place_id: impl Into<String>, date: DateFilter) -> Self {
        Self {
            variable_id: variable_id.into(),
            place_id: place_id.into(),
            date,
            child_place_type: None,
        }
    }

    pub fn validate(&self) -> Result<(), DataServiceError> {
        if self.variable_id.trim().is_empty() {
            return Err(DataServiceError::InvalidArgument("variable identifier must not be empty".into()));
        }
        if self.place_id.trim().is_empty() {
            return Err(DataServiceError::InvalidArgument("place identifier must not be empty".into()));
        }
        if let Some(t) = &self.child_place_type {
            if t.trim().is_empty() {
                return Err(DataServiceError::InvalidArgument("child_place_type must not be empty".into()));
            }
        }
        Ok(())
    }
}

/// A single dated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: String,
    pub value: f64,
}

/// Values for one (variable, place), ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSeries {
    pub variable_id: String,
    pub place_id: String,
    pub observations: Vec<Observation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ObservationSeries {
    /// Sort observations by date; ISO dates sort lexicographically.
    pub fn sorted(mut self) -> Self {
        self.observations.sort_by(|a, b| a.date.cmp(&b.date));
        self
    }

    /// The most recent observation.
    pub fn latest(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

/// The statistical data service.
///
/// Implementations must be safe to share between concurrent queries.
#[async_trait]
pub trait DataService: Send + Sync {
    /// A human-readable name (e.g. "datacommons-mcp").
    fn name(&self) -> &str;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<IndicatorMatch>, DataServiceError>;

    async fn observe(&self, request: &ObservationRequest) -> Result<ObservationSeries, DataServiceError>;

    /// Can we reach the service?
    async fn health_check(&self) -> Result<bool, DataServiceError> {
        Ok(true)
    }
}
