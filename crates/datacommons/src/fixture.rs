//! An in-memory [`DataService`] with a small built-in dataset.
//!
//! Backs `--offline` runs and tests. Search matches query keywords against
//! indicator names; places are matched by name, alias or identifier.

use async_trait::async_trait;
use statsagent_core::data::{
    DataService, DateFilter, IndicatorMatch, Observation, ObservationRequest, ObservationSeries, SearchRequest,
};
use statsagent_core::error::DataServiceError;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct Indicator {
    variable_id: String,
    name: String,
    keywords: Vec<String>,
}

#[derive(Debug, Clone)]
struct Place {
    place_id: String,
    names: Vec<String>,
}

#[derive(Debug, Clone)]
struct Series {
    variable_id: String,
    place_id: String,
    observations: Vec<Observation>,
    source: Option<String>,
}

/// A call made against the fixture, for assertions in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DataCall {
    Search(SearchRequest),
    Observe(ObservationRequest),
}

#[derive(Debug, Default)]
pub struct InMemoryDataService {
    indicators: Vec<Indicator>,
    places: Vec<Place>,
    series: Vec<Series>,
    calls: Mutex<Vec<DataCall>>,
}

impl InMemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an indicator with the keywords that should find it.
    pub fn with_indicator(mut self, variable_id: &str, name: &str, keywords: &[&str]) -> Self {
        self.indicators.push(Indicator {
            variable_id: variable_id.into(),
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        });
        self
    }

    /// Register a place; the first name is its display name.
    pub fn with_place(mut self, place_id: &str, names: &[&str]) -> Self {
        self.places.push(Place {
            place_id: place_id.into(),
            names: names.iter().map(|n| n.to_lowercase()).collect(),
        });
        self
    }

    pub fn with_series(mut self, variable_id: &str, place_id: &str, points: &[(&str, f64)]) -> Self {
        self.series.push(Series {
            variable_id: variable_id.into(),
            place_id: place_id.into(),
            observations: points
                .iter()
                .map(|(date, value)| Observation {
                    date: (*date).into(),
                    value: *value,
                })
                .collect(),
            source: Some("statsagent offline sample".into()),
        });
        self
    }

    /// A handful of well-known indicators for a few countries and states.
    pub fn sample() -> Self {
        Self::new()
            .with_indicator("Count_Person", "Total Population", &["population", "people", "inhabitants"])
            .with_indicator(
                "Amount_EconomicActivity_GrossDomesticProduction_Nominal",
                "Nominal GDP",
                &["gdp", "gross domestic product", "economy", "economic output"],
            )
            .with_indicator("UnemploymentRate_Person", "Unemployment Rate", &["unemployment", "jobless"])
            .with_indicator("LifeExpectancy_Person", "Life Expectancy", &["life expectancy", "health", "lifespan"])
            .with_place("country/IND", &["India"])
            .with_place("country/USA", &["United States", "USA", "US", "United States of America", "America"])
            .with_place("country/CHN", &["China"])
            .with_place("country/DEU", &["Germany"])
            .with_place("country/JPN", &["Japan"])
            .with_place("country/KEN", &["Kenya"])
            .with_place("geoId/06", &["California"])
            .with_place("geoId/48", &["Texas"])
            .with_series(
                "Count_Person",
                "country/IND",
                &[("2020", 1_396_387_127.0), ("2021", 1_407_563_842.0), ("2022", 1_417_173_173.0), ("2023", 1_428_627_663.0)],
            )
            .with_series(
                "Count_Person",
                "country/USA",
                &[("2021", 331_893_745.0), ("2022", 333_287_557.0), ("2023", 334_914_895.0)],
            )
            .with_series(
                "Count_Person",
                "country/CHN",
                &[("2021", 1_412_360_000.0), ("2022", 1_412_175_000.0), ("2023", 1_410_710_000.0)],
            )
            .with_series("Count_Person", "geoId/06", &[("2022", 39_029_342.0), ("2023", 38_965_193.0)])
            .with_series("Count_Person", "geoId/48", &[("2022", 30_029_572.0), ("2023", 30_503_301.0)])
            .with_series(
                "Amount_EconomicActivity_GrossDomesticProduction_Nominal",
                "country/USA",
                &[("2022", 25_744_100_000_000.0), ("2023", 27_360_935_000_000.0)],
            )
            .with_series(
                "Amount_EconomicActivity_GrossDomesticProduction_Nominal",
                "country/CHN",
                &[("2022", 17_881_782_683_707.0), ("2023", 17_794_782_039_552.0)],
            )
            .with_series(
                "Amount_EconomicActivity_GrossDomesticProduction_Nominal",
                "country/IND",
                &[("2023", 3_549_918_918_778.0)],
            )
            .with_series("UnemploymentRate_Person", "country/DEU", &[("2022", 3.1), ("2023", 3.0)])
            .with_series("UnemploymentRate_Person", "country/USA", &[("2022", 3.6), ("2023", 3.6)])
            .with_series("LifeExpectancy_Person", "country/JPN", &[("2021", 84.4), ("2022", 84.0)])
            .with_series("LifeExpectancy_Person", "country/KEN", &[("2021", 61.4), ("2022", 62.1)])
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<DataCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: DataCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn resolve_place(&self, hint: &str) -> Option<&Place> {
        let hint = hint.trim().to_lowercase();
        self.places
            .iter()
            .find(|p| p.place_id.to_lowercase() == hint || p.names.iter().any(|n| *n == hint))
    }

    fn matches_query(indicator: &Indicator, query: &str) -> bool {
        let name = indicator.name.to_lowercase();
        query.contains(&name)
            || name.contains(query)
            || indicator.keywords.iter().any(|k| query.contains(k.as_str()))
    }
}

#[async_trait]
impl DataService for InMemoryDataService {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<IndicatorMatch>, DataServiceError> {
        request.validate()?;
        self.record(DataCall::Search(request.clone()));

        let query = request.query.to_lowercase();

        // Without place hints, any place holding data for the indicator counts.
        let scoped: Option<Vec<&str>> = if request.places.is_empty() {
            None
        } else {
            Some(
                request
                    .places
                    .iter()
                    .filter_map(|p| self.resolve_place(p))
                    .map(|p| p.place_id.as_str())
                    .collect(),
            )
        };

        let mut matches = Vec::new();
        for indicator in self.indicators.iter().filter(|i| Self::matches_query(i, &query)) {
            for series in self.series.iter().filter(|s| s.variable_id == indicator.variable_id) {
                let in_scope = scoped
                    .as_ref()
                    .is_none_or(|places| places.contains(&series.place_id.as_str()));
                if in_scope {
                    matches.push(IndicatorMatch {
                        variable_id: indicator.variable_id.clone(),
                        place_id: series.place_id.clone(),
                        name: indicator.name.clone(),
                    });
                }
            }
        }

        debug!(query = %request.query, hits = matches.len(), "In-memory search");
        Ok(matches)
    }

    async fn observe(&self, request: &ObservationRequest) -> Result<ObservationSeries, DataServiceError> {
        request.validate()?;
        self.record(DataCall::Observe(request.clone()));

        let series = self
            .series
            .iter()
            .find(|s| s.variable_id == request.variable_id && s.place_id == request.place_id)
            .ok_or_else(|| {
                DataServiceError::NotFound(format!(
                    "no data for variable '{}' at place '{}'",
                    request.variable_id, request.place_id
                ))
            })?;

        let mut observations = series.observations.clone();
        observations.sort_by(|a, b| a.date.cmp(&b.date));

        let observations = match &request.date {
            DateFilter::Latest => observations.pop().into_iter().collect(),
            DateFilter::All | DateFilter::Range => observations,
            DateFilter::Exact(date) => observations
                .into_iter()
                .filter(|o| o.date.starts_with(date.as_str()))
                .collect::<Vec<_>>(),
        };

        if observations.is_empty() {
            return Err(DataServiceError::NotFound(format!(
                "no observations for variable '{}' at place '{}' for date {}",
                request.variable_id, request.place_id, request.date
            )));
        }

        Ok(ObservationSeries {
            variable_id: series.variable_id.clone(),
            place_id: series.place_id.clone(),
            observations,
            source: series.source.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_scopes_by_place_name() {
        let service = InMemoryDataService::sample();
        let hits = service
            .search(&SearchRequest::new("population").with_places(["India"]))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].variable_id, "Count_Person");
        assert_eq!(hits[0].place_id, "country/IND");
    }

    #[tokio::test]
    async fn search_without_places_returns_all_places() {
        let service = InMemoryDataService::sample();
        let hits = service.search(&SearchRequest::new("GDP")).await.unwrap();
        let places: Vec<&str> = hits.iter().map(|h| h.place_id.as_str()).collect();
        assert!(places.contains(&"country/USA"));
        assert!(places.contains(&"country/CHN"));
    }

    #[tokio::test]
    async fn search_with_unknown_place_is_empty() {
        let service = InMemoryDataService::sample();
        let hits = service
            .search(&SearchRequest::new("population").with_places(["Atlantis"]))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn latest_returns_single_most_recent() {
        let service = InMemoryDataService::sample();
        let series = service
            .observe(&ObservationRequest::new("Count_Person", "country/IND", DateFilter::Latest))
            .await
            .unwrap();
        assert_eq!(series.observations.len(), 1);
        assert_eq!(series.observations[0].date, "2023");
    }

    #[tokio::test]
    async fn exact_and_all_filters() {
        let service = InMemoryDataService::sample();
        let exact = service
            .observe(&ObservationRequest::new("Count_Person", "country/IND", DateFilter::Exact("2021".into())))
            .await
            .unwrap();
        assert_eq!(exact.observations[0].value, 1_407_563_842.0);

        let all = service
            .observe(&ObservationRequest::new("Count_Person", "country/IND", DateFilter::All))
            .await
            .unwrap();
        assert_eq!(all.observations.len(), 4);
    }

    #[tokio::test]
    async fn unknown_pair_is_not_found() {
        let service = InMemoryDataService::sample();
        let err = service
            .observe(&ObservationRequest::new("Count_Person", "country/XYZ", DateFilter::Latest))
            .await
            .unwrap_err();
        assert!(matches!(err, DataServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let service = InMemoryDataService::sample();
        service.search(&SearchRequest::new("population")).await.unwrap();
        let _ = service
            .observe(&ObservationRequest::new("Count_Person", "country/USA", DateFilter::Latest))
            .await;
        let calls = service.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], DataCall::Search(_)));
        assert!(matches!(calls[1], DataCall::Observe(_)));
    }

    #[tokio::test]
    async fn invalid_requests_are_not_recorded() {
        let service = InMemoryDataService::sample();
        assert!(service.search(&SearchRequest::new("")).await.is_err());
        assert!(service.calls().is_empty());
    }
}
