//! `fetch_statistical_data`: search then observe in one call.
//!
//! A shortcut for simple questions: the first search hit is observed and
//! returned together with the full search result. When the search has no
//! hit, the error tells the model to fall back to the two-step tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use statsagent_core::data::{DataService, DateFilter, ObservationRequest, SearchRequest};
use statsagent_core::error::{DataServiceError, ToolError};
use statsagent_core::tool::{Tool, ToolResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::get_observations::series_json;
use crate::search_indicators::indicators_json;

pub struct FetchStatisticalDataTool {
    service: Arc<dyn DataService>,
}

impl FetchStatisticalDataTool {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    places: Option<BTreeSet<String>>,
    #[serde(default)]
    date: Option<String>,
}

#[async_trait]
impl Tool for FetchStatisticalDataTool {
    fn name(&self) -> &str {
        "fetch_statistical_data"
    }

    fn description(&self) -> &str {
        "Search for an indicator and fetch observations for the first match in a single call. \
         Prefer search_indicators + get_observations for comparisons across places."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for, e.g. 'population', 'GDP', 'unemployment rate'"
                },
                "places": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Place names, e.g. ['India', 'United States']"
                },
                "date": {
                    "type": "string",
                    "description": "'latest' (default), 'all', 'range', or a date as YYYY, YYYY-MM or YYYY-MM-DD"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let date: DateFilter = args.date.as_deref().unwrap_or("latest").parse()?;

        let mut search = SearchRequest::new(args.query);
        search.places = args.places.unwrap_or_default();
        search.include_topics = false;
        let matches = self.service.search(&search).await?;

        let first = matches.first().ok_or_else(|| {
            DataServiceError::NotFound(format!(
                "no indicator matched '{}'; use search_indicators and get_observations instead",
                search.query
            ))
        })?;
        debug!(variable = %first.variable_id, place = %first.place_id, hits = matches.len(), "Fetching first match");

        let request = ObservationRequest::new(first.variable_id.clone(), first.place_id.clone(), date);
        let series = self.service.observe(&request).await?;

        Ok(ToolResult::json(json!({
            "search_result": { "indicators": indicators_json(&matches) },
            "variable_dcid": first.variable_id,
            "place_dcid": first.place_id,
            "observations": series_json(&series),
        })))
    }
}
