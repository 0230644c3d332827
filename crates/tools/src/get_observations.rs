//! `get_observations`: dated values for identifiers found by a search.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use statsagent_core::data::{DataService, DateFilter, ObservationRequest, ObservationSeries};
use statsagent_core::error::ToolError;
use statsagent_core::tool::{Tool, ToolResult};
use std::sync::Arc;

pub struct GetObservationsTool {
    service: Arc<dyn DataService>,
}

impl GetObservationsTool {
    pub fn new(service: Arc<dyn DataService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    variable_dcid: String,
    place_dcid: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    child_place_type: Option<String>,
}

/// Render a series with the same identifier names the tools accept.
pub(crate) fn series_json(series: &ObservationSeries) -> serde_json::Value {
    json!({
        "variable_dcid": series.variable_id,
        "place_dcid": series.place_id,
        "observations": series.observations,
        "source": series.source,
    })
}

#[async_trait]
impl Tool for GetObservationsTool {
    fn name(&self) -> &str {
        "get_observations"
    }

    fn description(&self) -> &str {
        "Fetch statistical observations for a variable_dcid and place_dcid returned by \
         search_indicators. Never guess identifiers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "variable_dcid": {
                    "type": "string",
                    "description": "Variable identifier from search_indicators, e.g. 'Count_Person'"
                },
                "place_dcid": {
                    "type": "string",
                    "description": "Place identifier from search_indicators, e.g. 'country/IND'"
                },
                "date": {
                    "type": "string",
                    "description": "'latest' (default), 'all', 'range', or a date as YYYY, YYYY-MM or YYYY-MM-DD"
                },
                "child_place_type": {
                    "type": "string",
                    "description": "Fetch for all child places of this type instead, e.g. 'State'"
                }
            },
            "required": ["variable_dcid", "place_dcid"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let date: DateFilter = args.date.as_deref().unwrap_or("latest").parse()?;
        let mut request = ObservationRequest::new(args.variable_dcid, args.place_dcid, date);
        request.child_place_type = args.child_place_type;

        let series = self.service.observe(&request).await?;
        Ok(ToolResult::json(series_json(&series)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statsagent_core::error::ToolErrorKind;
    use statsagent_datacommons::InMemoryDataService;

    fn tool() -> GetObservationsTool {
        GetObservationsTool::new(Arc::new(InMemoryDataService::sample()))
    }

    #[tokio::test]
    async fn latest_value_by_default() {
        let result = tool()
            .execute(json!({"variable_dcid": "Count_Person", "place_dcid": "country/IND"}))
            .await
            .unwrap();

        let observations = result.data["observations"].as_array().unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0]["date"], "2023");
        assert_eq!(result.data["place_dcid"], "country/IND");
    }

    #[tokio::test]
    async fn explicit_year() {
        let result = tool()
            .execute(json!({
                "variable_dcid": "Amount_EconomicActivity_GrossDomesticProduction_Nominal",
                "place_dcid": "country/USA",
                "date": "2022"
            }))
            .await
            .unwrap();
        assert_eq!(result.data["observations"][0]["value"], 25_744_100_000_000.0);
    }

    #[tokio::test]
    async fn malformed_date_is_invalid_argument() {
        let err = tool()
            .execute(json!({"variable_dcid": "Count_Person", "place_dcid": "country/IND", "date": "last year"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn unresolved_identifier_is_not_found() {
        let err = tool()
            .execute(json!({"variable_dcid": "Count_Person", "place_dcid": "country/ATL"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::NotFound);
    }
}
