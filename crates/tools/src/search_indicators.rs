//! `search_indicators`: resolve free text to (variable, place) identifiers.
//!
//! This is always the first step of the workflow; its identifiers are the
//! only ones `get_observations` should be called with.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use statsagent_core::data::{DataService, IndicatorMatch, SearchRequest};
use statsagent_core::error::ToolError;
use statsagent_core::tool::{Tool, ToolResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct SearchIndicatorsTool {
    service: Arc<dyn DataService>,
}

impl SearchIndicatorsTool {
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
    include_topics: Option<bool>,
}

/// Render hits with the identifier names `get_observations` accepts.
pub(crate) fn indicators_json(matches: &[IndicatorMatch]) -> serde_json::Value {
    matches
        .iter()
        .map(|m| {
            json!({
                "variable_dcid": m.variable_id,
                "place_dcid": m.place_id,
                "name": m.name,
            })
        })
        .collect()
}

#[async_trait]
impl Tool for SearchIndicatorsTool {
    fn name(&self) -> &str {
        "search_indicators"
    }

    fn description(&self) -> &str {
        "Search for statistical indicators (variables) by topic or keyword, optionally scoped to \
         place names. Returns variable_dcid and place_dcid identifiers to pass to get_observations."
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
                    "description": "Place names to search in, e.g. ['India', 'United States']"
                },
                "include_topics": {
                    "type": "boolean",
                    "description": "Also return topic categories (default: true)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let mut request = SearchRequest::new(args.query);
        request.places = args.places.unwrap_or_default();
        request.include_topics = args.include_topics.unwrap_or(true);

        let matches = self.service.search(&request).await?;
        debug!(query = %request.query, hits = matches.len(), "Indicator search finished");

        Ok(ToolResult::json(json!({ "indicators": indicators_json(&matches) })))
    }
}
