//! MCP wire types (JSON-RPC 2.0 over HTTP) and payload decoding.
//!
//! The server may answer a `tools/call` either with a plain JSON body or
//! with an event stream of `data: {...}` lines; both are handled here, as
//! are the few result shapes the statistical tools are known to produce.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use statsagent_core::data::{IndicatorMatch, Observation, ObservationRequest, ObservationSeries};
use statsagent_core::error::DataServiceError;
use tracing::{debug, trace};

/// JSON-RPC method for invoking a server tool.
pub const TOOLS_CALL: &str = "tools/call";
/// JSON-RPC method for listing server tools (used as a ping).
pub const TOOLS_LIST: &str = "tools/list";

const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }

    pub fn tool_call(id: u64, tool: &str, arguments: Value) -> RpcRequest<'static> {
        RpcRequest::new(
            id,
            TOOLS_CALL,
            serde_json::json!({ "name": tool, "arguments": arguments }),
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    pub code: i64,
    pub message: String,
}

/// The `result` of a `tools/call`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub structured_content: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentItem {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl CallToolResult {
    fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .filter(|c| c.kind.is_empty() || c.kind == "text")
            .find_map(|c| c.text.as_deref())
    }
}

/// Parse a response body that is either JSON or an SSE stream.
pub(crate) fn parse_rpc_body(body: &str) -> Result<RpcResponse, DataServiceError> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|e| DataServiceError::ServiceError(format!("malformed JSON-RPC response: {e}")));
    }

    for line in trimmed.lines() {
        let Some(data) = line.trim_end_matches('\r').strip_prefix("data:") else {
            continue;
        };
        match serde_json::from_str::<RpcResponse>(data.trim()) {
            Ok(frame) if frame.result.is_some() || frame.error.is_some() => return Ok(frame),
            Ok(_) => continue,
            Err(e) => {
                trace!(error = %e, "Ignoring unparseable SSE frame");
            }
        }
    }

    Err(DataServiceError::ServiceError(
        "no JSON-RPC response found in event stream".into(),
    ))
}

/// Turn a JSON-RPC response into the tool's JSON payload.
pub(crate) fn tool_payload(tool: &str, response: RpcResponse) -> Result<Value, DataServiceError> {
    if let Some(err) = response.error {
        return Err(classify_rpc_error(tool, &err));
    }

    let result = response
        .result
        .ok_or_else(|| DataServiceError::ServiceError(format!("{tool}: response has no result")))?;

    let call: CallToolResult = serde_json::from_value(result)
        .map_err(|e| DataServiceError::ServiceError(format!("{tool}: malformed tool result: {e}")))?;

    if call.is_error {
        let message = call.first_text().unwrap_or("tool reported an error").to_string();
        return Err(if looks_unresolved(&message) {
            DataServiceError::NotFound(message)
        } else {
            DataServiceError::ServiceError(format!("{tool}: {message}"))
        });
    }

    if let Some(structured) = call.structured_content {
        return Ok(structured);
    }

    let text = call
        .first_text()
        .ok_or_else(|| DataServiceError::ServiceError(format!("{tool}: empty tool result")))?;

    serde_json::from_str(text)
        .map_err(|e| DataServiceError::ServiceError(format!("{tool}: tool result is not JSON: {e}")))
}

fn classify_rpc_error(tool: &str, err: &RpcError) -> DataServiceError {
    if looks_unresolved(&err.message) {
        DataServiceError::NotFound(err.message.clone())
    } else if err.code == INVALID_PARAMS {
        DataServiceError::InvalidArgument(format!("{tool}: {}", err.message))
    } else {
        DataServiceError::ServiceError(format!("{tool}: {} (code {})", err.message, err.code))
    }
}

/// Heuristic for "this identifier does not resolve to data".
fn looks_unresolved(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    ["not found", "no data", "no observations", "unknown dcid", "does not exist"]
        .iter()
        .any(|needle| m.contains(needle))
}

// --- search_indicators payload ---

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(alias = "variables", alias = "results")]
    indicators: Vec<SearchItem>,
    #[serde(default)]
    dcid_name_mappings: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default, alias = "dcid", alias = "variableDcid")]
    variable_dcid: Option<String>,
    #[serde(default, alias = "placeDcid", alias = "place")]
    place_dcid: Option<String>,
    #[serde(default, alias = "places_with_data")]
    places: Vec<String>,
    #[serde(default, alias = "displayName", alias = "variable_name")]
    name: Option<String>,
}

/// Decode a search payload into indicator matches.
///
/// An item that lists several places yields one match per place. Items
/// without a variable or any place are skipped.
pub(crate) fn decode_search(payload: Value) -> Result<Vec<IndicatorMatch>, DataServiceError> {
    let parsed: SearchPayload = serde_json::from_value(payload)
        .map_err(|e| DataServiceError::ServiceError(format!("malformed search result: {e}")))?;

    let total = parsed.indicators.len();
    let mut matches = Vec::new();

    for item in parsed.indicators {
        let Some(variable_id) = item.variable_dcid.filter(|v| !v.is_empty()) else {
            continue;
        };
        let name = item
            .name
            .or_else(|| parsed.dcid_name_mappings.get(&variable_id).cloned())
            .unwrap_or_else(|| variable_id.clone());

        let places = item.place_dcid.into_iter().chain(item.places);
        for place_id in places.filter(|p| !p.is_empty()) {
            matches.push(IndicatorMatch {
                variable_id: variable_id.clone(),
                place_id,
                name: name.clone(),
            });
        }
    }

    if total > 0 && matches.is_empty() {
        debug!(items = total, "Search returned items without resolvable places");
    }

    Ok(matches)
}

// --- get_observations payload ---

#[derive(Debug, Deserialize)]
struct ObservationPayload {
    #[serde(default, alias = "variableDcid")]
    variable_dcid: Option<String>,
    #[serde(default, alias = "placeDcid")]
    place_dcid: Option<String>,
    #[serde(default, alias = "data", alias = "values")]
    observations: Option<Vec<PointItem>>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, deserialize_with = "opt_number_or_string")]
    value: Option<f64>,
    #[serde(default, alias = "provenance", alias = "source_url")]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PointItem {
    date: String,
    #[serde(deserialize_with = "number_or_string")]
    value: f64,
}

fn number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    numeric(Value::deserialize(de)?)
}

fn opt_number_or_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(de)? {
        Value::Null => Ok(None),
        v => numeric(v).map(Some),
    }
}

fn numeric<E: serde::de::Error>(value: Value) -> Result<f64, E> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("value is not a finite number")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("value '{s}' is not numeric"))),
        other => Err(serde::de::Error::custom(format!("value {other} is not numeric"))),
    }
}

/// Decode an observation payload; an empty series is `NotFound`.
pub(crate) fn decode_observations(
    payload: Value,
    request: &ObservationRequest,
) -> Result<ObservationSeries, DataServiceError> {
    let parsed: ObservationPayload = serde_json::from_value(payload)
        .map_err(|e| DataServiceError::ServiceError(format!("malformed observation result: {e}")))?;

    let observations = match (parsed.observations, parsed.date, parsed.value) {
        (Some(points), _, _) => points
            .into_iter()
            .map(|p| Observation { date: p.date, value: p.value })
            .collect(),
        (None, Some(date), Some(value)) => vec![Observation { date, value }],
        _ => {
            return Err(DataServiceError::ServiceError(
                "observation result has neither a series nor a single value".into(),
            ));
        }
    };

    if observations.is_empty() {
        return Err(DataServiceError::NotFound(format!(
            "no observations for variable '{}' at place '{}' ({})",
            request.variable_id, request.place_id, request.date
        )));
    }

    Ok(ObservationSeries {
        variable_id: parsed.variable_dcid.unwrap_or_else(|| request.variable_id.clone()),
        place_id: parsed.place_dcid.unwrap_or_else(|| request.place_id.clone()),
        observations,
        source: parsed.source,
    }
    .sorted())
}
