//! Data Commons MCP client.
//!
//! Speaks JSON-RPC 2.0 over HTTP to an MCP server exposing the
//! `search_indicators` and `get_observations` tools. Each call is an
//! independent POST; the only shared state is reqwest's connection pool
//! and a request-id counter.

use async_trait::async_trait;
use serde_json::{Value, json};
use statsagent_config::DataServiceConfig;
use statsagent_core::data::{DataService, IndicatorMatch, ObservationRequest, ObservationSeries, SearchRequest};
use statsagent_core::error::DataServiceError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::wire::{self, RpcRequest, TOOLS_LIST};

const SEARCH_TOOL: &str = "search_indicators";
const OBSERVE_TOOL: &str = "get_observations";

/// An MCP-backed [`DataService`].
pub struct McpDataClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl McpDataClient {
    /// Create a client for the given MCP endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DataServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataServiceError::ServiceError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &DataServiceConfig) -> Result<Self, DataServiceError> {
        Self::new(config.url.clone(), config.api_key.clone(), config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, body: &RpcRequest<'_>) -> Result<String, DataServiceError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json, text/event-stream")
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status().as_u16();

        if matches!(status, 429 | 502 | 503 | 504) {
            return Err(DataServiceError::ServiceUnavailable(format!(
                "{} returned HTTP {status}",
                self.endpoint
            )));
        }

        if status == 401 || status == 403 {
            return Err(DataServiceError::ServiceError(format!(
                "{} rejected the API key (HTTP {status})",
                self.endpoint
            )));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Data service returned error");
            return Err(DataServiceError::ServiceError(format!(
                "{} returned HTTP {status}: {error_body}",
                self.endpoint
            )));
        }

        response.text().await.map_err(classify_transport)
    }

    /// Invoke one MCP tool and return its JSON payload.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, DataServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(tool, id, endpoint = %self.endpoint, "Calling MCP tool");

        let body = self.post(&RpcRequest::tool_call(id, tool, arguments)).await?;
        let response = wire::parse_rpc_body(&body)?;
        wire::tool_payload(tool, response)
    }
}

fn classify_transport(e: reqwest::Error) -> DataServiceError {
    if e.is_builder() {
        DataServiceError::ServiceError(format!("invalid request: {e}"))
    } else if e.is_decode() {
        DataServiceError::ServiceError(format!("unreadable response: {e}"))
    } else {
        DataServiceError::ServiceUnavailable(e.to_string())
    }
}

fn search_arguments(request: &SearchRequest) -> Value {
    let mut args = json!({
        "query": request.query,
        "include_topics": request.include_topics,
    });
    if !request.places.is_empty() {
        args["places"] = json!(request.places);
    }
    args
}

fn observe_arguments(request: &ObservationRequest) -> Value {
    let mut args = json!({
        "variable_dcid": request.variable_id,
        "place_dcid": request.place_id,
        "date": request.date.as_str(),
    });
    if let Some(child) = &request.child_place_type {
        args["child_place_type"] = json!(child);
    }
    args
}

#[async_trait]
impl DataService for McpDataClient {
    fn name(&self) -> &str {
        "datacommons-mcp"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<IndicatorMatch>, DataServiceError> {
        request.validate()?;
        let payload = self.call_tool(SEARCH_TOOL, search_arguments(request)).await?;
        wire::decode_search(payload)
    }

    async fn observe(&self, request: &ObservationRequest) -> Result<ObservationSeries, DataServiceError> {
        request.validate()?;
        let payload = self.call_tool(OBSERVE_TOOL, observe_arguments(request)).await?;
        wire::decode_observations(payload, request)
    }

    async fn health_check(&self) -> Result<bool, DataServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = self.post(&RpcRequest::new(id, TOOLS_LIST, json!({}))).await?;
        Ok(wire::parse_rpc_body(&body).is_ok_and(|r| r.error.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use statsagent_core::data::DateFilter;
    use std::sync::{Arc, Mutex};

    /// Serve `handler` on an ephemeral port and return the MCP URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/mcp")
    }

    fn client(url: String) -> McpDataClient {
        McpDataClient::new(url, None, Duration::from_secs(5)).unwrap()
    }

    fn text_result(payload: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": payload.to_string()}]}
        })
    }

    #[tokio::test]
    async fn search_sends_tools_call_and_decodes() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let captured = seen.clone();
        let app = Router::new().route(
            "/mcp",
            post(move |axum::Json(body): axum::Json<Value>| {
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().push(body);
                    axum::Json(text_result(json!({
                        "indicators": [{
                            "variable_dcid": "Count_Person",
                            "place_dcid": "country/IND",
                            "name": "Total Population"
                        }]
                    })))
                }
            }),
        );
        let c = client(serve(app).await);

        let matches = c
            .search(&SearchRequest::new("population").with_places(["India"]))
            .await
            .unwrap();

        assert_eq!(matches[0].variable_id, "Count_Person");
        let requests = seen.lock().unwrap();
        assert_eq!(requests[0]["method"], "tools/call");
        assert_eq!(requests[0]["params"]["name"], "search_indicators");
        assert_eq!(requests[0]["params"]["arguments"]["places"], json!(["India"]));
    }

    #[tokio::test]
    async fn observe_reads_event_stream_response() {
        let app = Router::new().route(
            "/mcp",
            post(|| async {
                let frame = text_result(json!({
                    "variable_dcid": "Count_Person",
                    "place_dcid": "country/IND",
                    "observations": [{"date": "2023", "value": 1428627663.0}]
                }));
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    format!("event: message\ndata: {frame}\n\n"),
                )
            }),
        );
        let c = client(serve(app).await);

        let series = c
            .observe(&ObservationRequest::new("Count_Person", "country/IND", DateFilter::Latest))
            .await
            .unwrap();
        assert_eq!(series.latest().unwrap().date, "2023");
    }

    #[tokio::test]
    async fn overloaded_upstream_is_unavailable() {
        let app = Router::new().route(
            "/mcp",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE.into_response() }),
        );
        let c = client(serve(app).await);

        let err = c.search(&SearchRequest::new("gdp")).await.unwrap_err();
        assert!(matches!(err, DataServiceError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn server_error_is_service_error() {
        let app = Router::new().route(
            "/mcp",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
        );
        let c = client(serve(app).await);

        let err = c.search(&SearchRequest::new("gdp")).await.unwrap_err();
        assert!(matches!(err, DataServiceError::ServiceError(m) if m.contains("boom") && m.contains("/mcp")));
    }

    #[tokio::test]
    async fn rejected_key_names_the_endpoint() {
        let app = Router::new().route(
            "/mcp",
            post(|| async { StatusCode::UNAUTHORIZED.into_response() }),
        );
        let url = serve(app).await;
        let c = McpDataClient::new(url.clone(), Some("wrong".into()), Duration::from_secs(5)).unwrap();

        let err = c.search(&SearchRequest::new("gdp")).await.unwrap_err();
        assert!(matches!(&err, DataServiceError::ServiceError(m) if m.contains(&url) && m.contains("401")));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let c = client(format!("http://{addr}/mcp"));
        let err = c.search(&SearchRequest::new("gdp")).await.unwrap_err();
        assert!(matches!(err, DataServiceError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_series_is_not_found() {
        let app = Router::new().route(
            "/mcp",
            post(|| async { axum::Json(text_result(json!({"observations": []}))) }),
        );
        let c = client(serve(app).await);

        let err = c
            .observe(&ObservationRequest::new("Count_Person", "country/XYZ", DateFilter::Latest))
            .await
            .unwrap_err();
        assert!(matches!(err, DataServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_query_never_reaches_the_network() {
        // Nothing listens here; validation must fail first.
        let c = client("http://127.0.0.1:9/mcp".into());
        let err = c.search(&SearchRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, DataServiceError::InvalidArgument(_)));
    }

    #[test]
    fn observe_arguments_use_wire_names() {
        let mut req = ObservationRequest::new("Count_Person", "country/USA", DateFilter::Exact("2020".into()));
        req.child_place_type = Some("State".into());
        let args = observe_arguments(&req);
        assert_eq!(args["variable_dcid"], "Count_Person");
        assert_eq!(args["place_dcid"], "country/USA");
        assert_eq!(args["date"], "2020");
        assert_eq!(args["child_place_type"], "State");
    }

    #[test]
    fn search_arguments_omit_empty_places() {
        let args = search_arguments(&SearchRequest::new("gdp"));
        assert!(args.get("places").is_none());
        assert_eq!(args["include_topics"], true);
    }
}
