//! Statistical data tools for statsagent.
//!
//! Every tool wraps a shared [`DataService`]; the registry built here is
//! the fixed capability set declared to the reasoning capability.

pub mod fetch_statistical_data;
pub mod get_observations;
pub mod search_indicators;

pub use fetch_statistical_data::FetchStatisticalDataTool;
pub use get_observations::GetObservationsTool;
pub use search_indicators::SearchIndicatorsTool;

use statsagent_core::data::DataService;
use statsagent_core::tool::ToolRegistry;
use std::sync::Arc;

/// The base registry: `search_indicators` and `get_observations`.
pub fn default_registry(service: Arc<dyn DataService>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchIndicatorsTool::new(service.clone())));
    registry.register(Box::new(GetObservationsTool::new(service)));
    registry
}

/// The base registry, plus `fetch_statistical_data` when enabled.
pub fn build_registry(service: Arc<dyn DataService>, enable_fetch_tool: bool) -> ToolRegistry {
    let mut registry = default_registry(service.clone());
    if enable_fetch_tool {
        registry.register(Box::new(FetchStatisticalDataTool::new(service)));
    }
    registry
}
