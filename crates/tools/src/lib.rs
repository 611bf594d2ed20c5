//! Built-in tool implementations for Parley.
//!
//! Each tool answers with one short text fact that the orchestrator folds
//! into the user's prompt.

pub mod datetime;
pub mod weather;

use parley_config::ToolsConfig;
use parley_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::warn;

pub use datetime::DateTimeTool;
pub use weather::WeatherTool;

/// Create the default tool registry: `datetime` (`/heure`) and
/// `get_weather` (`/meteo`).
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let timezone: chrono_tz::Tz = config.timezone.parse().unwrap_or_else(|_| {
        warn!(timezone = %config.timezone, "Unknown timezone, using Europe/Paris");
        chrono_tz::Europe::Paris
    });

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(DateTimeTool::new(timezone)));
    registry.register(Arc::new(WeatherTool::new(
        config.geocoding_url.clone(),
        config.forecast_url.clone(),
        config.timeout(),
    )));
    registry
}
