//! Weather tool: geocodes a city with Open-Meteo, then fetches its current weather.
//!
//! Two sequential HTTP calls. Any failure becomes the tool's text output.

use async_trait::async_trait;
use parley_core::tool::{Tool, ToolInvocationResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WeatherTool {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherTool {
    /// `timeout` bounds each of the two HTTP calls.
    pub fn new(
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not build weather HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        }
    }

    async fn lookup(&self, city: &str) -> Result<String, reqwest::Error> {
        let geo: GeocodingResponse = self
            .client
            .get(&self.geocoding_url)
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(place) = geo.results.into_iter().next() else {
            return Ok(format!("Could not find coordinates for {city}."));
        };
        debug!(city, lat = place.latitude, lon = place.longitude, "Geocoded city");

        let forecast: ForecastResponse = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(describe(city, &forecast.current_weather))
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new(DEFAULT_GEOCODING_URL, DEFAULT_FORECAST_URL, DEFAULT_TIMEOUT)
    }
}

fn describe(city: &str, current: &CurrentWeather) -> String {
    format!(
        "The current weather in {city} is {}°C with a wind speed of {} km/h.",
        current.temperature, current.windspeed
    )
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Gives the current weather of a city. The argument must be a city name."
    }

    fn slash_command(&self) -> Option<&str> {
        Some("meteo")
    }

    async fn execute(&self, argument: &str) -> ToolInvocationResult {
        let city = argument.trim();
        if city.is_empty() {
            return ToolInvocationResult::new(self.name(), "No city given for the weather lookup.");
        }

        let content = match self.lookup(city).await {
            Ok(text) => text,
            Err(e) => {
                warn!(city, error = %e, "Weather lookup failed");
                format!("Error fetching weather: {e}")
            }
        };
        ToolInvocationResult::new(self.name(), content)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
}
