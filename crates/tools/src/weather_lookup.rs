//! Weather tools backed by OpenWeatherMap.

use crate::weather_client::{
    Location, OneCallQuery, WeatherClient, summarize_current, summarize_onecall,
};
use async_trait::async_trait;
use memir_core::error::ToolError;
use memir_core::tool::{Tool, ToolResult};
use serde_json::Value;
use std::sync::Arc;

/// `get_weather(city?, country_code?, units?)`: current conditions.
///
/// With no city the configured home city id is used. The city may carry its
/// country code inline (`"London,GB"`).
pub struct WeatherLookupTool {
    client: Arc<WeatherClient>,
}

impl WeatherLookupTool {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        Self { client }
    }

    fn location(&self, arguments: &Value) -> Location {
        let city = arguments["city"].as_str().map(str::trim).unwrap_or_default();
        if city.is_empty() {
            return Location::CityId(self.client.config().home_city_id);
        }
        match arguments["country_code"].as_str().map(str::trim) {
            Some(cc) if !cc.is_empty() => Location::City {
                name: city.to_string(),
                country_code: Some(cc.to_string()),
            },
            _ => Location::parse(city),
        }
    }
}

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather. With no city, reports the user's home (London, Ontario). \
         A city may include a country code, e.g. 'London,GB'."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "City name, optionally 'City,CC'" },
                "country_code": { "type": "string", "description": "ISO 3166 country code" },
                "units": {
                    "type": "string",
                    "enum": ["metric", "imperial", "standard"],
                    "description": "Temperature units"
                }
            }
        })
    }

    fn positional_parameter(&self) -> Option<String> {
        Some("city".into())
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let location = self.location(&arguments);
        let units = arguments["units"]
            .as_str()
            .unwrap_or(self.client.config().units.as_str())
            .to_string();

        let data = self
            .client
            .current(&location, Some(&units))
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;

        let summary = summarize_current(&data, &units).ok_or_else(|| {
            crate::execution_failed(self.name(), "Sorry, I couldn't retrieve the weather.")
        })?;

        Ok(ToolResult::ok(self.name(), summary).with_data(data))
    }
}

/// `get_weather_forecast()`: One Call summary for the home coordinates.
pub struct WeatherForecastTool {
    client: Arc<WeatherClient>,
}

impl WeatherForecastTool {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn description(&self) -> &str {
        "Get current weather, the short-term forecast and any alerts for the user's home. \
         Present current conditions and the forecast together."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
        let data = self
            .client
            .onecall(&OneCallQuery::default())
            .await
            .map_err(|e| crate::execution_failed(self.name(), e))?;

        let summary = summarize_onecall(&data, &self.client.config().units);
        if summary.is_empty() {
            return Err(crate::execution_failed(
                self.name(),
                "Sorry, I couldn't retrieve the forecast for your location.",
            ));
        }
        Ok(ToolResult::ok(self.name(), summary))
    }
}
