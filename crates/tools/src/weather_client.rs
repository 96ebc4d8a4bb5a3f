//! OpenWeatherMap client and text summaries of its responses.
//!
//! Two endpoints are used: `/data/2.5/weather` for current conditions and
//! `/data/3.0/onecall` for current conditions plus forecast and alerts.
//! Responses are kept as raw JSON so the HTTP gateway can pass them through.

use memir_config::WeatherConfig;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Weather API key not configured (set OPENWEATHERMAP_API_KEY)")]
    NotConfigured,

    #[error("Weather request failed: {0}")]
    Request(String),

    #[error("Weather API returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Where to look up current weather.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    CityId(u64),
    City {
        name: String,
        country_code: Option<String>,
    },
}

impl Location {
    /// Parse the `"City"` / `"City,CC"` form.
    pub fn parse(text: &str) -> Self {
        match text.split_once(',') {
            Some((city, country)) if !country.trim().is_empty() => Self::City {
                name: city.trim().to_string(),
                country_code: Some(country.trim().to_string()),
            },
            Some((city, _)) => Self::City {
                name: city.trim().to_string(),
                country_code: None,
            },
            None => Self::City {
                name: text.trim().to_string(),
                country_code: None,
            },
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::CityId(id) => vec![("id", id.to_string())],
            Self::City {
                name,
                country_code: Some(cc),
            } => vec![("q", format!("{name},{cc}"))],
            Self::City {
                name,
                country_code: None,
            } => vec![("q", name.clone())],
        }
    }
}

/// Query parameters for current weather, as accepted by `GET /weather`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentWeatherQuery {
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub units: Option<String>,
    pub city_id: Option<u64>,
}

impl CurrentWeatherQuery {
    /// An explicit city id wins, then a city name, then the home city.
    pub fn location(&self, home_city_id: u64) -> Location {
        if let Some(id) = self.city_id {
            return Location::CityId(id);
        }
        match self.city.as_deref().map(str::trim) {
            Some(city) if !city.is_empty() => match &self.country_code {
                Some(cc) if !cc.trim().is_empty() => Location::City {
                    name: city.to_string(),
                    country_code: Some(cc.trim().to_string()),
                },
                _ => Location::parse(city),
            },
            _ => Location::CityId(home_city_id),
        }
    }
}

/// Query parameters for One Call, as accepted by `GET /onecall`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OneCallQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub units: Option<String>,
    pub lang: Option<String>,
    pub exclude: Option<String>,
}

pub struct WeatherClient {
    client: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Current conditions for `location`.
    pub async fn current(
        &self,
        location: &Location,
        units: Option<&str>,
    ) -> Result<Value, WeatherError> {
        let url = format!("{}/data/2.5/weather", self.config.base_url.trim_end_matches('/'));
        let mut params = location.query_pairs();
        params.push(("units", units.unwrap_or(self.config.units.as_str()).to_string()));
        self.fetch(&url, params).await
    }

    /// Current conditions, forecast and alerts for a coordinate pair.
    /// Missing coordinates default to home.
    pub async fn onecall(&self, query: &OneCallQuery) -> Result<Value, WeatherError> {
        let url = format!("{}/data/3.0/onecall", self.config.base_url.trim_end_matches('/'));
        let mut params = vec![
            ("lat", query.lat.unwrap_or(self.config.home_lat).to_string()),
            ("lon", query.lon.unwrap_or(self.config.home_lon).to_string()),
            (
                "units",
                query.units.clone().unwrap_or_else(|| self.config.units.clone()),
            ),
            ("lang", query.lang.clone().unwrap_or_else(|| "en".into())),
        ];
        if let Some(exclude) = &query.exclude {
            params.push(("exclude", exclude.clone()));
        }
        self.fetch(&url, params).await
    }

    async fn fetch(
        &self,
        url: &str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<Value, WeatherError> {
        let api_key = self.config.api_key.as_ref().ok_or(WeatherError::NotConfigured)?;
        params.push(("appid", api_key.clone()));

        debug!(url, "Fetching weather");
        let response = self
            .client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Weather API returned error");
            return Err(WeatherError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| WeatherError::Request(format!("invalid JSON: {e}")))
    }
}

/// Unit suffix for temperatures.
pub fn temperature_unit(units: &str) -> &'static str {
    match units {
        "imperial" => "°F",
        "standard" => "K",
        _ => "°C",
    }
}

/// Render a JSON scalar for display; anything else becomes `?`.
fn show(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "?".to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn description(value: &Value) -> String {
    capitalize(value["weather"][0]["description"].as_str().unwrap_or("N/A"))
}

/// Summarize a `/weather` response. `None` when it lacks conditions.
pub fn summarize_current(data: &Value, units: &str) -> Option<String> {
    let main = data.get("main")?;
    data.get("weather")?;

    let city = data["name"].as_str().unwrap_or("Unknown");
    let country = data["sys"]["country"].as_str().unwrap_or("?");
    let unit = temperature_unit(units);
    let temp = show(main.get("temp"));
    let feels = main
        .get("feels_like")
        .map(|v| show(Some(v)))
        .unwrap_or_else(|| temp.clone());

    Some(format!(
        "Current weather for {city}, {country}:\n\
         - Condition: {}\n\
         - Temperature: {temp}{unit} (feels like {feels}{unit})\n\
         - Humidity: {}%\n\
         - Wind: {} m/s at {}°\n\
         - Pressure: {} hPa",
        description(data),
        show(main.get("humidity")),
        show(data["wind"].get("speed")),
        show(data["wind"].get("deg")),
        show(main.get("pressure")),
    ))
}

/// Summarize a One Call response: overview, current conditions, the next
/// hour, today and tomorrow, then any alerts.
pub fn summarize_onecall(data: &Value, units: &str) -> String {
    let unit = temperature_unit(units);
    let mut lines = Vec::new();

    if let Some(overview) = data["weather_overview"].as_str() {
        lines.push(format!("Summary: {overview}"));
    }

    if let Some(cur) = data.get("current").filter(|c| c.is_object()) {
        let temp = show(cur.get("temp"));
        let feels = cur
            .get("feels_like")
            .map(|v| show(Some(v)))
            .unwrap_or_else(|| temp.clone());
        lines.push(format!(
            "Current: {}, {temp}{unit} (feels like {feels}{unit}), humidity {}%, wind {} m/s at {}°, pressure {} hPa.",
            description(cur),
            show(cur.get("humidity")),
            show(cur.get("wind_speed")),
            show(cur.get("wind_deg")),
            show(cur.get("pressure")),
        ));
    }

    if let Some(minutely) = data["minutely"].as_array().filter(|m| !m.is_empty()) {
        let wet = minutely
            .iter()
            .any(|m| m["precipitation"].as_f64().unwrap_or(0.0) > 0.0);
        lines.push(if wet {
            "Next hour: Precipitation expected.".to_string()
        } else {
            "Next hour: No precipitation expected.".to_string()
        });
    }

    if let Some(daily) = data["daily"].as_array() {
        for (i, day) in daily.iter().take(2).enumerate() {
            let label = if i == 0 { "Today" } else { "Tomorrow" };
            let pop = (day["pop"].as_f64().unwrap_or(0.0) * 100.0).round() as i64;
            lines.push(format!(
                "{label}: {}, {}-{}{unit}, {pop}% chance of precipitation.",
                description(day),
                show(day["temp"].get("min")),
                show(day["temp"].get("max")),
            ));
        }
    }

    if let Some(alerts) = data["alerts"].as_array() {
        for alert in alerts {
            lines.push(format!(
                "ALERT: {}: {}",
                alert["event"].as_str().unwrap_or("Weather Alert"),
                alert["description"].as_str().unwrap_or_default()
            ));
        }
    }

    lines.join("\n")
}
