use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use log::{debug, info};
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::email::WeatherProvider;
use crate::error::{ResponderError, Result};

/// Current conditions for one city, captured at `captured_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub city: String,
    pub description: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub captured_at: DateTime<Local>,
}

impl WeatherRecord {
    pub fn temperature_label(&self) -> String {
        format!("{}°C", self.temperature)
    }

    pub fn humidity_label(&self) -> String {
        format!("{}%", self.humidity)
    }

    pub fn wind_label(&self) -> String {
        format!("{} m/s", self.wind_speed)
    }

    pub fn timestamp_label(&self) -> String {
        self.captured_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// The text block stamped onto each page, one entry per line.
    pub fn stamp_lines(&self) -> Vec<String> {
        vec![
            format!("Weather Update - {}", self.timestamp_label()),
            format!("City: {}", self.city),
            format!("Description: {}", self.description),
            format!("Temperature: {}", self.temperature_label()),
            format!("Humidity: {}", self.humidity_label()),
            format!("Wind Speed: {}", self.wind_label()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    name: String,
    weather: Vec<Condition>,
    main: MainReadings,
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// OpenWeatherMap "current weather" client. One HTTP call per lookup, no caching.
pub struct WeatherClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(WeatherClient {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn fetch(&self, city: &str) -> Result<WeatherRecord> {
        debug!("Requesting current weather for {}", city);

        let response = self
            .http
            .get(&self.api_url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| ResponderError::Connection(format!("weather API unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(ResponderError::Data(format!(
                "weather API returned {}: {}",
                status, detail
            )));
        }

        let payload = response
            .json::<CurrentWeatherResponse>()
            .await
            .map_err(|e| ResponderError::Data(format!("malformed weather payload: {}", e)))?;
        let record = WeatherRecord::from_payload(payload)?;
        info!("Weather data fetched for {}", record.city);
        Ok(record)
    }
}

impl WeatherProvider for WeatherClient {
    fn current_weather<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<WeatherRecord>> {
        Box::pin(self.fetch(city))
    }
}

/// Builds a record from a successful API body, stamped with the current local time.
pub fn parse_weather_payload(body: &[u8]) -> Result<WeatherRecord> {
    let payload: CurrentWeatherResponse = serde_json::from_slice(body)
        .map_err(|e| ResponderError::Data(format!("malformed weather payload: {}", e)))?;
    WeatherRecord::from_payload(payload)
}

impl WeatherRecord {
    fn from_payload(payload: CurrentWeatherResponse) -> Result<Self> {
        let condition = payload
            .weather
            .first()
            .ok_or_else(|| ResponderError::Data("weather payload has no conditions".to_string()))?;

        Ok(WeatherRecord {
            city: payload.name,
            description: title_case(&condition.description),
            temperature: payload.main.temp,
            humidity: payload.main.humidity,
            wind_speed: payload.wind.speed,
            captured_at: Local::now(),
        })
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
