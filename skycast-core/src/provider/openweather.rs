use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::model::{
    Aqi, ForecastSeries, HistoryQuery, PollutionComponents, PollutionSample, PollutionSeries,
    WeatherSnapshot,
};

use super::{CurrentReport, Endpoints, ProviderError, WeatherProvider};

const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const POLLUTION_PATH: &str = "/data/2.5/air_pollution/forecast";
const HISTORY_PATH: &str = "/data/2.5/history/city";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoints: Endpoints,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn with_endpoints(api_key: String, endpoints: Endpoints) -> Self {
        Self {
            api_key,
            endpoints,
            http: Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        base: &str,
        path: &str,
        what: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", base.trim_end_matches('/'), path);
        debug!(endpoint = what, %url, "requesting");

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{what} request failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("{what} body unreadable: {e}")))?;

        if !status.is_success() {
            debug!(endpoint = what, status = status.as_u16(), "provider returned an error");
            let message = extract_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: truncate_body(&message),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("{what} payload: {e}")))
    }

    async fn fetch_current(
        &self,
        params: &[(&str, String)],
    ) -> Result<CurrentReport, ProviderError> {
        let parsed: OwCurrentResponse = self
            .get_json(&self.endpoints.api_base, CURRENT_PATH, "current weather", params)
            .await?;

        let sys = parsed.sys.unwrap_or_default();
        let mut snapshot = parsed.entry.into_snapshot()?;
        snapshot.sunrise = sys.sunrise.map(unix_to_utc).transpose()?;
        snapshot.sunset = sys.sunset.map(unix_to_utc).transpose()?;

        Ok(CurrentReport {
            name: parsed.name.filter(|n| !n.trim().is_empty()),
            latitude: parsed.coord.lat,
            longitude: parsed.coord.lon,
            snapshot,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: Option<f64>,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u16,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

/// Shape shared by current, forecast and history entries.
#[derive(Debug, Deserialize)]
struct OwEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
}

impl OwEntry {
    fn into_snapshot(self) -> Result<WeatherSnapshot, ProviderError> {
        let (condition_code, description) = self
            .weather
            .into_iter()
            .next()
            .map(|w| (w.id, w.description))
            .unwrap_or_else(|| (0, "Unknown".to_string()));

        Ok(WeatherSnapshot {
            timestamp: unix_to_utc(self.dt)?,
            temperature_c: self.main.temp,
            feels_like_c: self.main.feels_like,
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind_speed_ms: self.wind.speed,
            condition_code,
            description,
            sunrise: None,
            sunset: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    coord: OwCoord,
    name: Option<String>,
    sys: Option<OwSys>,
    #[serde(flatten)]
    entry: OwEntry,
}

#[derive(Debug, Default, Deserialize)]
struct OwCity {
    name: Option<String>,
    country: Option<String>,
    timezone: Option<i32>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: OwCity,
    list: Vec<OwEntry>,
}

#[derive(Debug, Deserialize)]
struct OwHistoryResponse {
    list: Vec<OwEntry>,
}

#[derive(Debug, Deserialize)]
struct OwAqi {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct OwComponents {
    co: f64,
    no: f64,
    no2: f64,
    o3: f64,
    so2: f64,
    pm2_5: f64,
    pm10: f64,
    nh3: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwPollutionEntry {
    dt: i64,
    main: OwAqi,
    components: OwComponents,
}

#[derive(Debug, Deserialize)]
struct OwPollutionResponse {
    list: Vec<OwPollutionEntry>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_by_name(&self, city: &str) -> Result<CurrentReport, ProviderError> {
        self.fetch_current(&[("q", city.to_string()), ("units", "metric".to_string())])
            .await
    }

    async fn current_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<CurrentReport, ProviderError> {
        self.fetch_current(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("units", "metric".to_string()),
        ])
        .await
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<ForecastSeries, ProviderError> {
        let parsed: OwForecastResponse = self
            .get_json(
                &self.endpoints.api_base,
                FORECAST_PATH,
                "forecast",
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;

        let entries = snapshots_in_order(parsed.list, "forecast")?;
        let city = parsed.city;

        Ok(ForecastSeries {
            city_name: city.name,
            country: city.country,
            utc_offset_secs: city.timezone,
            sunrise: city.sunrise.map(unix_to_utc).transpose()?,
            sunset: city.sunset.map(unix_to_utc).transpose()?,
            entries,
        })
    }

    async fn air_pollution_forecast(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<PollutionSeries, ProviderError> {
        let parsed: OwPollutionResponse = self
            .get_json(
                &self.endpoints.api_base,
                POLLUTION_PATH,
                "air pollution",
                &[("lat", lat.to_string()), ("lon", lon.to_string())],
            )
            .await?;

        let samples = parsed
            .list
            .into_iter()
            .map(|entry| {
                let aqi = Aqi::new(entry.main.aqi).ok_or_else(|| {
                    ProviderError::InvalidResponse(format!(
                        "air pollution payload: aqi {} outside 1..=5",
                        entry.main.aqi
                    ))
                })?;
                let c = entry.components;
                Ok(PollutionSample {
                    timestamp: unix_to_utc(entry.dt)?,
                    aqi,
                    components: PollutionComponents {
                        pm2_5: c.pm2_5,
                        pm10: c.pm10,
                        co: c.co,
                        no: c.no,
                        no2: c.no2,
                        o3: c.o3,
                        so2: c.so2,
                        nh3: c.nh3,
                    },
                })
            })
            .collect::<Result<Vec<_>, ProviderError>>()?;

        ensure_increasing(samples.iter().map(|s| s.timestamp), "air pollution")?;

        Ok(PollutionSeries { samples })
    }

    async fn history(
        &self,
        query: &HistoryQuery,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherSnapshot>, ProviderError> {
        let parsed: OwHistoryResponse = self
            .get_json(
                &self.endpoints.history_base,
                HISTORY_PATH,
                "history",
                &[
                    ("q", format!("{},{}", query.city, query.country_code)),
                    ("type", "hour".to_string()),
                    ("start", start.timestamp().to_string()),
                    ("end", end.timestamp().to_string()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;

        snapshots_in_order(parsed.list, "history")
    }
}

fn snapshots_in_order(
    list: Vec<OwEntry>,
    what: &str,
) -> Result<Vec<WeatherSnapshot>, ProviderError> {
    let entries = list
        .into_iter()
        .map(OwEntry::into_snapshot)
        .collect::<Result<Vec<_>, _>>()?;
    ensure_increasing(entries.iter().map(|e| e.timestamp), what)?;
    Ok(entries)
}

fn ensure_increasing(
    timestamps: impl Iterator<Item = DateTime<Utc>>,
    what: &str,
) -> Result<(), ProviderError> {
    let mut previous: Option<DateTime<Utc>> = None;
    for ts in timestamps {
        if previous.is_some_and(|p| p >= ts) {
            return Err(ProviderError::InvalidResponse(format!(
                "{what} payload: timestamps not strictly increasing at {ts}"
            )));
        }
        previous = Some(ts);
    }
    Ok(())
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("timestamp {ts} out of range")))
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_json(dt: i64) -> serde_json::Value {
        serde_json::json!({
            "dt": dt,
            "main": { "temp": 21.5, "feels_like": 20.9, "pressure": 1014, "humidity": 38 },
            "weather": [{ "id": 801, "main": "Clouds", "description": "few clouds" }],
            "wind": { "speed": 4.1 }
        })
    }

    #[test]
    fn entry_converts_to_snapshot() {
        let entry: OwEntry = serde_json::from_value(entry_json(1_700_000_000)).unwrap();
        let snapshot = entry.into_snapshot().unwrap();

        assert_eq!(snapshot.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(snapshot.condition_code, 801);
        assert_eq!(snapshot.description, "few clouds");
        assert_eq!(snapshot.humidity_pct, 38);
        assert_eq!(snapshot.pressure_hpa, 1014.0);
    }

    #[test]
    fn missing_weather_array_falls_back_to_unknown() {
        let mut json = entry_json(1_700_000_000);
        json.as_object_mut().unwrap().remove("weather");
        let entry: OwEntry = serde_json::from_value(json).unwrap();
        let snapshot = entry.into_snapshot().unwrap();

        assert_eq!(snapshot.condition_code, 0);
        assert_eq!(snapshot.description, "Unknown");
    }

    #[test]
    fn non_numeric_temperature_is_rejected() {
        let mut json = entry_json(1_700_000_000);
        json["main"]["temp"] = serde_json::json!("warm");
        assert!(serde_json::from_value::<OwEntry>(json).is_err());
    }

    #[test]
    fn out_of_order_series_is_rejected() {
        let list = vec![
            serde_json::from_value(entry_json(200)).unwrap(),
            serde_json::from_value(entry_json(100)).unwrap(),
        ];
        let err = snapshots_in_order(list, "forecast").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let list = vec![
            serde_json::from_value(entry_json(100)).unwrap(),
            serde_json::from_value(entry_json(100)).unwrap(),
        ];
        assert!(snapshots_in_order(list, "forecast").is_err());
    }

    #[test]
    fn error_message_is_taken_from_payload() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("city not found"));
        assert_eq!(extract_error_message("<html>"), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(250);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }
}
