use crate::{
    Config, WeatherError,
    model::{ForecastSeries, HistoryQuery, PollutionSeries, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;

pub mod openweather;

pub const DEFAULT_API_BASE: &str = "https://api.openweathermap.org";
pub const DEFAULT_HISTORY_BASE: &str = "https://history.openweathermap.org";

/// Raw failure from the HTTP layer, before it is mapped onto [`WeatherError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Current conditions together with where the provider says they were observed.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReport {
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub snapshot: WeatherSnapshot,
}

/// Base URLs for the provider's endpoint groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub history_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            history_base: DEFAULT_HISTORY_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint group at the same host, e.g. a local mock server.
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            history_base: base,
        }
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_by_name(&self, city: &str) -> Result<CurrentReport, ProviderError>;

    async fn current_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<CurrentReport, ProviderError>;

    async fn forecast(&self, lat: f64, lon: f64) -> Result<ForecastSeries, ProviderError>;

    async fn air_pollution_forecast(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<PollutionSeries, ProviderError>;

    async fn history(
        &self,
        query: &HistoryQuery,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherSnapshot>, ProviderError>;
}

/// Construct the provider from config. A missing key is reported, never panicked on.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn WeatherProvider>, WeatherError> {
    let api_key = config.api_key().ok_or_else(|| {
        WeatherError::Unauthorized(
            "no API key configured.\n\
             Hint: run `skycast configure` or set SKYCAST_API_KEY."
                .to_string(),
        )
    })?;

    Ok(Arc::new(OpenWeatherProvider::with_endpoints(
        api_key,
        config.endpoints(),
    )))
}
