use std::sync::Arc;

use tracing::debug;

use crate::{
    error::WeatherError,
    model::{Location, WeatherSnapshot},
    provider::WeatherProvider,
};

/// Single current-conditions reading, keyed by the resolved coordinates.
#[derive(Debug, Clone)]
pub struct CurrentConditionsFetcher {
    provider: Arc<dyn WeatherProvider>,
}

impl CurrentConditionsFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    pub async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, WeatherError> {
        let report = self
            .provider
            .current_by_coordinates(location.latitude(), location.longitude())
            .await
            .map_err(WeatherError::from_fetch)?;

        debug!(
            place = location.display_name(),
            temperature_c = report.snapshot.temperature_c,
            "current conditions fetched"
        );
        Ok(report.snapshot)
    }
}
