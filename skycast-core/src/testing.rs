//! In-memory provider used by the unit tests.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    model::{
        Aqi, ForecastSeries, HistoryQuery, PollutionComponents, PollutionSample, PollutionSeries,
        WeatherSnapshot, fixtures::snapshot_at,
    },
    provider::{CurrentReport, ProviderError, WeatherProvider},
};

/// 2024-01-01T00:00:00Z
pub const SERIES_START: i64 = 1_704_067_200;

#[derive(Debug, Clone)]
pub struct FakePlace {
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub temperature_c: f64,
    pub lookup_delay: Duration,
    pub fetch_delay: Duration,
    pub pollution_delay: Duration,
    pub current_error: Option<ProviderError>,
    pub forecast_error: Option<ProviderError>,
    pub pollution_error: Option<ProviderError>,
}

impl FakePlace {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: Some(name.to_string()),
            lat,
            lon,
            temperature_c: 20.0,
            lookup_delay: Duration::from_millis(1),
            fetch_delay: Duration::from_millis(5),
            pollution_delay: Duration::from_millis(5),
            current_error: None,
            forecast_error: None,
            pollution_error: None,
        }
    }

    pub fn temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn pollution_delay(mut self, delay: Duration) -> Self {
        self.pollution_delay = delay;
        self
    }

    pub fn failing_current(mut self, err: ProviderError) -> Self {
        self.current_error = Some(err);
        self
    }

    pub fn failing_forecast(mut self, err: ProviderError) -> Self {
        self.forecast_error = Some(err);
        self
    }

    pub fn failing_pollution(mut self, err: ProviderError) -> Self {
        self.pollution_error = Some(err);
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeProvider {
    places: Vec<FakePlace>,
    log: Mutex<Vec<&'static str>>,
    history_windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    history_delay: Duration,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(self, name: &str, lat: f64, lon: f64) -> Self {
        self.with(FakePlace::new(name, lat, lon))
    }

    pub fn with_unnamed_place(self, lat: f64, lon: f64) -> Self {
        let mut place = FakePlace::new("", lat, lon);
        place.name = None;
        self.with(place)
    }

    pub fn with(mut self, place: FakePlace) -> Self {
        self.places.push(place);
        self
    }

    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == endpoint)
            .count()
    }

    pub fn history_windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.history_windows.lock().unwrap().clone()
    }

    fn record(&self, endpoint: &'static str) {
        self.log.lock().unwrap().push(endpoint);
    }

    fn by_name(&self, city: &str) -> Option<&FakePlace> {
        self.places.iter().find(|p| {
            p.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(city))
        })
    }

    fn by_coordinates(&self, lat: f64, lon: f64) -> Result<&FakePlace, ProviderError> {
        self.places
            .iter()
            .find(|p| p.lat == lat && p.lon == lon)
            .ok_or_else(|| ProviderError::Http {
                status: 404,
                message: "nothing to geocode".to_string(),
            })
    }

    fn report(place: &FakePlace) -> CurrentReport {
        let mut snapshot = snapshot_at(SERIES_START, place.temperature_c);
        snapshot.sunrise = DateTime::from_timestamp(SERIES_START + 4 * 3600, 0);
        snapshot.sunset = DateTime::from_timestamp(SERIES_START + 15 * 3600, 0);
        CurrentReport {
            name: place.name.clone(),
            latitude: place.lat,
            longitude: place.lon,
            snapshot,
        }
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn current_by_name(&self, city: &str) -> Result<CurrentReport, ProviderError> {
        self.record("current_by_name");
        let place = self.by_name(city).ok_or_else(|| ProviderError::Http {
            status: 404,
            message: "city not found".to_string(),
        })?;
        tokio::time::sleep(place.lookup_delay).await;
        Ok(Self::report(place))
    }

    async fn current_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<CurrentReport, ProviderError> {
        self.record("current_by_coordinates");
        let place = self.by_coordinates(lat, lon)?;
        tokio::time::sleep(place.fetch_delay).await;
        match &place.current_error {
            Some(err) => Err(err.clone()),
            None => Ok(Self::report(place)),
        }
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<ForecastSeries, ProviderError> {
        self.record("forecast");
        let place = self.by_coordinates(lat, lon)?;
        tokio::time::sleep(place.fetch_delay).await;
        if let Some(err) = &place.forecast_error {
            return Err(err.clone());
        }
        Ok(ForecastSeries {
            city_name: place.name.clone(),
            country: None,
            utc_offset_secs: Some(0),
            sunrise: None,
            sunset: None,
            entries: (0..40)
                .map(|i| snapshot_at(SERIES_START + i * 3 * 3600, place.temperature_c))
                .collect(),
        })
    }

    async fn air_pollution_forecast(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<PollutionSeries, ProviderError> {
        self.record("air_pollution_forecast");
        let place = self.by_coordinates(lat, lon)?;
        tokio::time::sleep(place.pollution_delay).await;
        if let Some(err) = &place.pollution_error {
            return Err(err.clone());
        }
        let samples = (0..5)
            .map(|i| PollutionSample {
                timestamp: DateTime::from_timestamp(SERIES_START + i * 3600, 0)
                    .expect("valid timestamp"),
                aqi: Aqi::new(2).expect("valid aqi"),
                components: PollutionComponents {
                    pm2_5: 10.0 + i as f64,
                    pm10: 20.0,
                    co: 200.0,
                    no: 0.1,
                    no2: 5.0,
                    o3: 60.0,
                    so2: 1.0,
                    nh3: None,
                },
            })
            .collect();
        Ok(PollutionSeries { samples })
    }

    async fn history(
        &self,
        query: &HistoryQuery,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherSnapshot>, ProviderError> {
        self.record("history");
        self.history_windows.lock().unwrap().push((start, end));
        tokio::time::sleep(self.history_delay).await;
        if self.by_name(&query.city).is_none() {
            return Err(ProviderError::Http {
                status: 404,
                message: "city not found".to_string(),
            });
        }
        Ok((0..24)
            .map(|h| snapshot_at(start.timestamp() + h * 3600, 15.0))
            .collect())
    }
}
