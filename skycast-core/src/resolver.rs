//! Turns device coordinates or a typed city name into a [`Location`].

use std::sync::Arc;

use tracing::debug;

use crate::{
    error::WeatherError,
    model::{Location, coordinate_label},
    provider::WeatherProvider,
};

#[derive(Debug, Clone)]
pub struct LocationResolver {
    provider: Arc<dyn WeatherProvider>,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Reverse lookup. The provider's name is used when it reports one,
    /// otherwise the coordinates themselves become the display name.
    pub async fn resolve_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Location, WeatherError> {
        validate_coordinates(lat, lon)?;
        debug!(lat, lon, "resolving coordinates");

        let report = self
            .provider
            .current_by_coordinates(lat, lon)
            .await
            .map_err(WeatherError::from_lookup)?;

        let name = report.name.unwrap_or_else(|| coordinate_label(lat, lon));
        Ok(Location::new(report.latitude, report.longitude, name))
    }

    /// Forward lookup. Blank input fails before any request is made.
    pub async fn resolve_by_name(&self, city: &str) -> Result<Location, WeatherError> {
        let city = validate_city_name(city)?;
        debug!(city, "resolving city name");

        let report = self
            .provider
            .current_by_name(city)
            .await
            .map_err(WeatherError::from_lookup)?;

        let name = report.name.unwrap_or_else(|| city.to_string());
        Ok(Location::new(report.latitude, report.longitude, name))
    }
}

pub fn validate_city_name(raw: &str) -> Result<&str, WeatherError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::InvalidInput(
            "City name cannot be empty.".to_string(),
        ));
    }
    Ok(trimmed)
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), WeatherError> {
    let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
    let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(WeatherError::InvalidInput(format!(
            "coordinates ({lat}, {lon}) are out of range"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::FakeProvider;

    #[tokio::test]
    async fn blank_names_fail_without_a_request() {
        let fake = Arc::new(FakeProvider::new());
        let resolver = LocationResolver::new(fake.clone());

        for input in ["", "   ", "\t\n"] {
            let err = resolver.resolve_by_name(input).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn name_lookup_trims_and_uses_provider_coordinates() {
        let fake = Arc::new(FakeProvider::new().with_place("Amman", 31.95, 35.93));
        let resolver = LocationResolver::new(fake);

        let location = resolver.resolve_by_name("  Amman ").await.unwrap();
        assert_eq!(location.display_name(), "Amman");
        assert_eq!(location.latitude(), 31.95);
        assert_eq!(location.longitude(), 35.93);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let resolver = LocationResolver::new(Arc::new(FakeProvider::new()));

        let err = resolver.resolve_by_name("Nonexistentville").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn nameless_reverse_lookup_falls_back_to_label() {
        let fake = Arc::new(FakeProvider::new().with_unnamed_place(10.0, -20.0));
        let resolver = LocationResolver::new(fake);

        let location = resolver.resolve_by_coordinates(10.0, -20.0).await.unwrap();
        assert_eq!(location.display_name(), "10.0000, -20.0000");
    }

    #[tokio::test]
    async fn out_of_range_coordinates_are_rejected_locally() {
        let fake = Arc::new(FakeProvider::new());
        let resolver = LocationResolver::new(fake.clone());

        assert!(resolver.resolve_by_coordinates(91.0, 0.0).await.is_err());
        assert!(resolver.resolve_by_coordinates(0.0, f64::NAN).await.is_err());
        assert_eq!(fake.calls(), 0);
    }
}
