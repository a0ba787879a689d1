use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::provider::ProviderError;

/// Failure kinds surfaced by the pipeline to its consumers.
///
/// Validation failures (`InvalidInput`) are detected before any request is
/// issued; everything else originates at the provider boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum WeatherError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("weather data unavailable: {0}")]
    DataUnavailable(String),
    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),
    #[error("request timed out after {0}")]
    Timeout(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    DataUnavailable,
    Unauthorized,
    Timeout,
}

impl WeatherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeatherError::InvalidInput(_) => ErrorKind::InvalidInput,
            WeatherError::NotFound(_) => ErrorKind::NotFound,
            WeatherError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            WeatherError::Unauthorized(_) => ErrorKind::Unauthorized,
            WeatherError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// True for failures caused by what the user typed rather than by the provider.
    pub fn is_input_error(&self) -> bool {
        matches!(self, WeatherError::InvalidInput(_))
    }

    pub(crate) fn timeout(limit: Duration) -> Self {
        WeatherError::Timeout(format!("{}s", limit.as_secs_f64()))
    }

    /// Conversion used by lookups, where a 404 means the place does not exist.
    pub(crate) fn from_lookup(err: ProviderError) -> Self {
        match err {
            ProviderError::Http { status: 404, message } => WeatherError::NotFound(message),
            other => Self::from_fetch(other),
        }
    }

    /// Conversion used by data fetches; a 404 is just missing data there.
    pub(crate) fn from_fetch(err: ProviderError) -> Self {
        match err {
            ProviderError::Http { status: 401 | 403, message } => {
                WeatherError::Unauthorized(message)
            }
            other => WeatherError::DataUnavailable(other.to_string()),
        }
    }
}
