//! Reverse geocoding of place coordinates.
//!
//! Place creation asks the geocoder once for the address of the new point.
//! There are no retries: a failure aborts the enclosing transaction.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::types::{GeoPoint, PlaceAddress};
use crate::models::config::GeocoderSettings;

#[derive(Debug, Error)]
pub enum GeocoderError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoder responded with status {0}")]
    Status(u16),
    #[error("geocoder found no address for {longitude},{latitude}")]
    NoAddress { longitude: f64, latitude: f64 },
}

/// Port to the external reverse-geocoding service.
pub trait Geocoder {
    /// Formatted postal address of `point`.
    fn reverse_geocode(&self, point: &GeoPoint) -> Result<PlaceAddress, GeocoderError>;
}

/// Nominatim-compatible HTTP geocoder.
pub struct HttpGeocoder {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

impl HttpGeocoder {
    pub fn new(settings: &GeocoderSettings) -> Result<Self, GeocoderError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for HttpGeocoder {
    fn reverse_geocode(&self, point: &GeoPoint) -> Result<PlaceAddress, GeocoderError> {
        let no_address = || GeocoderError::NoAddress {
            longitude: point.longitude(),
            latitude: point.latitude(),
        };

        let response = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", point.latitude().to_string()),
                ("lon", point.longitude().to_string()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocoderError::Status(status.as_u16()));
        }

        let body: ReverseResponse = response.json()?;
        body.display_name
            .and_then(|name| PlaceAddress::new(name).ok())
            .ok_or_else(no_address)
    }
}
