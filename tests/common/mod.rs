//! Helpers for integration tests.

#![allow(dead_code)]

use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use pushkind_directory::db::{DbPool, establish_connection_pool};
use pushkind_directory::domain::types::{GeoPoint, PlaceAddress};
use pushkind_directory::geocoder::{Geocoder, GeocoderError};
use tempfile::NamedTempFile;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!(); // assumes migrations/ exists

/// Temporary database used in integration tests.
pub struct TestDb {
    _tempfile: NamedTempFile,
    pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        let tempfile = NamedTempFile::new().expect("Failed to create temp file");
        let pool = establish_connection_pool(tempfile.path().to_str().unwrap())
            .expect("Failed to establish SQLite connection.");
        let mut conn = pool
            .get()
            .expect("Failed to get SQLite connection from pool.");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("Migrations failed");
        TestDb {
            _tempfile: tempfile,
            pool,
        }
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }
}

/// Geocoder answering every lookup with the same address, or failing when
/// built with [`FixedGeocoder::failing`].
pub struct FixedGeocoder(Option<&'static str>);

impl FixedGeocoder {
    pub fn new(address: &'static str) -> Self {
        Self(Some(address))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

impl Geocoder for FixedGeocoder {
    fn reverse_geocode(&self, point: &GeoPoint) -> Result<PlaceAddress, GeocoderError> {
        self.0
            .and_then(|address| PlaceAddress::new(address).ok())
            .ok_or(GeocoderError::NoAddress {
                longitude: point.longitude(),
                latitude: point.latitude(),
            })
    }
}
