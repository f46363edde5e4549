use thiserror::Error;

use crate::domain::taxonomy::TaxonomyError;
use crate::domain::types::ClassCode;
use crate::geocoder::GeocoderError;

/// Invariant a write would have broken.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("class code `{0}` is already taken")]
    CodeAlreadyTaken(ClassCode),
    #[error("parent class `{0}` does not exist")]
    ParentNotFound(ClassCode),
    #[error("class has child classes")]
    HasChildren,
    #[error("class is assigned to places")]
    HasPlaces,
    #[error("at least one locale must remain")]
    NeedAtLeastOneLocale,
    #[error("only inactive places can be deleted")]
    PlaceNotInactive,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictKind),
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
    #[error(transparent)]
    Geocoder(#[from] GeocoderError),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl RepositoryError {
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} `{key}`"))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
