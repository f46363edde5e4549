//! Error conversion glue between layers.
//!
//! The domain layer must not depend on service/repository error types, so the
//! `From` impls connecting them live here.

use crate::domain::taxonomy::TaxonomyError;
use crate::domain::types::TypeConstraintError;
use crate::forms::classes::ClassFormError;
use crate::forms::places::PlaceFormError;
use crate::repository::{ConflictKind, RepositoryError};
use crate::services::errors::ServiceError;

impl From<TypeConstraintError> for ServiceError {
    fn from(val: TypeConstraintError) -> Self {
        ServiceError::InvalidInput(val.to_string())
    }
}

impl From<TypeConstraintError> for RepositoryError {
    fn from(val: TypeConstraintError) -> Self {
        RepositoryError::ValidationError(val.to_string())
    }
}

impl From<ConflictKind> for ServiceError {
    fn from(val: ConflictKind) -> Self {
        match val {
            ConflictKind::CodeAlreadyTaken(code) => ServiceError::CodeAlreadyTaken(code),
            ConflictKind::ParentNotFound(code) => ServiceError::ParentNotFound(code),
            ConflictKind::HasChildren => ServiceError::HasChildren,
            ConflictKind::HasPlaces => ServiceError::HasPlaces,
            ConflictKind::NeedAtLeastOneLocale => ServiceError::NeedAtLeastOneLocale,
            ConflictKind::PlaceNotInactive => ServiceError::PlaceNotInactive,
        }
    }
}

impl From<TaxonomyError> for ServiceError {
    fn from(val: TaxonomyError) -> Self {
        match val {
            TaxonomyError::ParentEqualsCode(code) => ServiceError::ParentEqualsCode(code),
            TaxonomyError::ParentCycle { code, parent } => {
                ServiceError::ParentCycle { code, parent }
            }
        }
    }
}

/// Rule violations pass through; storage and collaborator failures are logged
/// and collapse into [`ServiceError::Internal`].
impl From<RepositoryError> for ServiceError {
    fn from(val: RepositoryError) -> Self {
        match val {
            RepositoryError::NotFound(what) => ServiceError::NotFound(what),
            RepositoryError::Conflict(kind) => kind.into(),
            RepositoryError::Taxonomy(e) => e.into(),
            RepositoryError::Geocoder(e) => {
                log::error!("Reverse geocoding failed: {e}");
                ServiceError::Internal
            }
            RepositoryError::Database(e) => {
                log::error!("Database error: {e}");
                ServiceError::Internal
            }
            RepositoryError::Pool(e) => {
                log::error!("Connection pool error: {e}");
                ServiceError::Internal
            }
            RepositoryError::ValidationError(e) => {
                log::error!("Stored data violates type constraints: {e}");
                ServiceError::Internal
            }
        }
    }
}

impl From<ClassFormError> for ServiceError {
    fn from(val: ClassFormError) -> Self {
        ServiceError::InvalidInput(val.to_string())
    }
}

impl From<PlaceFormError> for ServiceError {
    fn from(val: PlaceFormError) -> Self {
        match val {
            PlaceFormError::Timetable(e) => ServiceError::Timetable(e),
            other => ServiceError::InvalidInput(other.to_string()),
        }
    }
}
