pub use errors::{ErrorKind, ServiceError, ServiceResult};

use crate::repository::RepositoryResult;

pub mod classes;
pub mod errors;
pub mod places;

/// Converts a repository result, logging rule violations as warnings.
///
/// Internal failures are logged while being converted.
fn checked<T>(action: &str, result: RepositoryResult<T>) -> ServiceResult<T> {
    result.map_err(|e| {
        let error = ServiceError::from(e);
        if error.kind() != ErrorKind::Internal {
            log::warn!("Rejected {action}: {error}");
        }
        error
    })
}
