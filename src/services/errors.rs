use thiserror::Error;

use crate::domain::timetable::TimetableError;
use crate::domain::types::ClassCode;

/// Coarse classification of a [`ServiceError`], for transports that map
/// failures onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Internal,
}

/// Generic error type used by service layer functions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Requested resource was not found.
    #[error("{0} not found")]
    NotFound(String),
    #[error("class code `{0}` is already taken")]
    CodeAlreadyTaken(ClassCode),
    #[error("parent class `{0}` does not exist")]
    ParentNotFound(ClassCode),
    #[error("class `{0}` cannot be its own parent")]
    ParentEqualsCode(ClassCode),
    #[error("moving `{code}` under `{parent}` would create a cycle")]
    ParentCycle { code: ClassCode, parent: ClassCode },
    #[error("class has child classes")]
    HasChildren,
    #[error("class is assigned to places")]
    HasPlaces,
    #[error("at least one locale must remain")]
    NeedAtLeastOneLocale,
    #[error("only inactive places can be deleted")]
    PlaceNotInactive,
    #[error(transparent)]
    Timetable(#[from] TimetableError),
    /// Caller supplied malformed or unsupported values.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An unexpected internal error occurred.
    #[error("internal error")]
    Internal,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::CodeAlreadyTaken(_)
            | Self::ParentNotFound(_)
            | Self::ParentEqualsCode(_)
            | Self::ParentCycle { .. }
            | Self::HasChildren
            | Self::HasPlaces
            | Self::NeedAtLeastOneLocale
            | Self::PlaceNotInactive => ErrorKind::Conflict,
            Self::Timetable(
                TimetableError::CrossDayInterval { .. }
                | TimetableError::NonPositiveDuration { .. }
                | TimetableError::OverlapDetected { .. },
            ) => ErrorKind::Conflict,
            Self::Timetable(TimetableError::InvalidWeekday(_) | TimetableError::InvalidTime(_))
            | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Internal => ErrorKind::Internal,
        }
    }
}

/// Convenient alias for results returned from service functions.
pub type ServiceResult<T> = Result<T, ServiceError>;
