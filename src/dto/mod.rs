//! Localized read models handed to callers.

pub mod classes;
pub mod places;
