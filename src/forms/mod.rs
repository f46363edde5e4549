//! Raw, deserialised input and its conversion into typed payloads.

pub mod classes;
pub mod places;

/// Treats blank optional text as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
