//! Core library exports for the Directory service.
//!
//! This crate exposes the class taxonomy, weekly timetables, locale
//! negotiation and place search used by the Directory backend, together with
//! the Diesel persistence layer and the service functions controllers call.

pub mod db;
pub mod domain;
pub mod dto;
pub mod error_conversions;
pub mod forms;
pub mod geocoder;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod schema;
pub mod services;
