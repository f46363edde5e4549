pub mod class;
pub mod config;
pub mod place;
