pub mod class;
pub mod geo;
pub mod locale;
pub mod place;
pub mod query;
pub mod taxonomy;
pub mod timetable;
pub mod types;
