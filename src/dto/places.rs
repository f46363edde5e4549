use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::locale::resolve_entity_locale;
use crate::domain::place::Place;
use crate::domain::query::LocaleContext;
use crate::domain::timetable::{TimeInterval, english_name};

/// Opening interval rendered back to weekday names and `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalDto {
    pub from_day: String,
    pub from_time: String,
    pub to_day: String,
    pub to_time: String,
}

impl From<&TimeInterval> for IntervalDto {
    fn from(value: &TimeInterval) -> Self {
        Self {
            from_day: english_name(value.from().weekday).to_string(),
            from_time: value.from().time(),
            to_day: english_name(value.to().weekday).to_string(),
            to_time: value.to().time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceDto {
    pub id: i32,
    pub city_id: i32,
    pub distributor_id: Option<i32>,
    pub class: String,
    pub status: String,
    pub verified: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub locale: String,
    pub name: String,
    pub description: Option<String>,
    pub timetable: Vec<IntervalDto>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PlaceDto {
    pub fn new(place: Place, locale: &LocaleContext) -> Self {
        let resolved =
            resolve_entity_locale(&locale.requested, &locale.fallback, place.locales.keys());
        let text = resolved.as_ref().and_then(|code| place.locales.get(code));

        Self {
            id: place.id.get(),
            city_id: place.city_id.get(),
            distributor_id: place.distributor_id.map(|id| id.get()),
            class: place.class.to_string(),
            status: place.status.to_string(),
            verified: place.verified,
            longitude: place.point.longitude(),
            latitude: place.point.latitude(),
            address: place.address.to_string(),
            website: place.website.as_ref().map(ToString::to_string),
            phone: place.phone.as_ref().map(ToString::to_string),
            locale: resolved.as_ref().map(ToString::to_string).unwrap_or_default(),
            name: text
                .map(|text| text.name.to_string())
                .unwrap_or_default(),
            description: text
                .and_then(|text| text.description.as_ref())
                .map(ToString::to_string),
            timetable: place.timetable.iter().map(IntervalDto::from).collect(),
            created_at: place.created_at,
            updated_at: place.updated_at,
        }
    }
}
