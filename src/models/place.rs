use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::place::{Place as DomainPlace, PlaceText};
use crate::domain::timetable::TimeInterval;
use crate::domain::types::{
    CityId, ClassCode, DistributorId, GeoPoint, LocaleCode, PlaceAddress, PlaceDescription,
    PlaceId, PlaceName, PlacePhone, PlaceStatus, PlaceWebsite, TypeConstraintError,
};

/// Diesel model representing the `places` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::places)]
pub struct Place {
    pub id: i32,
    pub city_id: i32,
    pub distributor_id: Option<i32>,
    pub class_code: String,
    pub status: String,
    pub verified: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`Place`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::places)]
pub struct NewPlace<'a> {
    pub city_id: i32,
    pub distributor_id: Option<i32>,
    pub class_code: &'a str,
    pub status: &'a str,
    pub verified: bool,
    pub longitude: f64,
    pub latitude: f64,
    pub address: &'a str,
    pub website: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Patch applied by attribute updates; `None` fields are left untouched.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::places)]
pub struct PlaceChangeset<'a> {
    pub city_id: Option<i32>,
    pub distributor_id: Option<Option<i32>>,
    pub class_code: Option<&'a str>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub address: Option<&'a str>,
    pub website: Option<Option<&'a str>>,
    pub phone: Option<Option<&'a str>>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Diesel model representing the `place_locales` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::place_locales)]
pub struct PlaceLocale {
    pub place_id: i32,
    pub locale: String,
    pub name: String,
    pub description: Option<String>,
}

impl PlaceLocale {
    pub fn new(place_id: PlaceId, locale: &LocaleCode, text: &PlaceText) -> Self {
        Self {
            place_id: place_id.get(),
            locale: locale.as_str().to_string(),
            name: text.name.as_str().to_string(),
            description: text
                .description
                .as_ref()
                .map(|description| description.as_str().to_string()),
        }
    }
}

/// Diesel model representing the `place_timetable` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::place_timetable)]
pub struct PlaceTimetableEntry {
    pub id: i32,
    pub place_id: i32,
    pub start_offset: i32,
    pub end_offset: i32,
}

/// Insertable form of [`PlaceTimetableEntry`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::place_timetable)]
pub struct NewPlaceTimetableEntry {
    pub place_id: i32,
    pub start_offset: i32,
    pub end_offset: i32,
}

impl NewPlaceTimetableEntry {
    pub fn new(place_id: PlaceId, interval: &TimeInterval) -> Self {
        Self {
            place_id: place_id.get(),
            start_offset: interval.start(),
            end_offset: interval.end(),
        }
    }
}

impl Place {
    /// Combines the row with its locale and timetable rows into a domain place.
    pub fn into_domain(
        self,
        locales: Vec<PlaceLocale>,
        mut timetable: Vec<PlaceTimetableEntry>,
    ) -> Result<DomainPlace, TypeConstraintError> {
        let locales = locales
            .into_iter()
            .map(|row| {
                let text = PlaceText {
                    name: PlaceName::new(row.name)?,
                    description: row.description.map(PlaceDescription::new).transpose()?,
                };
                Ok((LocaleCode::new(row.locale)?, text))
            })
            .collect::<Result<BTreeMap<_, _>, TypeConstraintError>>()?;

        timetable.sort_by_key(|entry| (entry.start_offset, entry.end_offset));
        let timetable = timetable
            .into_iter()
            .map(|entry| {
                TimeInterval::from_offsets(entry.start_offset, entry.end_offset)
                    .map_err(|e| TypeConstraintError::InvalidValue(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DomainPlace {
            id: PlaceId::new(self.id)?,
            city_id: CityId::new(self.city_id)?,
            distributor_id: self.distributor_id.map(DistributorId::new).transpose()?,
            class: ClassCode::new(self.class_code)?,
            status: PlaceStatus::try_from(self.status)?,
            verified: self.verified,
            point: GeoPoint::new(self.longitude, self.latitude)?,
            address: PlaceAddress::new(self.address)?,
            website: self.website.map(PlaceWebsite::new).transpose()?,
            phone: self.phone.map(PlacePhone::new).transpose()?,
            locales,
            timetable,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
