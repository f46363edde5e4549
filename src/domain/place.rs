use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::timetable::TimeInterval;
use crate::domain::types::{
    CityId, ClassCode, DistributorId, GeoPoint, LocaleCode, PlaceAddress, PlaceDescription,
    PlaceId, PlaceName, PlacePhone, PlaceStatus, PlaceWebsite,
};

/// Localized text of a place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaceText {
    pub name: PlaceName,
    pub description: Option<PlaceDescription>,
}

/// A geolocated point of interest belonging to a class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Place {
    pub id: PlaceId,
    pub city_id: CityId,
    pub distributor_id: Option<DistributorId>,
    pub class: ClassCode,
    pub status: PlaceStatus,
    pub verified: bool,
    pub point: GeoPoint,
    pub address: PlaceAddress,
    pub website: Option<PlaceWebsite>,
    pub phone: Option<PlacePhone>,
    /// Never empty.
    pub locales: BTreeMap<LocaleCode, PlaceText>,
    /// Ordered by week offset; empty when no hours were declared.
    pub timetable: Vec<TimeInterval>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Information required to create a new [`Place`].
///
/// The address is not supplied by the caller: it is reverse-geocoded from
/// `point` while the place is being inserted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPlace {
    pub city_id: CityId,
    pub distributor_id: Option<DistributorId>,
    pub class: ClassCode,
    pub point: GeoPoint,
    pub website: Option<PlaceWebsite>,
    pub phone: Option<PlacePhone>,
    pub locale: LocaleCode,
    pub text: PlaceText,
}

/// Partial update of place attributes. `None` leaves a field untouched; the
/// nested `Option` of nullable fields clears them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaceUpdate {
    pub city_id: Option<CityId>,
    pub distributor_id: Option<Option<DistributorId>>,
    pub class: Option<ClassCode>,
    pub point: Option<GeoPoint>,
    pub address: Option<PlaceAddress>,
    pub website: Option<Option<PlaceWebsite>>,
    pub phone: Option<Option<PlacePhone>>,
}

impl PlaceUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
