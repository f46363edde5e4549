use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::geo::{BoundingBox, GeoFilter, Polygon};
use crate::domain::place::{NewPlace, PlaceText, PlaceUpdate};
use crate::domain::query::{PlaceFilter, PlaceSort};
use crate::domain::timetable::{Moment, RawInterval, TimetableError, WeekWindow, WeekdayTable};
use crate::domain::types::{
    CityId, ClassCode, DistributorId, GeoPoint, LocaleCode, PlaceAddress, PlaceDescription,
    PlaceId, PlaceName, PlacePhone, PlaceStatus, PlaceWebsite, RadiusMeters, TypeConstraintError,
};
use crate::forms::non_blank;
use crate::pagination::Pagination;

#[derive(Debug, Error)]
pub enum PlaceFormError {
    #[error("Place form validation failed: {0}")]
    Validation(String),
    #[error("Place form contains invalid data: {0}")]
    TypeConstraint(String),
    #[error(transparent)]
    Timetable(#[from] TimetableError),
    #[error("Place form is inconsistent: {0}")]
    Inconsistent(&'static str),
}

impl From<ValidationErrors> for PlaceFormError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<TypeConstraintError> for PlaceFormError {
    fn from(value: TypeConstraintError) -> Self {
        Self::TypeConstraint(value.to_string())
    }
}

fn place_text(name: String, description: Option<String>) -> Result<PlaceText, TypeConstraintError> {
    Ok(PlaceText {
        name: PlaceName::new(name)?,
        description: non_blank(description)
            .map(PlaceDescription::new)
            .transpose()?,
    })
}

#[derive(Deserialize, Validate)]
pub struct CreatePlaceForm {
    #[validate(range(min = 1))]
    pub city_id: i32,
    #[validate(range(min = 1))]
    pub distributor_id: Option<i32>,
    #[validate(length(min = 1))]
    pub class: String,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    pub website: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(min = 2))]
    pub locale: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePlaceFormPayload {
    pub place: NewPlace,
}

impl TryFrom<CreatePlaceForm> for CreatePlaceFormPayload {
    type Error = PlaceFormError;

    fn try_from(value: CreatePlaceForm) -> Result<Self, Self::Error> {
        value.validate()?;
        Ok(Self {
            place: NewPlace {
                city_id: CityId::new(value.city_id)?,
                distributor_id: value.distributor_id.map(DistributorId::new).transpose()?,
                class: ClassCode::new(value.class)?,
                point: GeoPoint::new(value.longitude, value.latitude)?,
                website: non_blank(value.website).map(PlaceWebsite::new).transpose()?,
                phone: non_blank(value.phone).map(PlacePhone::new).transpose()?,
                locale: LocaleCode::new(value.locale)?,
                text: place_text(value.name, value.description)?,
            },
        })
    }
}

/// Partial update. Absent fields are kept; `clear_*` flags null the optional
/// attributes.
#[derive(Deserialize, Validate, Default)]
pub struct UpdatePlaceForm {
    #[validate(range(min = 1))]
    pub id: i32,
    #[validate(range(min = 1))]
    pub city_id: Option<i32>,
    #[validate(range(min = 1))]
    pub distributor_id: Option<i32>,
    #[serde(default)]
    pub clear_distributor: bool,
    pub class: Option<String>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    pub address: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub clear_website: bool,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[serde(default)]
    pub clear_phone: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlaceFormPayload {
    pub id: PlaceId,
    pub update: PlaceUpdate,
}

/// Folds a value and its clear flag into the nested option of a patch.
fn patch<T>(value: Option<T>, clear: bool) -> Result<Option<Option<T>>, PlaceFormError> {
    match (value, clear) {
        (Some(_), true) => Err(PlaceFormError::Inconsistent(
            "a field cannot be set and cleared at once",
        )),
        (Some(value), false) => Ok(Some(Some(value))),
        (None, true) => Ok(Some(None)),
        (None, false) => Ok(None),
    }
}

impl TryFrom<UpdatePlaceForm> for UpdatePlaceFormPayload {
    type Error = PlaceFormError;

    fn try_from(value: UpdatePlaceForm) -> Result<Self, Self::Error> {
        value.validate()?;

        let point = match (value.longitude, value.latitude) {
            (Some(longitude), Some(latitude)) => Some(GeoPoint::new(longitude, latitude)?),
            (None, None) => None,
            _ => {
                return Err(PlaceFormError::Inconsistent(
                    "longitude and latitude must be updated together",
                ));
            }
        };

        let distributor_id = value.distributor_id.map(DistributorId::new).transpose()?;
        let website = non_blank(value.website).map(PlaceWebsite::new).transpose()?;
        let phone = non_blank(value.phone).map(PlacePhone::new).transpose()?;

        let update = PlaceUpdate {
            city_id: value.city_id.map(CityId::new).transpose()?,
            distributor_id: patch(distributor_id, value.clear_distributor)?,
            class: non_blank(value.class).map(ClassCode::new).transpose()?,
            point,
            address: non_blank(value.address).map(PlaceAddress::new).transpose()?,
            website: patch(website, value.clear_website)?,
            phone: patch(phone, value.clear_phone)?,
        };
        if update.is_empty() {
            return Err(PlaceFormError::Inconsistent("nothing to update"));
        }

        Ok(Self {
            id: PlaceId::new(value.id)?,
            update,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalEntry {
    pub from_day: String,
    pub from_time: String,
    pub to_day: String,
    pub to_time: String,
}

/// Replacement timetable; an empty list clears it.
#[derive(Deserialize, Validate)]
pub struct TimetableForm {
    #[validate(range(min = 1))]
    pub id: i32,
    #[serde(default)]
    pub intervals: Vec<IntervalEntry>,
}

/// Intervals stay raw; they are normalized against the configured weekday
/// table when applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TimetableFormPayload {
    pub id: PlaceId,
    pub intervals: Vec<RawInterval>,
}

impl TryFrom<TimetableForm> for TimetableFormPayload {
    type Error = PlaceFormError;

    fn try_from(value: TimetableForm) -> Result<Self, Self::Error> {
        value.validate()?;
        Ok(Self {
            id: PlaceId::new(value.id)?,
            intervals: value
                .intervals
                .into_iter()
                .map(|entry| {
                    RawInterval::new(entry.from_day, entry.from_time, entry.to_day, entry.to_time)
                })
                .collect(),
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct PlaceLocaleEntry {
    pub locale: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct PlaceLocalesForm {
    #[validate(range(min = 1))]
    pub id: i32,
    #[validate(length(min = 1))]
    pub locales: Vec<PlaceLocaleEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceLocalesFormPayload {
    pub id: PlaceId,
    pub entries: Vec<(LocaleCode, PlaceText)>,
}

impl TryFrom<PlaceLocalesForm> for PlaceLocalesFormPayload {
    type Error = PlaceFormError;

    fn try_from(value: PlaceLocalesForm) -> Result<Self, Self::Error> {
        value.validate()?;
        let entries = value
            .locales
            .into_iter()
            .map(|entry| {
                Ok((
                    LocaleCode::new(entry.locale)?,
                    place_text(entry.name, entry.description)?,
                ))
            })
            .collect::<Result<Vec<_>, TypeConstraintError>>()?;

        Ok(Self {
            id: PlaceId::new(value.id)?,
            entries,
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PointEntry {
    pub longitude: f64,
    pub latitude: f64,
}

impl TryFrom<PointEntry> for GeoPoint {
    type Error = TypeConstraintError;

    fn try_from(value: PointEntry) -> Result<Self, Self::Error> {
        GeoPoint::new(value.longitude, value.latitude)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RadiusEntry {
    pub longitude: f64,
    pub latitude: f64,
    pub meters: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundingBoxEntry {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowEntry {
    pub from_day: String,
    pub from_time: String,
    pub to_day: String,
    pub to_time: String,
}

/// Search parameters. A present but empty id/code/status list matches
/// nothing; an absent one does not filter.
#[derive(Deserialize, Validate, Default)]
pub struct PlaceListForm {
    pub cities: Option<Vec<i32>>,
    pub distributors: Option<Vec<i32>>,
    pub classes: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub verified: Option<bool>,
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    pub radius: Option<RadiusEntry>,
    pub bbox: Option<BoundingBoxEntry>,
    pub polygon: Option<Vec<PointEntry>>,
    pub open: Option<WindowEntry>,
    /// `created_desc` (default), `created_asc` or `distance`.
    pub sort: Option<String>,
    /// Reference point of the distance sort.
    pub near: Option<PointEntry>,
    #[validate(range(min = 1))]
    pub page: Option<usize>,
    #[validate(range(min = 1))]
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceListFormPayload {
    /// Every filter except classes.
    pub filters: Vec<PlaceFilter>,
    /// Requested class roots; expanded to subtrees by the service.
    pub classes: Option<BTreeSet<ClassCode>>,
    pub sort: PlaceSort,
    pub pagination: Pagination,
}

impl PlaceListForm {
    /// Converts the form, parsing window weekdays with `weekdays`.
    pub fn into_payload(
        self,
        weekdays: &WeekdayTable,
    ) -> Result<PlaceListFormPayload, PlaceFormError> {
        self.validate()?;

        let mut filters = Vec::new();

        if let Some(ids) = self.cities {
            let ids = ids
                .into_iter()
                .map(CityId::new)
                .collect::<Result<BTreeSet<_>, _>>()?;
            filters.push(PlaceFilter::Cities(ids));
        }
        if let Some(ids) = self.distributors {
            let ids = ids
                .into_iter()
                .map(DistributorId::new)
                .collect::<Result<BTreeSet<_>, _>>()?;
            filters.push(PlaceFilter::Distributors(ids));
        }
        if let Some(statuses) = self.statuses {
            let statuses = statuses
                .into_iter()
                .map(PlaceStatus::try_from)
                .collect::<Result<BTreeSet<_>, _>>()?;
            filters.push(PlaceFilter::Statuses(statuses));
        }
        if let Some(verified) = self.verified {
            filters.push(PlaceFilter::Verified(verified));
        }
        if let Some(name) = non_blank(self.name) {
            filters.push(PlaceFilter::Name(name.trim().to_string()));
        }
        if let Some(address) = non_blank(self.address) {
            filters.push(PlaceFilter::Address(address.trim().to_string()));
        }

        let geo_filters =
            self.radius.is_some() as u8 + self.bbox.is_some() as u8 + self.polygon.is_some() as u8;
        if geo_filters > 1 {
            return Err(PlaceFormError::Inconsistent(
                "at most one of radius, bbox and polygon may be given",
            ));
        }
        if let Some(radius) = self.radius {
            filters.push(PlaceFilter::Geo(GeoFilter::Radius {
                center: GeoPoint::new(radius.longitude, radius.latitude)?,
                radius: RadiusMeters::new(radius.meters)?,
            }));
        }
        if let Some(bbox) = self.bbox {
            filters.push(PlaceFilter::Geo(GeoFilter::BoundingBox(BoundingBox::new(
                GeoPoint::new(bbox.west, bbox.south)?,
                GeoPoint::new(bbox.east, bbox.north)?,
            )?)));
        }
        if let Some(polygon) = self.polygon {
            let vertices = polygon
                .into_iter()
                .map(GeoPoint::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            filters.push(PlaceFilter::Geo(GeoFilter::Polygon(Polygon::new(vertices)?)));
        }

        if let Some(window) = self.open {
            let from = Moment::parse(&window.from_day, &window.from_time, weekdays)?;
            let to = Moment::parse(&window.to_day, &window.to_time, weekdays)?;
            filters.push(PlaceFilter::OpenDuring(WeekWindow::new(from, to)));
        }

        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") | Some("created_desc") => PlaceSort::CreatedDesc,
            Some("created_asc") => PlaceSort::CreatedAsc,
            Some("distance") => {
                let near = self.near.ok_or(PlaceFormError::Inconsistent(
                    "distance sort requires a reference point",
                ))?;
                PlaceSort::Distance(GeoPoint::try_from(near)?)
            }
            Some(other) => {
                return Err(PlaceFormError::Validation(format!(
                    "unknown sort `{other}`"
                )));
            }
        };

        let classes = self
            .classes
            .map(|codes| {
                codes
                    .into_iter()
                    .map(ClassCode::new)
                    .collect::<Result<BTreeSet<_>, _>>()
            })
            .transpose()?;

        Ok(PlaceListFormPayload {
            filters,
            classes,
            sort,
            pagination: Pagination::new(self.page, self.per_page),
        })
    }
}
