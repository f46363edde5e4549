//! Place search predicates.
//!
//! A search is a conjunction of independent [`PlaceFilter`]s. Each variant can
//! be evaluated against a loaded [`Place`] on its own, which is what the
//! in-memory repository does and what the Diesel repository falls back to for
//! predicates SQL cannot express directly.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::geo::{GeoFilter, distance_meters};
use crate::domain::locale::resolve_entity_locale;
use crate::domain::place::Place;
use crate::domain::timetable::WeekWindow;
use crate::domain::types::{
    CityId, ClassCode, DistributorId, GeoPoint, LocaleCode, PlaceId, PlaceStatus,
};

/// Locale context needed to evaluate text predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleContext {
    pub requested: LocaleCode,
    pub fallback: LocaleCode,
}

impl LocaleContext {
    pub fn new(requested: LocaleCode, fallback: LocaleCode) -> Self {
        Self {
            requested,
            fallback,
        }
    }

    /// Entry of `entries` in the locale it resolves to.
    pub fn resolve<'a, V>(&self, entries: &'a BTreeMap<LocaleCode, V>) -> Option<&'a V> {
        let locale = resolve_entity_locale(&self.requested, &self.fallback, entries.keys())?;
        entries.get(&locale)
    }

    /// Name of `place` in the locale it resolves to.
    pub fn place_name<'a>(&self, place: &'a Place) -> Option<&'a str> {
        self.resolve(&place.locales).map(|text| text.name.as_str())
    }
}

/// One predicate of a place search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaceFilter {
    Cities(BTreeSet<CityId>),
    Distributors(BTreeSet<DistributorId>),
    /// Already expanded to whole subtrees.
    Classes(BTreeSet<ClassCode>),
    Statuses(BTreeSet<PlaceStatus>),
    Verified(bool),
    /// Case-insensitive substring of the resolved-locale name.
    Name(String),
    /// Case-insensitive substring of the address.
    Address(String),
    Geo(GeoFilter),
    OpenDuring(WeekWindow),
}

impl PlaceFilter {
    pub fn matches(&self, place: &Place, locale: &LocaleContext) -> bool {
        match self {
            Self::Cities(ids) => ids.contains(&place.city_id),
            Self::Distributors(ids) => place
                .distributor_id
                .is_some_and(|id| ids.contains(&id)),
            Self::Classes(codes) => codes.contains(&place.class),
            Self::Statuses(statuses) => statuses.contains(&place.status),
            Self::Verified(verified) => place.verified == *verified,
            Self::Name(needle) => locale
                .place_name(place)
                .is_some_and(|name| contains_ignore_case(name, needle)),
            Self::Address(needle) => contains_ignore_case(place.address.as_str(), needle),
            Self::Geo(geo) => geo.matches(&place.point),
            Self::OpenDuring(window) => place
                .timetable
                .iter()
                .any(|interval| window.overlaps(interval)),
        }
    }

    /// Whether no place can ever satisfy this predicate.
    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            Self::Cities(ids) => ids.is_empty(),
            Self::Distributors(ids) => ids.is_empty(),
            Self::Classes(codes) => codes.is_empty(),
            Self::Statuses(statuses) => statuses.is_empty(),
            Self::OpenDuring(window) => window.is_empty(),
            _ => false,
        }
    }
}

/// Unicode-aware, case-insensitive substring test used by text filters.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Ordering of search results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum PlaceSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    /// Nearest first from the given point.
    Distance(GeoPoint),
}

/// Columns a [`PlaceSort`] orders by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub id: PlaceId,
    pub created_at: NaiveDateTime,
    pub point: GeoPoint,
}

impl SortKey {
    pub fn of(place: &Place) -> Self {
        Self {
            id: place.id,
            created_at: place.created_at,
            point: place.point,
        }
    }
}

impl PlaceSort {
    /// Ties fall back to id, in the direction of the creation order.
    pub fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        match self {
            Self::CreatedAsc => a
                .created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id)),
            Self::CreatedDesc => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id)),
            Self::Distance(origin) => distance_meters(origin, &a.point)
                .total_cmp(&distance_meters(origin, &b.point))
                .then_with(|| a.id.cmp(&b.id)),
        }
    }

    /// Orders `places` in place.
    pub fn apply(&self, places: &mut [Place]) {
        places.sort_by(|a, b| self.compare(&SortKey::of(a), &SortKey::of(b)));
    }
}
