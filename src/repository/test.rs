use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime};

use crate::domain::class::{Class, NewClass};
use crate::domain::place::{NewPlace, Place, PlaceText, PlaceUpdate};
use crate::domain::taxonomy::{AncestryPath, TaxonomyError, check_parent_change};
use crate::domain::timetable::TimeInterval;
use crate::domain::types::{
    ClassCode, ClassIcon, ClassName, ClassStatus, LocaleCode, PlaceId, PlaceStatus,
};
use crate::geocoder::Geocoder;
use crate::repository::{
    ClassListQuery, ClassReader, ClassScope, ClassWriter, ConflictKind, PlaceListQuery,
    PlaceReader, PlaceWriter, RepositoryError, RepositoryResult,
};

#[derive(Default)]
struct State {
    classes: BTreeMap<ClassCode, Class>,
    places: BTreeMap<PlaceId, Place>,
    last_place_id: i32,
    clock: i64,
}

impl State {
    /// Strictly increasing timestamps keep creation order deterministic.
    fn now(&mut self) -> NaiveDateTime {
        self.clock += 1;
        DateTime::from_timestamp(1_700_000_000 + self.clock, 0)
            .unwrap()
            .naive_utc()
    }

    fn class_mut(&mut self, code: &ClassCode) -> RepositoryResult<&mut Class> {
        self.classes
            .get_mut(code)
            .ok_or_else(|| RepositoryError::not_found("class", code))
    }

    fn place_mut(&mut self, id: PlaceId) -> RepositoryResult<&mut Place> {
        self.places
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("place", id))
    }
}

/// In-memory repository used for unit tests.
///
/// A single lock guards the whole state, so every write is serialized the
/// same way the SQLite write lock serializes the Diesel repository.
#[derive(Default)]
pub struct TestRepository {
    state: Mutex<State>,
}

impl TestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl ClassReader for TestRepository {
    fn get_class(&self, code: &ClassCode) -> RepositoryResult<Option<Class>> {
        Ok(self.state().classes.get(code).cloned())
    }

    fn list_classes(&self, query: ClassListQuery) -> RepositoryResult<(usize, Vec<Class>)> {
        let mut items: Vec<Class> = self
            .state()
            .classes
            .values()
            .filter(|class| match &query.scope {
                ClassScope::All => true,
                ClassScope::Roots => class.parent.is_none(),
                ClassScope::ChildrenOf(parent) => class.parent.as_ref() == Some(parent),
            })
            .cloned()
            .collect();
        items.sort_by_key(|class| class.ancestry.to_string());

        let total = items.len();
        if let Some(pagination) = query.pagination {
            items = pagination.slice(items);
        }
        Ok((total, items))
    }

    fn list_descendants(&self, code: &ClassCode) -> RepositoryResult<Vec<ClassCode>> {
        let state = self.state();
        let root = &state
            .classes
            .get(code)
            .ok_or_else(|| RepositoryError::not_found("class", code))?
            .ancestry;

        let mut descendants: Vec<&Class> = state
            .classes
            .values()
            .filter(|class| class.ancestry.is_descendant_of(root))
            .collect();
        descendants.sort_by_key(|class| class.ancestry.to_string());
        Ok(descendants.into_iter().map(|class| class.code.clone()).collect())
    }

    fn class_exists(&self, code: &ClassCode) -> RepositoryResult<bool> {
        Ok(self.state().classes.contains_key(code))
    }

    fn class_is_active(&self, code: &ClassCode) -> RepositoryResult<bool> {
        Ok(self
            .state()
            .classes
            .get(code)
            .is_some_and(Class::is_active))
    }
}

impl ClassWriter for TestRepository {
    fn create_class(&self, class: &NewClass) -> RepositoryResult<Class> {
        let mut state = self.state();
        if state.classes.contains_key(&class.code) {
            return Err(ConflictKind::CodeAlreadyTaken(class.code.clone()).into());
        }

        let ancestry = match &class.parent {
            Some(parent) => {
                let parent_path = &state
                    .classes
                    .get(parent)
                    .ok_or_else(|| ConflictKind::ParentNotFound(parent.clone()))?
                    .ancestry;
                AncestryPath::child_of(parent_path, class.code.clone())
            }
            None => AncestryPath::root(class.code.clone()),
        };

        let now = state.now();
        let created = Class {
            code: class.code.clone(),
            parent: class.parent.clone(),
            status: ClassStatus::Active,
            icon: class.icon.clone(),
            ancestry,
            locales: BTreeMap::from([(class.locale.clone(), class.name.clone())]),
            created_at: now,
            updated_at: now,
        };
        state.classes.insert(created.code.clone(), created.clone());
        Ok(created)
    }

    fn set_class_parent(
        &self,
        code: &ClassCode,
        parent: Option<&ClassCode>,
    ) -> RepositoryResult<Class> {
        if parent == Some(code) {
            return Err(TaxonomyError::ParentEqualsCode(code.clone()).into());
        }

        let mut state = self.state();
        let old_path = state
            .classes
            .get(code)
            .ok_or_else(|| RepositoryError::not_found("class", code))?
            .ancestry
            .clone();

        let parent_path = match parent {
            Some(parent) => Some(
                state
                    .classes
                    .get(parent)
                    .ok_or_else(|| ConflictKind::ParentNotFound(parent.clone()))?
                    .ancestry
                    .clone(),
            ),
            None => None,
        };
        check_parent_change(code, parent.zip(parent_path.as_ref()))?;

        let new_path = match &parent_path {
            Some(parent_path) => AncestryPath::child_of(parent_path, code.clone()),
            None => AncestryPath::root(code.clone()),
        };

        for class in state.classes.values_mut() {
            if let Some(rebased) = class.ancestry.rebase(&old_path, &new_path) {
                class.ancestry = rebased;
            }
        }

        let now = state.now();
        let class = state.class_mut(code)?;
        class.parent = parent.cloned();
        class.ancestry = new_path;
        class.updated_at = now;
        Ok(class.clone())
    }

    fn set_class_icon(&self, code: &ClassCode, icon: &ClassIcon) -> RepositoryResult<Class> {
        let mut state = self.state();
        let now = state.now();
        let class = state.class_mut(code)?;
        class.icon = icon.clone();
        class.updated_at = now;
        Ok(class.clone())
    }

    fn set_class_status(&self, code: &ClassCode, status: ClassStatus) -> RepositoryResult<Class> {
        let mut state = self.state();
        let now = state.now();
        let class = state.class_mut(code)?;
        class.status = status;
        class.updated_at = now;
        Ok(class.clone())
    }

    fn upsert_class_locales(
        &self,
        code: &ClassCode,
        entries: &[(LocaleCode, ClassName)],
    ) -> RepositoryResult<Class> {
        let mut state = self.state();
        let now = state.now();
        let class = state.class_mut(code)?;
        for (locale, name) in entries {
            class.locales.insert(locale.clone(), name.clone());
        }
        class.updated_at = now;
        Ok(class.clone())
    }

    fn delete_class_locale(
        &self,
        code: &ClassCode,
        locale: &LocaleCode,
    ) -> RepositoryResult<Class> {
        let mut state = self.state();
        let now = state.now();
        let class = state.class_mut(code)?;
        if !class.locales.contains_key(locale) {
            return Err(RepositoryError::not_found("class locale", locale));
        }
        if class.locales.len() <= 1 {
            return Err(ConflictKind::NeedAtLeastOneLocale.into());
        }
        class.locales.remove(locale);
        class.updated_at = now;
        Ok(class.clone())
    }

    fn delete_class(&self, code: &ClassCode) -> RepositoryResult<()> {
        let mut state = self.state();
        if !state.classes.contains_key(code) {
            return Err(RepositoryError::not_found("class", code));
        }
        if state
            .classes
            .values()
            .any(|class| class.parent.as_ref() == Some(code))
        {
            return Err(ConflictKind::HasChildren.into());
        }
        if state.places.values().any(|place| &place.class == code) {
            return Err(ConflictKind::HasPlaces.into());
        }
        state.classes.remove(code);
        Ok(())
    }
}

impl PlaceReader for TestRepository {
    fn get_place(&self, id: PlaceId) -> RepositoryResult<Option<Place>> {
        Ok(self.state().places.get(&id).cloned())
    }

    fn list_places(&self, query: &PlaceListQuery) -> RepositoryResult<(usize, Vec<Place>)> {
        if query.is_unsatisfiable() {
            return Ok((0, vec![]));
        }

        let mut items: Vec<Place> = self
            .state()
            .places
            .values()
            .filter(|place| {
                query
                    .filters
                    .iter()
                    .all(|filter| filter.matches(place, &query.locale))
            })
            .cloned()
            .collect();
        query.sort.apply(&mut items);

        let total = items.len();
        Ok((total, query.pagination.slice(items)))
    }
}

impl PlaceWriter for TestRepository {
    fn create_place(&self, place: &NewPlace, geocoder: &dyn Geocoder) -> RepositoryResult<Place> {
        let mut state = self.state();
        if !state.classes.contains_key(&place.class) {
            return Err(RepositoryError::not_found("class", &place.class));
        }

        let address = geocoder.reverse_geocode(&place.point)?;
        let id = PlaceId::new(state.last_place_id + 1)?;
        state.last_place_id += 1;

        let now = state.now();
        let created = Place {
            id,
            city_id: place.city_id,
            distributor_id: place.distributor_id,
            class: place.class.clone(),
            status: PlaceStatus::Active,
            verified: false,
            point: place.point,
            address,
            website: place.website.clone(),
            phone: place.phone.clone(),
            locales: BTreeMap::from([(place.locale.clone(), place.text.clone())]),
            timetable: vec![],
            created_at: now,
            updated_at: now,
        };
        state.places.insert(id, created.clone());
        Ok(created)
    }

    fn update_place(&self, id: PlaceId, update: &PlaceUpdate) -> RepositoryResult<Place> {
        let mut state = self.state();
        if let Some(class) = &update.class
            && !state.classes.contains_key(class)
        {
            return Err(RepositoryError::not_found("class", class));
        }

        let now = state.now();
        let place = state.place_mut(id)?;
        if let Some(city_id) = update.city_id {
            place.city_id = city_id;
        }
        if let Some(distributor_id) = update.distributor_id {
            place.distributor_id = distributor_id;
        }
        if let Some(class) = &update.class {
            place.class = class.clone();
        }
        if let Some(point) = update.point {
            place.point = point;
        }
        if let Some(address) = &update.address {
            place.address = address.clone();
        }
        if let Some(website) = &update.website {
            place.website = website.clone();
        }
        if let Some(phone) = &update.phone {
            place.phone = phone.clone();
        }
        place.updated_at = now;
        Ok(place.clone())
    }

    fn set_place_status(&self, id: PlaceId, status: PlaceStatus) -> RepositoryResult<Place> {
        let mut state = self.state();
        let now = state.now();
        let place = state.place_mut(id)?;
        place.status = status;
        place.updated_at = now;
        Ok(place.clone())
    }

    fn set_place_verified(&self, id: PlaceId, verified: bool) -> RepositoryResult<Place> {
        let mut state = self.state();
        let now = state.now();
        let place = state.place_mut(id)?;
        place.verified = verified;
        place.updated_at = now;
        Ok(place.clone())
    }

    fn replace_timetable(
        &self,
        id: PlaceId,
        intervals: &[TimeInterval],
    ) -> RepositoryResult<Place> {
        let mut state = self.state();
        let now = state.now();
        let place = state.place_mut(id)?;
        place.timetable = intervals.to_vec();
        place.updated_at = now;
        Ok(place.clone())
    }

    fn upsert_place_locales(
        &self,
        id: PlaceId,
        entries: &[(LocaleCode, PlaceText)],
    ) -> RepositoryResult<Place> {
        let mut state = self.state();
        let now = state.now();
        let place = state.place_mut(id)?;
        for (locale, text) in entries {
            place.locales.insert(locale.clone(), text.clone());
        }
        place.updated_at = now;
        Ok(place.clone())
    }

    fn delete_place_locale(&self, id: PlaceId, locale: &LocaleCode) -> RepositoryResult<Place> {
        let mut state = self.state();
        let now = state.now();
        let place = state.place_mut(id)?;
        if !place.locales.contains_key(locale) {
            return Err(RepositoryError::not_found("place locale", locale));
        }
        if place.locales.len() <= 1 {
            return Err(ConflictKind::NeedAtLeastOneLocale.into());
        }
        place.locales.remove(locale);
        place.updated_at = now;
        Ok(place.clone())
    }

    fn delete_place(&self, id: PlaceId) -> RepositoryResult<()> {
        let mut state = self.state();
        let place = state.place_mut(id)?;
        if place.status != PlaceStatus::Inactive {
            return Err(ConflictKind::PlaceNotInactive.into());
        }
        state.places.remove(&id);
        Ok(())
    }
}
