use crate::db::{DbConnection, DbPool};
use crate::domain::class::{Class, NewClass};
use crate::domain::place::{NewPlace, Place, PlaceText, PlaceUpdate};
use crate::domain::query::{LocaleContext, PlaceFilter, PlaceSort};
use crate::domain::timetable::TimeInterval;
use crate::domain::types::{
    ClassCode, ClassIcon, ClassName, ClassStatus, LocaleCode, PlaceId, PlaceStatus,
};
use crate::geocoder::Geocoder;
use crate::pagination::Pagination;

pub use errors::{ConflictKind, RepositoryError, RepositoryResult};

pub mod class;
pub mod errors;
pub mod place;
#[cfg(test)]
pub mod test;

/// Repository implementation backed by Diesel and SQLite.
///
/// The underlying `r2d2::Pool` is cheap to clone, allowing the repository to
/// be passed around freely between handlers.
#[derive(Clone)]
pub struct DieselRepository {
    pool: DbPool, // r2d2::Pool is cheap to clone
}

impl DieselRepository {
    /// Create a new repository from an established database pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a pooled database connection.
    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

/// Which classes to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClassScope {
    #[default]
    All,
    /// Roots only.
    Roots,
    /// Direct children of a class.
    ChildrenOf(ClassCode),
}

/// Query parameters used when listing classes.
#[derive(Debug, Clone, Default)]
pub struct ClassListQuery {
    pub scope: ClassScope,
    /// Pagination parameters.
    pub pagination: Option<Pagination>,
}

impl ClassListQuery {
    pub fn new(scope: ClassScope) -> Self {
        Self {
            scope,
            pagination: None,
        }
    }
    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination::new(Some(page), Some(per_page)));
        self
    }
}

/// Query parameters used when searching places.
///
/// All filters are combined with AND. Class filters must already be expanded
/// to whole subtrees.
#[derive(Debug, Clone)]
pub struct PlaceListQuery {
    pub filters: Vec<PlaceFilter>,
    pub sort: PlaceSort,
    /// Locale used to resolve names for text filters.
    pub locale: LocaleContext,
    /// Pagination parameters.
    pub pagination: Pagination,
}

impl PlaceListQuery {
    pub fn new(locale: LocaleContext) -> Self {
        Self {
            filters: Vec::new(),
            sort: PlaceSort::default(),
            locale,
            pagination: Pagination::default(),
        }
    }
    pub fn filter(mut self, filter: PlaceFilter) -> Self {
        self.filters.push(filter);
        self
    }
    pub fn sort(mut self, sort: PlaceSort) -> Self {
        self.sort = sort;
        self
    }
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Whether some filter rules out every place.
    pub fn is_unsatisfiable(&self) -> bool {
        self.filters.iter().any(PlaceFilter::is_unsatisfiable)
    }
}

/// Read-only operations for class entities.
pub trait ClassReader {
    /// Retrieve a class with all of its locales.
    fn get_class(&self, code: &ClassCode) -> RepositoryResult<Option<Class>>;
    /// List classes ordered by ancestry path.
    fn list_classes(&self, query: ClassListQuery) -> RepositoryResult<(usize, Vec<Class>)>;
    /// Codes of every class strictly below `code`.
    fn list_descendants(&self, code: &ClassCode) -> RepositoryResult<Vec<ClassCode>>;
    fn class_exists(&self, code: &ClassCode) -> RepositoryResult<bool>;
    fn class_is_active(&self, code: &ClassCode) -> RepositoryResult<bool>;
}

/// Write operations for class entities.
///
/// Structural changes are checked and applied under one write lock so that
/// concurrent callers cannot jointly introduce a cycle.
pub trait ClassWriter {
    /// Persist a new class with its initial locale.
    fn create_class(&self, class: &NewClass) -> RepositoryResult<Class>;
    /// Move a class under `parent`, or make it a root when `None`.
    fn set_class_parent(
        &self,
        code: &ClassCode,
        parent: Option<&ClassCode>,
    ) -> RepositoryResult<Class>;
    fn set_class_icon(&self, code: &ClassCode, icon: &ClassIcon) -> RepositoryResult<Class>;
    fn set_class_status(&self, code: &ClassCode, status: ClassStatus) -> RepositoryResult<Class>;
    /// Insert or replace the given translations.
    fn upsert_class_locales(
        &self,
        code: &ClassCode,
        entries: &[(LocaleCode, ClassName)],
    ) -> RepositoryResult<Class>;
    /// Remove one translation, refusing to remove the last one.
    fn delete_class_locale(&self, code: &ClassCode, locale: &LocaleCode)
    -> RepositoryResult<Class>;
    /// Delete a class without children or places.
    fn delete_class(&self, code: &ClassCode) -> RepositoryResult<()>;
}

/// Read-only operations for place entities.
pub trait PlaceReader {
    /// Retrieve a place with its locales and timetable.
    fn get_place(&self, id: PlaceId) -> RepositoryResult<Option<Place>>;
    /// Search places; returns the total match count and the requested page.
    fn list_places(&self, query: &PlaceListQuery) -> RepositoryResult<(usize, Vec<Place>)>;
}

/// Write operations for place entities.
pub trait PlaceWriter {
    /// Insert a place with its first locale and geocoded address in one
    /// transaction.
    fn create_place(&self, place: &NewPlace, geocoder: &dyn Geocoder) -> RepositoryResult<Place>;
    fn update_place(&self, id: PlaceId, update: &PlaceUpdate) -> RepositoryResult<Place>;
    fn set_place_status(&self, id: PlaceId, status: PlaceStatus) -> RepositoryResult<Place>;
    fn set_place_verified(&self, id: PlaceId, verified: bool) -> RepositoryResult<Place>;
    /// Replace the whole timetable with already validated intervals.
    fn replace_timetable(&self, id: PlaceId, intervals: &[TimeInterval])
    -> RepositoryResult<Place>;
    fn upsert_place_locales(
        &self,
        id: PlaceId,
        entries: &[(LocaleCode, PlaceText)],
    ) -> RepositoryResult<Place>;
    fn delete_place_locale(&self, id: PlaceId, locale: &LocaleCode) -> RepositoryResult<Place>;
    /// Delete an inactive place.
    fn delete_place(&self, id: PlaceId) -> RepositoryResult<()>;
}
