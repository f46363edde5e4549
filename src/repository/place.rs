use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};

use crate::domain::place::{NewPlace, Place, PlaceText, PlaceUpdate};
use crate::domain::query::{LocaleContext, PlaceFilter, PlaceSort, SortKey, contains_ignore_case};
use crate::domain::timetable::TimeInterval;
use crate::domain::types::{GeoPoint, LocaleCode, PlaceId, PlaceStatus};
use crate::geocoder::Geocoder;
use crate::models::place::{
    NewPlace as DbNewPlace, NewPlaceTimetableEntry, Place as DbPlace, PlaceChangeset,
    PlaceLocale, PlaceTimetableEntry,
};
use crate::repository::{
    ConflictKind, DieselRepository, PlaceListQuery, PlaceReader, PlaceWriter, RepositoryError,
    RepositoryResult,
};
use crate::schema::{place_locales, place_timetable, places};

/// Keeps `IN (...)` lists below SQLite's bound parameter limit.
const HYDRATE_CHUNK: usize = 500;

type BoxedPlaces<'a> = places::BoxedQuery<'a, Sqlite>;

/// Attach locales and timetable rows, keeping the order of `rows`.
fn hydrate(conn: &mut SqliteConnection, rows: Vec<DbPlace>) -> RepositoryResult<Vec<Place>> {
    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let mut locales: HashMap<i32, Vec<PlaceLocale>> = HashMap::new();
    let mut timetables: HashMap<i32, Vec<PlaceTimetableEntry>> = HashMap::new();

    for chunk in ids.chunks(HYDRATE_CHUNK) {
        for locale in place_locales::table
            .filter(place_locales::place_id.eq_any(chunk.to_vec()))
            .select(PlaceLocale::as_select())
            .load(conn)?
        {
            locales.entry(locale.place_id).or_default().push(locale);
        }

        for entry in place_timetable::table
            .filter(place_timetable::place_id.eq_any(chunk.to_vec()))
            .select(PlaceTimetableEntry::as_select())
            .load(conn)?
        {
            timetables.entry(entry.place_id).or_default().push(entry);
        }
    }

    rows.into_iter()
        .map(|row| {
            let id = row.id;
            let place = row.into_domain(
                locales.remove(&id).unwrap_or_default(),
                timetables.remove(&id).unwrap_or_default(),
            )?;
            Ok(place)
        })
        .collect()
}

fn find_place(conn: &mut SqliteConnection, id: PlaceId) -> RepositoryResult<Option<Place>> {
    let row = places::table
        .find(id.get())
        .select(DbPlace::as_select())
        .first(conn)
        .optional()?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

fn require_place(conn: &mut SqliteConnection, id: PlaceId) -> RepositoryResult<Place> {
    find_place(conn, id)?.ok_or_else(|| RepositoryError::not_found("place", id))
}

fn require_place_row(conn: &mut SqliteConnection, id: PlaceId) -> RepositoryResult<DbPlace> {
    places::table
        .find(id.get())
        .select(DbPlace::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("place", id))
}

fn require_class_exists(conn: &mut SqliteConnection, code: &str) -> RepositoryResult<()> {
    use crate::schema::classes;

    let exists = diesel::select(diesel::dsl::exists(classes::table.find(code)))
        .get_result::<bool>(conn)?;
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::not_found("class", code))
    }
}

fn touch(conn: &mut SqliteConnection, id: PlaceId) -> QueryResult<usize> {
    diesel::update(places::table.find(id.get()))
        .set(places::updated_at.eq(Utc::now().naive_utc()))
        .execute(conn)
}

/// Narrow `query` by the part of `filter` SQL can express.
fn apply_filter<'a>(query: BoxedPlaces<'a>, filter: &PlaceFilter) -> BoxedPlaces<'a> {
    match filter {
        PlaceFilter::Cities(ids) => {
            let ids: Vec<i32> = ids.iter().map(|id| id.get()).collect();
            query.filter(places::city_id.eq_any(ids))
        }
        PlaceFilter::Distributors(ids) => {
            let ids: Vec<i32> = ids.iter().map(|id| id.get()).collect();
            query.filter(places::distributor_id.eq_any(ids))
        }
        PlaceFilter::Classes(codes) => {
            let codes: Vec<String> = codes.iter().map(|code| code.to_string()).collect();
            query.filter(places::class_code.eq_any(codes))
        }
        PlaceFilter::Statuses(statuses) => {
            let statuses: Vec<String> = statuses.iter().map(|status| status.to_string()).collect();
            query.filter(places::status.eq_any(statuses))
        }
        PlaceFilter::Verified(verified) => query.filter(places::verified.eq(*verified)),
        PlaceFilter::OpenDuring(window) => {
            // Stored intervals never cross midnight, so plain offset comparisons
            // are enough on each side of the week seam.
            let (start, end) = (window.start(), window.end());
            if window.wraps() {
                query.filter(
                    places::id.eq_any(
                        place_timetable::table
                            .filter(
                                place_timetable::end_offset
                                    .gt(start)
                                    .or(place_timetable::start_offset.lt(end)),
                            )
                            .select(place_timetable::place_id),
                    ),
                )
            } else {
                query.filter(
                    places::id.eq_any(
                        place_timetable::table
                            .filter(place_timetable::start_offset.lt(end))
                            .filter(place_timetable::end_offset.gt(start))
                            .select(place_timetable::place_id),
                    ),
                )
            }
        }
        PlaceFilter::Geo(geo) => {
            let bounds = geo.bounds();
            let query = query.filter(places::latitude.between(bounds.south(), bounds.north()));
            if bounds.crosses_antimeridian() {
                query.filter(
                    places::longitude
                        .ge(bounds.west())
                        .or(places::longitude.le(bounds.east())),
                )
            } else {
                query.filter(places::longitude.between(bounds.west(), bounds.east()))
            }
        }
        PlaceFilter::Name(needle) => match like_pattern(needle) {
            Some(pattern) => query.filter(
                places::id.eq_any(
                    place_locales::table
                        .filter(place_locales::name.like(pattern).escape('\\'))
                        .select(place_locales::place_id),
                ),
            ),
            None => query,
        },
        PlaceFilter::Address(needle) => match like_pattern(needle) {
            Some(pattern) => query.filter(places::address.like(pattern).escape('\\')),
            None => query,
        },
    }
}

/// `LIKE` pattern selecting a superset of the case-insensitive matches of
/// `needle`, or `None` when SQLite cannot narrow the search.
///
/// SQLite folds ASCII only, so non-ASCII needles are matched in memory alone.
/// `İ` and the Kelvin sign lower-case to `i` and `k`, which therefore stay
/// single-character wildcards.
fn like_pattern(needle: &str) -> Option<String> {
    if !needle.is_ascii() {
        return None;
    }
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        match c {
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            'i' | 'I' | 'k' | 'K' => pattern.push('_'),
            _ => pattern.push(c),
        }
    }
    pattern.push('%');
    Some(pattern)
}

/// Whether [`apply_filter`] decides `filter` completely. Text filters are
/// only narrowed there and always re-checked.
fn is_exact_in_sql(filter: &PlaceFilter) -> bool {
    match filter {
        PlaceFilter::Name(_) | PlaceFilter::Address(_) => false,
        PlaceFilter::Geo(geo) => geo.is_exact_in_bounds(),
        _ => true,
    }
}

/// The columns residual filters and sorting need, loaded instead of whole
/// places for every match.
struct Candidate {
    key: SortKey,
    address: String,
}

fn load_candidates(
    conn: &mut SqliteConnection,
    query: BoxedPlaces<'_>,
) -> RepositoryResult<Vec<Candidate>> {
    let rows: Vec<(i32, f64, f64, String, NaiveDateTime)> = query
        .select((
            places::id,
            places::longitude,
            places::latitude,
            places::address,
            places::created_at,
        ))
        .load(conn)?;

    rows.into_iter()
        .map(|(id, longitude, latitude, address, created_at)| {
            Ok(Candidate {
                key: SortKey {
                    id: PlaceId::new(id)?,
                    created_at,
                    point: GeoPoint::new(longitude, latitude)?,
                },
                address,
            })
        })
        .collect()
}

/// Stored names per place, for resolving the name a `Name` filter sees.
fn load_names(
    conn: &mut SqliteConnection,
    candidates: &[Candidate],
) -> RepositoryResult<HashMap<PlaceId, BTreeMap<LocaleCode, String>>> {
    let ids: Vec<i32> = candidates.iter().map(|c| c.key.id.get()).collect();
    let mut names: HashMap<PlaceId, BTreeMap<LocaleCode, String>> = HashMap::new();

    for chunk in ids.chunks(HYDRATE_CHUNK) {
        let rows: Vec<(i32, String, String)> = place_locales::table
            .filter(place_locales::place_id.eq_any(chunk.to_vec()))
            .select((
                place_locales::place_id,
                place_locales::locale,
                place_locales::name,
            ))
            .load(conn)?;
        for (id, locale, name) in rows {
            names
                .entry(PlaceId::new(id)?)
                .or_default()
                .insert(LocaleCode::new(locale)?, name);
        }
    }
    Ok(names)
}

fn candidate_matches(
    filter: &PlaceFilter,
    candidate: &Candidate,
    names: &HashMap<PlaceId, BTreeMap<LocaleCode, String>>,
    locale: &LocaleContext,
) -> bool {
    match filter {
        PlaceFilter::Name(needle) => names
            .get(&candidate.key.id)
            .and_then(|names| locale.resolve(names))
            .is_some_and(|name| contains_ignore_case(name, needle)),
        PlaceFilter::Address(needle) => contains_ignore_case(&candidate.address, needle),
        PlaceFilter::Geo(geo) => geo.matches(&candidate.key.point),
        _ => true,
    }
}

/// Full places for `ids`, in the order of `ids`.
fn load_page(conn: &mut SqliteConnection, ids: &[PlaceId]) -> RepositoryResult<Vec<Place>> {
    let raw: Vec<i32> = ids.iter().map(|id| id.get()).collect();
    let mut rows: HashMap<i32, DbPlace> = places::table
        .filter(places::id.eq_any(raw.clone()))
        .select(DbPlace::as_select())
        .load(conn)?
        .into_iter()
        .map(|row| (row.id, row))
        .collect();

    let ordered = raw.iter().filter_map(|id| rows.remove(id)).collect();
    hydrate(conn, ordered)
}

impl PlaceReader for DieselRepository {
    fn get_place(&self, id: PlaceId) -> RepositoryResult<Option<Place>> {
        let mut conn = self.conn()?;
        find_place(&mut conn, id)
    }

    fn list_places(&self, query: &PlaceListQuery) -> RepositoryResult<(usize, Vec<Place>)> {
        if query.is_unsatisfiable() {
            return Ok((0, vec![]));
        }

        let mut conn = self.conn()?;

        let query_builder = || {
            query
                .filters
                .iter()
                .fold(places::table.into_boxed::<Sqlite>(), apply_filter)
        };

        let residual: Vec<&PlaceFilter> = query
            .filters
            .iter()
            .filter(|filter| !is_exact_in_sql(filter))
            .collect();

        if residual.is_empty() && !matches!(query.sort, PlaceSort::Distance(_)) {
            let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

            let items = match query.sort {
                PlaceSort::CreatedAsc => {
                    query_builder().order((places::created_at.asc(), places::id.asc()))
                }
                _ => query_builder().order((places::created_at.desc(), places::id.desc())),
            };
            let rows = items
                .offset(query.pagination.sql_offset())
                .limit(query.pagination.sql_limit())
                .select(DbPlace::as_select())
                .load(&mut conn)?;

            return Ok((total, hydrate(&mut conn, rows)?));
        }

        let mut candidates = load_candidates(&mut conn, query_builder())?;
        let names = if residual
            .iter()
            .any(|filter| matches!(filter, PlaceFilter::Name(_)))
        {
            load_names(&mut conn, &candidates)?
        } else {
            HashMap::new()
        };

        candidates.retain(|candidate| {
            residual
                .iter()
                .all(|filter| candidate_matches(filter, candidate, &names, &query.locale))
        });
        candidates.sort_by(|a, b| query.sort.compare(&a.key, &b.key));

        let total = candidates.len();
        let page: Vec<PlaceId> = query
            .pagination
            .slice(candidates)
            .into_iter()
            .map(|candidate| candidate.key.id)
            .collect();
        Ok((total, load_page(&mut conn, &page)?))
    }
}

impl PlaceWriter for DieselRepository {
    fn create_place(&self, place: &NewPlace, geocoder: &dyn Geocoder) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            require_class_exists(conn, place.class.as_str())?;

            let address = geocoder.reverse_geocode(&place.point)?;
            let now = Utc::now().naive_utc();

            let id: i32 = diesel::insert_into(places::table)
                .values(DbNewPlace {
                    city_id: place.city_id.get(),
                    distributor_id: place.distributor_id.map(|id| id.get()),
                    class_code: place.class.as_str(),
                    status: PlaceStatus::Active.as_str(),
                    verified: false,
                    longitude: place.point.longitude(),
                    latitude: place.point.latitude(),
                    address: address.as_str(),
                    website: place.website.as_ref().map(|website| website.as_str()),
                    phone: place.phone.as_ref().map(|phone| phone.as_str()),
                    created_at: now,
                    updated_at: now,
                })
                .returning(places::id)
                .get_result(conn)?;
            let id = PlaceId::new(id)?;

            diesel::insert_into(place_locales::table)
                .values(PlaceLocale::new(id, &place.locale, &place.text))
                .execute(conn)?;

            log::info!("Created place {id} at {address}");
            require_place(conn, id)
        })
    }

    fn update_place(&self, id: PlaceId, update: &PlaceUpdate) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            require_place_row(conn, id)?;
            if let Some(class) = &update.class {
                require_class_exists(conn, class.as_str())?;
            }

            let changeset = PlaceChangeset {
                city_id: update.city_id.map(|id| id.get()),
                distributor_id: update
                    .distributor_id
                    .map(|distributor| distributor.map(|id| id.get())),
                class_code: update.class.as_ref().map(|class| class.as_str()),
                longitude: update.point.map(|point| point.longitude()),
                latitude: update.point.map(|point| point.latitude()),
                address: update.address.as_ref().map(|address| address.as_str()),
                website: update
                    .website
                    .as_ref()
                    .map(|website| website.as_ref().map(|website| website.as_str())),
                phone: update
                    .phone
                    .as_ref()
                    .map(|phone| phone.as_ref().map(|phone| phone.as_str())),
                updated_at: Some(Utc::now().naive_utc()),
            };

            diesel::update(places::table.find(id.get()))
                .set(&changeset)
                .execute(conn)?;

            require_place(conn, id)
        })
    }

    fn set_place_status(&self, id: PlaceId, status: PlaceStatus) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let affected = diesel::update(places::table.find(id.get()))
                .set((
                    places::status.eq(status.as_str()),
                    places::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            if affected == 0 {
                return Err(RepositoryError::not_found("place", id));
            }
            require_place(conn, id)
        })
    }

    fn set_place_verified(&self, id: PlaceId, verified: bool) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let affected = diesel::update(places::table.find(id.get()))
                .set((
                    places::verified.eq(verified),
                    places::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            if affected == 0 {
                return Err(RepositoryError::not_found("place", id));
            }
            require_place(conn, id)
        })
    }

    fn replace_timetable(
        &self,
        id: PlaceId,
        intervals: &[TimeInterval],
    ) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            require_place_row(conn, id)?;

            diesel::delete(place_timetable::table.filter(place_timetable::place_id.eq(id.get())))
                .execute(conn)?;

            let rows: Vec<NewPlaceTimetableEntry> = intervals
                .iter()
                .map(|interval| NewPlaceTimetableEntry::new(id, interval))
                .collect();
            if !rows.is_empty() {
                diesel::insert_into(place_timetable::table)
                    .values(&rows)
                    .execute(conn)?;
            }

            touch(conn, id)?;
            require_place(conn, id)
        })
    }

    fn upsert_place_locales(
        &self,
        id: PlaceId,
        entries: &[(LocaleCode, PlaceText)],
    ) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            require_place_row(conn, id)?;

            let rows: Vec<PlaceLocale> = entries
                .iter()
                .map(|(locale, text)| PlaceLocale::new(id, locale, text))
                .collect();
            if !rows.is_empty() {
                diesel::replace_into(place_locales::table)
                    .values(&rows)
                    .execute(conn)?;
            }

            touch(conn, id)?;
            require_place(conn, id)
        })
    }

    fn delete_place_locale(&self, id: PlaceId, locale: &LocaleCode) -> RepositoryResult<Place> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            require_place_row(conn, id)?;

            let stored: Vec<String> = place_locales::table
                .filter(place_locales::place_id.eq(id.get()))
                .select(place_locales::locale)
                .load(conn)?;
            if !stored.iter().any(|stored| stored == locale.as_str()) {
                return Err(RepositoryError::not_found("place locale", locale));
            }
            if stored.len() <= 1 {
                return Err(ConflictKind::NeedAtLeastOneLocale.into());
            }

            diesel::delete(
                place_locales::table
                    .filter(place_locales::place_id.eq(id.get()))
                    .filter(place_locales::locale.eq(locale.as_str())),
            )
            .execute(conn)?;

            touch(conn, id)?;
            require_place(conn, id)
        })
    }

    fn delete_place(&self, id: PlaceId) -> RepositoryResult<()> {
        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            let row = require_place_row(conn, id)?;
            if row.status != PlaceStatus::Inactive.as_str() {
                return Err(ConflictKind::PlaceNotInactive.into());
            }

            diesel::delete(place_timetable::table.filter(place_timetable::place_id.eq(id.get())))
                .execute(conn)?;
            diesel::delete(place_locales::table.filter(place_locales::place_id.eq(id.get())))
                .execute(conn)?;
            diesel::delete(places::table.find(id.get())).execute(conn)?;
            Ok(())
        })
    }
}
