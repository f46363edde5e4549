use crate::domain::locale::LocaleRegistry;
use crate::domain::place::Place;
use crate::domain::query::{LocaleContext, PlaceFilter};
use crate::domain::timetable::{WeekdayTable, normalize_timetable};
use crate::domain::types::{LocaleCode, PlaceId, PlaceStatus};
use crate::dto::places::PlaceDto;
use crate::forms::places::{
    CreatePlaceFormPayload, PlaceListFormPayload, PlaceLocalesFormPayload, TimetableFormPayload,
    UpdatePlaceFormPayload,
};
use crate::geocoder::Geocoder;
use crate::pagination::Page;
use crate::repository::{ClassReader, PlaceListQuery, PlaceReader, PlaceWriter};
use crate::services::classes::expand_subtrees;

use super::{ServiceError, ServiceResult, checked};

fn require_supported(locales: &LocaleRegistry, locale: &LocaleCode) -> ServiceResult<()> {
    if locales.is_supported(locale) {
        Ok(())
    } else {
        log::warn!("Rejected unsupported locale `{locale}`");
        Err(ServiceError::InvalidInput(format!(
            "locale `{locale}` is not supported"
        )))
    }
}

/// Creates an active, unverified place whose address is reverse-geocoded
/// from its coordinates.
pub fn create_place<R>(
    payload: CreatePlaceFormPayload,
    locales: &LocaleRegistry,
    geocoder: &dyn Geocoder,
    repo: &R,
) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    require_supported(locales, &payload.place.locale)?;
    checked("place creation", repo.create_place(&payload.place, geocoder))
}

pub fn get_place<R>(id: PlaceId, locale: &LocaleContext, repo: &R) -> ServiceResult<PlaceDto>
where
    R: PlaceReader,
{
    match checked("place lookup", repo.get_place(id))? {
        Some(place) => Ok(PlaceDto::new(place, locale)),
        None => Err(ServiceError::NotFound(format!("place `{id}`"))),
    }
}

pub fn update_place<R>(payload: UpdatePlaceFormPayload, repo: &R) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    checked("place update", repo.update_place(payload.id, &payload.update))
}

pub fn set_place_status<R>(id: PlaceId, status: PlaceStatus, repo: &R) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    let place = checked("place status change", repo.set_place_status(id, status))?;
    log::info!("Place {id} is now {status}");
    Ok(place)
}

pub fn set_place_verified<R>(id: PlaceId, verified: bool, repo: &R) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    checked("place verification", repo.set_place_verified(id, verified))
}

/// Validates the submitted intervals and replaces the whole timetable.
pub fn set_place_timetable<R>(
    payload: TimetableFormPayload,
    weekdays: &WeekdayTable,
    repo: &R,
) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    let intervals = normalize_timetable(&payload.intervals, weekdays).map_err(|e| {
        log::warn!("Rejected timetable of place {}: {e}", payload.id);
        ServiceError::from(e)
    })?;
    checked(
        "timetable update",
        repo.replace_timetable(payload.id, &intervals),
    )
}

pub fn set_place_locales<R>(
    payload: PlaceLocalesFormPayload,
    locales: &LocaleRegistry,
    repo: &R,
) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    for (locale, _) in &payload.entries {
        require_supported(locales, locale)?;
    }
    checked(
        "place locale update",
        repo.upsert_place_locales(payload.id, &payload.entries),
    )
}

pub fn delete_place_locale<R>(id: PlaceId, locale: &LocaleCode, repo: &R) -> ServiceResult<Place>
where
    R: PlaceWriter,
{
    checked("place locale removal", repo.delete_place_locale(id, locale))
}

/// Deletes a place that has been deactivated first.
pub fn delete_place<R>(id: PlaceId, repo: &R) -> ServiceResult<()>
where
    R: PlaceWriter,
{
    checked("place deletion", repo.delete_place(id))?;
    log::info!("Deleted place {id}");
    Ok(())
}

/// Runs a place search, expanding class filters to whole subtrees.
pub fn list_places<R>(
    payload: PlaceListFormPayload,
    locale: &LocaleContext,
    repo: &R,
) -> ServiceResult<Page<PlaceDto>>
where
    R: PlaceReader + ClassReader,
{
    let mut query = PlaceListQuery::new(locale.clone())
        .sort(payload.sort)
        .paginate(payload.pagination);
    for filter in payload.filters {
        query = query.filter(filter);
    }
    if let Some(classes) = &payload.classes {
        query = query.filter(PlaceFilter::Classes(expand_subtrees(classes, repo)?));
    }

    let (total, places) = checked("place search", repo.list_places(&query))?;
    let items = places
        .into_iter()
        .map(|place| PlaceDto::new(place, locale))
        .collect();
    Ok(Page::new(items, total, payload.pagination))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Weekday;

    use super::*;
    use crate::domain::class::NewClass;
    use crate::domain::geo::GeoFilter;
    use crate::domain::place::{NewPlace, PlaceText};
    use crate::domain::query::PlaceSort;
    use crate::domain::timetable::{Moment, RawInterval, TimetableError, WeekWindow};
    use crate::domain::types::{
        CityId, ClassCode, ClassIcon, ClassName, GeoPoint, PlaceName, RadiusMeters,
    };
    use crate::geocoder::test::StaticGeocoder;
    use crate::pagination::Pagination;
    use crate::repository::ClassWriter;
    use crate::repository::test::TestRepository;

    fn locale(value: &str) -> LocaleCode {
        LocaleCode::new(value).unwrap()
    }

    fn registry() -> LocaleRegistry {
        LocaleRegistry::new([locale("en"), locale("uk")], locale("en"), locale("en"))
    }

    fn context() -> LocaleContext {
        LocaleContext::new(locale("en"), locale("en"))
    }

    fn add_class(repo: &TestRepository, code: &str, parent: Option<&str>) {
        repo.create_class(&NewClass {
            code: ClassCode::new(code).unwrap(),
            parent: parent.map(|parent| ClassCode::new(parent).unwrap()),
            icon: ClassIcon::new("pin").unwrap(),
            locale: locale("en"),
            name: ClassName::new(code).unwrap(),
        })
        .unwrap();
    }

    fn add_place(repo: &TestRepository, class: &str, name: &str, lon: f64, lat: f64) -> Place {
        let payload = CreatePlaceFormPayload {
            place: NewPlace {
                city_id: CityId::new(1).unwrap(),
                distributor_id: None,
                class: ClassCode::new(class).unwrap(),
                point: GeoPoint::new(lon, lat).unwrap(),
                website: None,
                phone: None,
                locale: locale("en"),
                text: PlaceText {
                    name: PlaceName::new(name).unwrap(),
                    description: None,
                },
            },
        };
        create_place(
            payload,
            &registry(),
            &StaticGeocoder::new("Khreshchatyk St, 1, Kyiv"),
            repo,
        )
        .unwrap()
    }

    fn timetable(id: PlaceId, intervals: &[(&str, &str, &str)]) -> TimetableFormPayload {
        TimetableFormPayload {
            id,
            intervals: intervals
                .iter()
                .map(|(day, from, to)| RawInterval::new(*day, *from, *day, *to))
                .collect(),
        }
    }

    fn search() -> PlaceListFormPayload {
        PlaceListFormPayload {
            filters: vec![],
            classes: None,
            sort: PlaceSort::CreatedAsc,
            pagination: Pagination::default(),
        }
    }

    #[test]
    fn created_places_are_active_unverified_and_geocoded() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);

        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);
        assert_eq!(place.status, PlaceStatus::Active);
        assert!(!place.verified);
        assert_eq!(place.address.as_str(), "Khreshchatyk St, 1, Kyiv");
    }

    #[test]
    fn geocoder_failure_creates_nothing() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);

        let payload = CreatePlaceFormPayload {
            place: NewPlace {
                city_id: CityId::new(1).unwrap(),
                distributor_id: None,
                class: ClassCode::new("cafe").unwrap(),
                point: GeoPoint::new(30.52, 50.45).unwrap(),
                website: None,
                phone: None,
                locale: locale("en"),
                text: PlaceText {
                    name: PlaceName::new("Blue Cup").unwrap(),
                    description: None,
                },
            },
        };
        let err =
            create_place(payload, &registry(), &StaticGeocoder::failing(), &repo).unwrap_err();
        assert_eq!(err, ServiceError::Internal);

        let page = list_places(search(), &context(), &repo).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn overlapping_intervals_are_rejected() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        let err = set_place_timetable(
            timetable(
                place.id,
                &[("monday", "09:00", "12:00"), ("monday", "11:00", "13:00")],
            ),
            &WeekdayTable::default(),
            &repo,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Timetable(TimetableError::OverlapDetected { .. })
        ));
    }

    #[test]
    fn touching_intervals_are_accepted_and_rendered() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        set_place_timetable(
            timetable(
                place.id,
                &[("Monday", "12:00", "13:00"), ("monday", "09:00", "12:00")],
            ),
            &WeekdayTable::default(),
            &repo,
        )
        .unwrap();

        let dto = get_place(place.id, &context(), &repo).unwrap();
        assert_eq!(dto.timetable.len(), 2);
        assert_eq!(dto.timetable[0].from_day, "monday");
        assert_eq!(dto.timetable[0].from_time, "09:00");
        assert_eq!(dto.timetable[1].to_time, "13:00");
    }

    #[test]
    fn cross_day_intervals_are_rejected() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        let payload = TimetableFormPayload {
            id: place.id,
            intervals: vec![RawInterval::new("sunday", "22:00", "monday", "02:00")],
        };
        let err = set_place_timetable(payload, &WeekdayTable::default(), &repo).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Timetable(TimetableError::CrossDayInterval { .. })
        ));
    }

    #[test]
    fn only_inactive_places_can_be_deleted() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        assert_eq!(
            delete_place(place.id, &repo).unwrap_err(),
            ServiceError::PlaceNotInactive
        );
        set_place_status(place.id, PlaceStatus::Inactive, &repo).unwrap();
        delete_place(place.id, &repo).unwrap();
        assert!(matches!(
            get_place(place.id, &context(), &repo).unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn deleting_the_last_place_locale_is_rejected() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        assert_eq!(
            delete_place_locale(place.id, &locale("en"), &repo).unwrap_err(),
            ServiceError::NeedAtLeastOneLocale
        );
    }

    #[test]
    fn classes_with_places_cannot_be_deleted() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        let err = crate::services::classes::delete_class(&ClassCode::new("cafe").unwrap(), &repo)
            .unwrap_err();
        assert_eq!(err, ServiceError::HasPlaces);
    }

    #[test]
    fn class_filter_covers_the_whole_subtree() {
        let repo = TestRepository::new();
        add_class(&repo, "food", None);
        add_class(&repo, "cafe", Some("food"));
        add_class(&repo, "shops", None);
        add_place(&repo, "food", "Market", 30.52, 50.45);
        add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);
        add_place(&repo, "shops", "Hardware", 30.52, 50.45);

        let mut payload = search();
        payload.classes = Some(BTreeSet::from([ClassCode::new("food").unwrap()]));
        let page = list_places(payload, &context(), &repo).unwrap();

        let names: Vec<&str> = page.items.iter().map(|dto| dto.name.as_str()).collect();
        assert_eq!(names, vec!["Market", "Blue Cup"]);
    }

    #[test]
    fn wrapping_window_matches_late_sunday_hours() {
        let repo = TestRepository::new();
        add_class(&repo, "bar", None);
        let late = add_place(&repo, "bar", "Night Owl", 30.52, 50.45);
        let early = add_place(&repo, "bar", "Early Bird", 30.52, 50.45);
        add_place(&repo, "bar", "Closed", 30.52, 50.45);

        set_place_timetable(
            timetable(late.id, &[("sunday", "23:00", "23:30")]),
            &WeekdayTable::default(),
            &repo,
        )
        .unwrap();
        set_place_timetable(
            timetable(early.id, &[("monday", "01:00", "02:00")]),
            &WeekdayTable::default(),
            &repo,
        )
        .unwrap();

        let mut payload = search();
        payload.filters.push(PlaceFilter::OpenDuring(WeekWindow::new(
            Moment::new(Weekday::Sun, 22 * 60 + 30).unwrap(),
            Moment::new(Weekday::Mon, 60).unwrap(),
        )));
        let page = list_places(payload, &context(), &repo).unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Night Owl");
    }

    #[test]
    fn total_counts_the_full_result_set() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        for index in 0..5 {
            add_place(&repo, "cafe", &format!("Cafe {index}"), 30.52, 50.45);
        }

        let mut payload = search();
        payload.pagination = Pagination::new(Some(2), Some(2));
        let page = list_places(payload, &context(), &repo).unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages(), 3);
        let names: Vec<&str> = page.items.iter().map(|dto| dto.name.as_str()).collect();
        assert_eq!(names, vec!["Cafe 2", "Cafe 3"]);
    }

    #[test]
    fn radius_search_sorted_by_distance() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        add_place(&repo, "cafe", "Far", 30.60, 50.45);
        add_place(&repo, "cafe", "Near", 30.524, 50.451);
        add_place(&repo, "cafe", "Middle", 30.54, 50.45);

        let center = GeoPoint::new(30.5234, 50.4501).unwrap();
        let mut payload = search();
        payload.sort = PlaceSort::Distance(center);
        payload.filters.push(PlaceFilter::Geo(GeoFilter::Radius {
            center,
            radius: RadiusMeters::new(2_000.0).unwrap(),
        }));
        let page = list_places(payload, &context(), &repo).unwrap();

        let names: Vec<&str> = page.items.iter().map(|dto| dto.name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Middle"]);
    }

    #[test]
    fn unsupported_place_locales_are_rejected() {
        let repo = TestRepository::new();
        add_class(&repo, "cafe", None);
        let place = add_place(&repo, "cafe", "Blue Cup", 30.52, 50.45);

        let payload = PlaceLocalesFormPayload {
            id: place.id,
            entries: vec![(
                locale("de"),
                PlaceText {
                    name: PlaceName::new("Blaue Tasse").unwrap(),
                    description: None,
                },
            )],
        };
        let err = set_place_locales(payload, &registry(), &repo).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
