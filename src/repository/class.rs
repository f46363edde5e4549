use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::domain::class::{Class, NewClass};
use crate::domain::taxonomy::{AncestryPath, TaxonomyError, check_parent_change};
use crate::domain::types::{ClassCode, ClassIcon, ClassName, ClassStatus, LocaleCode};
use crate::models::class::{Class as DbClass, ClassLocale, NewClass as DbNewClass};
use crate::repository::{
    ClassListQuery, ClassReader, ClassScope, ClassWriter, ConflictKind, DieselRepository,
    RepositoryError, RepositoryResult,
};

fn find_row(conn: &mut SqliteConnection, code: &str) -> QueryResult<Option<DbClass>> {
    use crate::schema::classes;

    classes::table
        .find(code)
        .select(DbClass::as_select())
        .first(conn)
        .optional()
}

/// Attach locale rows to class rows, keeping the order of `rows`.
fn hydrate(conn: &mut SqliteConnection, rows: Vec<DbClass>) -> RepositoryResult<Vec<Class>> {
    use crate::schema::class_locales;

    let codes: Vec<String> = rows.iter().map(|row| row.code.clone()).collect();
    let mut locales: HashMap<String, Vec<ClassLocale>> = HashMap::new();
    for locale in class_locales::table
        .filter(class_locales::class_code.eq_any(codes))
        .select(ClassLocale::as_select())
        .load(conn)?
    {
        locales
            .entry(locale.class_code.clone())
            .or_default()
            .push(locale);
    }

    rows.into_iter()
        .map(|row| {
            let row_locales = locales.remove(&row.code).unwrap_or_default();
            Ok(row.into_domain(row_locales)?)
        })
        .collect()
}

pub(crate) fn require_class(
    conn: &mut SqliteConnection,
    code: &ClassCode,
) -> RepositoryResult<Class> {
    let row = find_row(conn, code.as_str())?
        .ok_or_else(|| RepositoryError::not_found("class", code))?;
    hydrate(conn, vec![row])?
        .pop()
        .ok_or_else(|| RepositoryError::not_found("class", code))
}

fn touch(conn: &mut SqliteConnection, code: &ClassCode) -> QueryResult<usize> {
    use crate::schema::classes;

    diesel::update(classes::table.find(code.as_str()))
        .set(classes::updated_at.eq(Utc::now().naive_utc()))
        .execute(conn)
}

impl ClassReader for DieselRepository {
    fn get_class(&self, code: &ClassCode) -> RepositoryResult<Option<Class>> {
        let mut conn = self.conn()?;

        match find_row(&mut conn, code.as_str())? {
            Some(row) => Ok(hydrate(&mut conn, vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn list_classes(&self, query: ClassListQuery) -> RepositoryResult<(usize, Vec<Class>)> {
        use crate::schema::classes;

        let mut conn = self.conn()?;

        let query_builder = || {
            let items = classes::table.into_boxed::<diesel::sqlite::Sqlite>();
            match &query.scope {
                ClassScope::All => items,
                ClassScope::Roots => items.filter(classes::parent.is_null()),
                ClassScope::ChildrenOf(parent) => {
                    items.filter(classes::parent.eq(parent.as_str().to_string()))
                }
            }
        };

        let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = query_builder();
        if let Some(pagination) = &query.pagination {
            items = items
                .offset(pagination.sql_offset())
                .limit(pagination.sql_limit());
        }

        let rows = items
            .order(classes::ancestry.asc())
            .select(DbClass::as_select())
            .load(&mut conn)?;

        Ok((total, hydrate(&mut conn, rows)?))
    }

    fn list_descendants(&self, code: &ClassCode) -> RepositoryResult<Vec<ClassCode>> {
        use crate::schema::classes;

        let mut conn = self.conn()?;

        let row = find_row(&mut conn, code.as_str())?
            .ok_or_else(|| RepositoryError::not_found("class", code))?;
        let root = AncestryPath::parse(&row.ancestry)?;

        // LIKE treats `_` as a wildcard, so candidates are re-checked below.
        let candidates: Vec<String> = classes::table
            .filter(classes::ancestry.like(format!("{}%", root.descendant_prefix())))
            .order(classes::ancestry.asc())
            .select(classes::ancestry)
            .load(&mut conn)?;

        let mut descendants = Vec::with_capacity(candidates.len());
        for stored in candidates {
            let path = AncestryPath::parse(&stored)?;
            if path.is_descendant_of(&root) {
                descendants.push(path.code().clone());
            }
        }
        Ok(descendants)
    }

    fn class_exists(&self, code: &ClassCode) -> RepositoryResult<bool> {
        use crate::schema::classes;

        let mut conn = self.conn()?;
        let exists = diesel::select(diesel::dsl::exists(classes::table.find(code.as_str())))
            .get_result::<bool>(&mut conn)?;
        Ok(exists)
    }

    fn class_is_active(&self, code: &ClassCode) -> RepositoryResult<bool> {
        use crate::schema::classes;

        let mut conn = self.conn()?;
        let status = classes::table
            .find(code.as_str())
            .select(classes::status)
            .first::<String>(&mut conn)
            .optional()?;
        Ok(status.is_some_and(|status| status == ClassStatus::Active.as_str()))
    }
}

impl ClassWriter for DieselRepository {
    fn create_class(&self, class: &NewClass) -> RepositoryResult<Class> {
        use crate::schema::{class_locales, classes};

        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            if find_row(conn, class.code.as_str())?.is_some() {
                return Err(ConflictKind::CodeAlreadyTaken(class.code.clone()).into());
            }

            let ancestry = match &class.parent {
                Some(parent) => {
                    let parent_row = find_row(conn, parent.as_str())?
                        .ok_or_else(|| ConflictKind::ParentNotFound(parent.clone()))?;
                    let parent_path = AncestryPath::parse(&parent_row.ancestry)?;
                    AncestryPath::child_of(&parent_path, class.code.clone())
                }
                None => AncestryPath::root(class.code.clone()),
            };

            let now = Utc::now().naive_utc();
            diesel::insert_into(classes::table)
                .values(DbNewClass {
                    code: class.code.as_str(),
                    parent: class.parent.as_ref().map(|parent| parent.as_str()),
                    status: ClassStatus::Active.as_str(),
                    icon: class.icon.as_str(),
                    ancestry: ancestry.to_string(),
                    created_at: now,
                    updated_at: now,
                })
                .execute(conn)?;

            diesel::insert_into(class_locales::table)
                .values(ClassLocale::new(&class.code, &class.locale, &class.name))
                .execute(conn)?;

            require_class(conn, &class.code)
        })
    }

    fn set_class_parent(
        &self,
        code: &ClassCode,
        parent: Option<&ClassCode>,
    ) -> RepositoryResult<Class> {
        use crate::schema::classes;

        if parent == Some(code) {
            return Err(TaxonomyError::ParentEqualsCode(code.clone()).into());
        }

        let mut conn = self.conn()?;

        // The write lock is taken before the cycle check and held until the
        // subtree has been rewritten.
        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            let current = find_row(conn, code.as_str())?
                .ok_or_else(|| RepositoryError::not_found("class", code))?;

            let parent_path = match parent {
                Some(parent) => {
                    let row = find_row(conn, parent.as_str())?
                        .ok_or_else(|| ConflictKind::ParentNotFound(parent.clone()))?;
                    Some(AncestryPath::parse(&row.ancestry)?)
                }
                None => None,
            };

            check_parent_change(code, parent.zip(parent_path.as_ref()))?;

            let old_path = AncestryPath::parse(&current.ancestry)?;
            let new_path = match &parent_path {
                Some(parent_path) => AncestryPath::child_of(parent_path, code.clone()),
                None => AncestryPath::root(code.clone()),
            };
            let now = Utc::now().naive_utc();

            diesel::update(classes::table.find(code.as_str()))
                .set((
                    classes::parent.eq(parent.map(|parent| parent.as_str())),
                    classes::ancestry.eq(new_path.to_string()),
                    classes::updated_at.eq(now),
                ))
                .execute(conn)?;

            let subtree: Vec<(String, String)> = classes::table
                .filter(classes::ancestry.like(format!("{}%", old_path.descendant_prefix())))
                .select((classes::code, classes::ancestry))
                .load(conn)?;

            for (descendant, stored) in subtree {
                let Some(rebased) = AncestryPath::parse(&stored)?.rebase(&old_path, &new_path)
                else {
                    continue;
                };
                diesel::update(classes::table.find(descendant))
                    .set(classes::ancestry.eq(rebased.to_string()))
                    .execute(conn)?;
            }

            log::info!("Moved class {code} from {old_path} to {new_path}");
            require_class(conn, code)
        })
    }

    fn set_class_icon(&self, code: &ClassCode, icon: &ClassIcon) -> RepositoryResult<Class> {
        use crate::schema::classes;

        let mut conn = self.conn()?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let affected = diesel::update(classes::table.find(code.as_str()))
                .set((
                    classes::icon.eq(icon.as_str()),
                    classes::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            if affected == 0 {
                return Err(RepositoryError::not_found("class", code));
            }
            require_class(conn, code)
        })
    }

    fn set_class_status(&self, code: &ClassCode, status: ClassStatus) -> RepositoryResult<Class> {
        use crate::schema::classes;

        let mut conn = self.conn()?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            let affected = diesel::update(classes::table.find(code.as_str()))
                .set((
                    classes::status.eq(status.as_str()),
                    classes::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            if affected == 0 {
                return Err(RepositoryError::not_found("class", code));
            }
            require_class(conn, code)
        })
    }

    fn upsert_class_locales(
        &self,
        code: &ClassCode,
        entries: &[(LocaleCode, ClassName)],
    ) -> RepositoryResult<Class> {
        use crate::schema::class_locales;

        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            if find_row(conn, code.as_str())?.is_none() {
                return Err(RepositoryError::not_found("class", code));
            }

            let rows: Vec<ClassLocale> = entries
                .iter()
                .map(|(locale, name)| ClassLocale::new(code, locale, name))
                .collect();
            if !rows.is_empty() {
                diesel::replace_into(class_locales::table)
                    .values(&rows)
                    .execute(conn)?;
            }

            touch(conn, code)?;
            require_class(conn, code)
        })
    }

    fn delete_class_locale(
        &self,
        code: &ClassCode,
        locale: &LocaleCode,
    ) -> RepositoryResult<Class> {
        use crate::schema::class_locales;

        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            let stored: Vec<String> = class_locales::table
                .filter(class_locales::class_code.eq(code.as_str()))
                .select(class_locales::locale)
                .load(conn)?;

            if stored.is_empty() {
                return Err(RepositoryError::not_found("class", code));
            }
            if !stored.iter().any(|stored| stored == locale.as_str()) {
                return Err(RepositoryError::not_found("class locale", locale));
            }
            if stored.len() <= 1 {
                return Err(ConflictKind::NeedAtLeastOneLocale.into());
            }

            diesel::delete(
                class_locales::table
                    .filter(class_locales::class_code.eq(code.as_str()))
                    .filter(class_locales::locale.eq(locale.as_str())),
            )
            .execute(conn)?;

            touch(conn, code)?;
            require_class(conn, code)
        })
    }

    fn delete_class(&self, code: &ClassCode) -> RepositoryResult<()> {
        use crate::schema::{class_locales, classes, places};

        let mut conn = self.conn()?;

        conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            if find_row(conn, code.as_str())?.is_none() {
                return Err(RepositoryError::not_found("class", code));
            }

            let children = classes::table
                .filter(classes::parent.eq(code.as_str()))
                .count()
                .get_result::<i64>(conn)?;
            if children > 0 {
                return Err(ConflictKind::HasChildren.into());
            }

            let places = places::table
                .filter(places::class_code.eq(code.as_str()))
                .count()
                .get_result::<i64>(conn)?;
            if places > 0 {
                return Err(ConflictKind::HasPlaces.into());
            }

            diesel::delete(class_locales::table.filter(class_locales::class_code.eq(code.as_str())))
                .execute(conn)?;
            diesel::delete(classes::table.find(code.as_str())).execute(conn)?;
            Ok(())
        })
    }
}
