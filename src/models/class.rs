use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::class::Class as DomainClass;
use crate::domain::taxonomy::AncestryPath;
use crate::domain::types::{
    ClassCode, ClassIcon, ClassName, ClassStatus, LocaleCode, TypeConstraintError,
};

/// Diesel model representing the `classes` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::classes)]
pub struct Class {
    pub code: String,
    pub parent: Option<String>,
    pub status: String,
    pub icon: String,
    pub ancestry: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`Class`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::classes)]
pub struct NewClass<'a> {
    pub code: &'a str,
    pub parent: Option<&'a str>,
    pub status: &'a str,
    pub icon: &'a str,
    pub ancestry: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Diesel model representing the `class_locales` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::class_locales)]
pub struct ClassLocale {
    pub class_code: String,
    pub locale: String,
    pub name: String,
}

impl ClassLocale {
    pub fn new(code: &ClassCode, locale: &LocaleCode, name: &ClassName) -> Self {
        Self {
            class_code: code.as_str().to_string(),
            locale: locale.as_str().to_string(),
            name: name.as_str().to_string(),
        }
    }
}

impl Class {
    /// Combines the row with its locale rows into a domain class.
    pub fn into_domain(
        self,
        locales: Vec<ClassLocale>,
    ) -> Result<DomainClass, TypeConstraintError> {
        let locales = locales
            .into_iter()
            .map(|row| Ok((LocaleCode::new(row.locale)?, ClassName::new(row.name)?)))
            .collect::<Result<BTreeMap<_, _>, TypeConstraintError>>()?;

        Ok(DomainClass {
            code: ClassCode::new(self.code)?,
            parent: self.parent.map(ClassCode::new).transpose()?,
            status: ClassStatus::try_from(self.status)?,
            icon: ClassIcon::new(self.icon)?,
            ancestry: AncestryPath::parse(&self.ancestry)?,
            locales,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
