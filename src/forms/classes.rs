use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::domain::class::NewClass;
use crate::domain::types::{ClassCode, ClassIcon, ClassName, LocaleCode, TypeConstraintError};
use crate::forms::non_blank;

#[derive(Debug, Error)]
pub enum ClassFormError {
    #[error("Class form validation failed: {0}")]
    Validation(String),
    #[error("Class form contains invalid data: {0}")]
    TypeConstraint(String),
}

impl From<ValidationErrors> for ClassFormError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<TypeConstraintError> for ClassFormError {
    fn from(value: TypeConstraintError) -> Self {
        Self::TypeConstraint(value.to_string())
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateClassForm {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub parent: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub icon: String,
    #[validate(length(min = 2))]
    pub locale: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateClassFormPayload {
    pub code: ClassCode,
    pub parent: Option<ClassCode>,
    pub icon: ClassIcon,
    pub locale: LocaleCode,
    pub name: ClassName,
}

impl CreateClassFormPayload {
    pub fn into_new_class(self) -> NewClass {
        NewClass {
            code: self.code,
            parent: self.parent,
            icon: self.icon,
            locale: self.locale,
            name: self.name,
        }
    }
}

impl TryFrom<CreateClassForm> for CreateClassFormPayload {
    type Error = ClassFormError;

    fn try_from(value: CreateClassForm) -> Result<Self, Self::Error> {
        value.validate()?;
        Ok(Self {
            code: ClassCode::new(value.code)?,
            parent: non_blank(value.parent).map(ClassCode::new).transpose()?,
            icon: ClassIcon::new(value.icon)?,
            locale: LocaleCode::new(value.locale)?,
            name: ClassName::new(value.name)?,
        })
    }
}

/// Moves a class; a missing or blank `parent` makes it a root.
#[derive(Deserialize, Validate)]
pub struct SetParentForm {
    #[validate(length(min = 1))]
    pub code: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetParentFormPayload {
    pub code: ClassCode,
    pub parent: Option<ClassCode>,
}

impl TryFrom<SetParentForm> for SetParentFormPayload {
    type Error = ClassFormError;

    fn try_from(value: SetParentForm) -> Result<Self, Self::Error> {
        value.validate()?;
        Ok(Self {
            code: ClassCode::new(value.code)?,
            parent: non_blank(value.parent).map(ClassCode::new).transpose()?,
        })
    }
}

#[derive(Serialize, Deserialize)]
pub struct ClassLocaleEntry {
    pub locale: String,
    pub name: String,
}

#[derive(Deserialize, Validate)]
pub struct ClassLocalesForm {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub locales: Vec<ClassLocaleEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassLocalesFormPayload {
    pub code: ClassCode,
    pub entries: Vec<(LocaleCode, ClassName)>,
}

impl TryFrom<ClassLocalesForm> for ClassLocalesFormPayload {
    type Error = ClassFormError;

    fn try_from(value: ClassLocalesForm) -> Result<Self, Self::Error> {
        value.validate()?;
        let entries = value
            .locales
            .into_iter()
            .map(|entry| Ok((LocaleCode::new(entry.locale)?, ClassName::new(entry.name)?)))
            .collect::<Result<Vec<_>, TypeConstraintError>>()?;

        Ok(Self {
            code: ClassCode::new(value.code)?,
            entries,
        })
    }
}
