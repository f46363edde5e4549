use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::taxonomy::AncestryPath;
use crate::domain::types::{ClassCode, ClassIcon, ClassName, ClassStatus, LocaleCode};

/// A node of the place category tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Class {
    pub code: ClassCode,
    /// `None` marks a root.
    pub parent: Option<ClassCode>,
    pub status: ClassStatus,
    pub icon: ClassIcon,
    /// Codes from the root down to this class.
    pub ancestry: AncestryPath,
    /// Never empty.
    pub locales: BTreeMap<LocaleCode, ClassName>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Class {
    pub fn is_active(&self) -> bool {
        self.status == ClassStatus::Active
    }
}

/// Data required to insert a new [`Class`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewClass {
    pub code: ClassCode,
    pub parent: Option<ClassCode>,
    pub icon: ClassIcon,
    pub locale: LocaleCode,
    pub name: ClassName,
}
