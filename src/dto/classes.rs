use serde::Serialize;

use crate::domain::class::Class;
use crate::domain::locale::resolve_entity_locale;
use crate::domain::query::LocaleContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDto {
    pub code: String,
    pub parent: Option<String>,
    pub status: String,
    pub icon: String,
    /// Locale the name was taken from.
    pub locale: String,
    pub name: String,
    pub ancestry: String,
}

impl ClassDto {
    pub fn new(class: Class, locale: &LocaleContext) -> Self {
        let resolved =
            resolve_entity_locale(&locale.requested, &locale.fallback, class.locales.keys());
        let name = resolved
            .as_ref()
            .and_then(|code| class.locales.get(code))
            .map(|name| name.as_str().to_string())
            .unwrap_or_default();

        Self {
            code: class.code.to_string(),
            parent: class.parent.map(String::from),
            status: class.status.to_string(),
            icon: class.icon.to_string(),
            locale: resolved.map(String::from).unwrap_or_default(),
            name,
            ancestry: class.ancestry.to_string(),
        }
    }
}
