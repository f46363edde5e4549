//! Request language negotiation and per-entity translation fallback.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::domain::types::{LocaleCode, TypeConstraintError};

/// The set of locales the directory serves, injected from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleRegistry {
    supported: BTreeSet<LocaleCode>,
    default: LocaleCode,
    fallback: LocaleCode,
}

/// Raw locale settings as found in configuration files.
#[derive(Debug, Clone, Deserialize)]
pub struct LocaleSettings {
    pub supported: Vec<String>,
    pub default: String,
    #[serde(default = "default_fallback")]
    pub fallback: String,
}

fn default_fallback() -> String {
    "en".to_string()
}

impl LocaleRegistry {
    /// Builds a registry; `default` is added to the supported set if missing.
    ///
    /// `fallback` is the language tried when an entity lacks the requested
    /// translation, before falling back to any stored one.
    pub fn new<I>(supported: I, default: LocaleCode, fallback: LocaleCode) -> Self
    where
        I: IntoIterator<Item = LocaleCode>,
    {
        let mut supported: BTreeSet<LocaleCode> = supported.into_iter().collect();
        supported.insert(default.clone());
        Self {
            supported,
            default,
            fallback,
        }
    }

    pub fn is_supported(&self, code: &LocaleCode) -> bool {
        self.supported.contains(code)
    }

    pub fn default_locale(&self) -> &LocaleCode {
        &self.default
    }

    pub fn fallback_locale(&self) -> &LocaleCode {
        &self.fallback
    }

    pub fn all_supported_locales(&self) -> impl Iterator<Item = &LocaleCode> {
        self.supported.iter()
    }

    /// Normalises `tag` and returns it only if it is supported.
    pub fn supported_tag(&self, tag: &str) -> Option<LocaleCode> {
        LocaleCode::new(tag)
            .ok()
            .filter(|code| self.is_supported(code))
    }

    /// Picks the working locale of a request.
    ///
    /// An explicit query parameter wins when supported, then the best supported
    /// `Accept-Language` entry, then the default locale.
    pub fn detect_request_locale(
        &self,
        query_param: Option<&str>,
        accept_language: Option<&str>,
    ) -> LocaleCode {
        if let Some(code) = query_param.and_then(|tag| self.supported_tag(tag)) {
            return code;
        }

        if let Some(header) = accept_language {
            let found = parse_accept_language(header)
                .into_iter()
                .find_map(|candidate| self.supported_tag(&candidate.tag));
            if let Some(code) = found {
                return code;
            }
        }

        self.default.clone()
    }

    /// Chooses which stored translation of an entity to display.
    pub fn resolve_entity_locale<'a, I>(
        &self,
        requested: &LocaleCode,
        available: I,
    ) -> Option<LocaleCode>
    where
        I: IntoIterator<Item = &'a LocaleCode>,
    {
        resolve_entity_locale(requested, &self.fallback, available)
    }
}

impl TryFrom<&LocaleSettings> for LocaleRegistry {
    type Error = TypeConstraintError;

    fn try_from(settings: &LocaleSettings) -> Result<Self, Self::Error> {
        let supported = settings
            .supported
            .iter()
            .map(LocaleCode::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(
            supported,
            LocaleCode::new(settings.default.as_str())?,
            LocaleCode::new(settings.fallback.as_str())?,
        ))
    }
}

/// One entry of an `Accept-Language` header.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleCandidate {
    pub tag: String,
    pub weight: f32,
}

/// Splits an `Accept-Language` header into candidates ordered by descending
/// weight, keeping header order among equal weights.
///
/// Entries with `q=0`, an unparsable weight or the `*` wildcard are dropped.
pub fn parse_accept_language(header: &str) -> Vec<LocaleCandidate> {
    let mut candidates: Vec<LocaleCandidate> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }

            let mut weight = 1.0_f32;
            for param in parts {
                if let Some((key, value)) = param.split_once('=')
                    && key.trim().eq_ignore_ascii_case("q")
                {
                    weight = value.trim().parse().ok()?;
                }
            }
            if !(weight > 0.0 && weight <= 1.0) {
                return None;
            }

            Some(LocaleCandidate {
                tag: tag.to_string(),
                weight,
            })
        })
        .collect();

    // `sort_by` is stable, so ties keep header order.
    candidates.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    candidates
}

/// Exact match, then `fallback`, then the lexicographically smallest
/// available code. `None` only when nothing is available.
pub fn resolve_entity_locale<'a, I>(
    requested: &LocaleCode,
    fallback: &LocaleCode,
    available: I,
) -> Option<LocaleCode>
where
    I: IntoIterator<Item = &'a LocaleCode>,
{
    let available: BTreeSet<&LocaleCode> = available.into_iter().collect();
    if available.contains(requested) {
        return Some(requested.clone());
    }
    if available.contains(fallback) {
        return Some(fallback.clone());
    }
    available.into_iter().next().cloned()
}
