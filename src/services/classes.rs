use std::collections::BTreeSet;

use crate::domain::class::Class;
use crate::domain::locale::LocaleRegistry;
use crate::domain::query::LocaleContext;
use crate::domain::types::{ClassCode, ClassIcon, ClassStatus, LocaleCode};
use crate::dto::classes::ClassDto;
use crate::forms::classes::{ClassLocalesFormPayload, CreateClassFormPayload, SetParentFormPayload};
use crate::pagination::{Page, Pagination};
use crate::repository::{ClassListQuery, ClassReader, ClassScope, ClassWriter, RepositoryError};

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

/// Creates an active class with its first translation.
pub fn create_class<R>(
    payload: CreateClassFormPayload,
    locales: &LocaleRegistry,
    repo: &R,
) -> ServiceResult<Class>
where
    R: ClassWriter,
{
    require_supported(locales, &payload.locale)?;

    let class = checked("class creation", repo.create_class(&payload.into_new_class()))?;
    log::info!("Created class {} at {}", class.code, class.ancestry);
    Ok(class)
}

/// Re-parents a class, or makes it a root when no parent is given.
pub fn set_class_parent<R>(payload: SetParentFormPayload, repo: &R) -> ServiceResult<Class>
where
    R: ClassWriter,
{
    checked(
        "class move",
        repo.set_class_parent(&payload.code, payload.parent.as_ref()),
    )
}

pub fn set_class_icon<R>(code: &ClassCode, icon: &ClassIcon, repo: &R) -> ServiceResult<Class>
where
    R: ClassWriter,
{
    checked("class icon change", repo.set_class_icon(code, icon))
}

pub fn set_class_status<R>(code: &ClassCode, status: ClassStatus, repo: &R) -> ServiceResult<Class>
where
    R: ClassWriter,
{
    let class = checked("class status change", repo.set_class_status(code, status))?;
    log::info!("Class {code} is now {status}");
    Ok(class)
}

/// Adds or replaces translations; every locale must be supported.
pub fn set_class_locales<R>(
    payload: ClassLocalesFormPayload,
    locales: &LocaleRegistry,
    repo: &R,
) -> ServiceResult<Class>
where
    R: ClassWriter,
{
    for (locale, _) in &payload.entries {
        require_supported(locales, locale)?;
    }
    checked(
        "class locale update",
        repo.upsert_class_locales(&payload.code, &payload.entries),
    )
}

pub fn delete_class_locale<R>(
    code: &ClassCode,
    locale: &LocaleCode,
    repo: &R,
) -> ServiceResult<Class>
where
    R: ClassWriter,
{
    checked("class locale removal", repo.delete_class_locale(code, locale))
}

/// Deletes a leaf class that no place uses.
pub fn delete_class<R>(code: &ClassCode, repo: &R) -> ServiceResult<()>
where
    R: ClassWriter,
{
    checked("class deletion", repo.delete_class(code))?;
    log::info!("Deleted class {code}");
    Ok(())
}

pub fn get_class<R>(code: &ClassCode, locale: &LocaleContext, repo: &R) -> ServiceResult<ClassDto>
where
    R: ClassReader,
{
    match checked("class lookup", repo.get_class(code))? {
        Some(class) => Ok(ClassDto::new(class, locale)),
        None => Err(ServiceError::NotFound(format!("class `{code}`"))),
    }
}

pub fn list_classes<R>(
    scope: ClassScope,
    pagination: Pagination,
    locale: &LocaleContext,
    repo: &R,
) -> ServiceResult<Page<ClassDto>>
where
    R: ClassReader,
{
    let query = ClassListQuery::new(scope).paginate(pagination.page, pagination.per_page);
    let (total, classes) = checked("class listing", repo.list_classes(query))?;
    let items = classes
        .into_iter()
        .map(|class| ClassDto::new(class, locale))
        .collect();
    Ok(Page::new(items, total, pagination))
}

/// Direct children of `code`, ordered by ancestry path.
pub fn list_children<R>(
    code: &ClassCode,
    locale: &LocaleContext,
    repo: &R,
) -> ServiceResult<Vec<ClassDto>>
where
    R: ClassReader,
{
    if !checked("class lookup", repo.class_exists(code))? {
        return Err(ServiceError::NotFound(format!("class `{code}`")));
    }

    let (_total, children) = checked(
        "class listing",
        repo.list_classes(ClassListQuery::new(ClassScope::ChildrenOf(code.clone()))),
    )?;
    Ok(children
        .into_iter()
        .map(|class| ClassDto::new(class, locale))
        .collect())
}

/// Every class strictly below `code`.
pub fn list_descendants<R>(code: &ClassCode, repo: &R) -> ServiceResult<Vec<ClassCode>>
where
    R: ClassReader,
{
    checked("descendant listing", repo.list_descendants(code))
}

/// Replaces each code by itself plus all of its descendants.
///
/// Unknown codes stay in the set on their own, so they simply match nothing.
pub fn expand_subtrees<R>(
    codes: &BTreeSet<ClassCode>,
    repo: &R,
) -> ServiceResult<BTreeSet<ClassCode>>
where
    R: ClassReader,
{
    let mut expanded = codes.clone();
    for code in codes {
        match repo.list_descendants(code) {
            Ok(descendants) => expanded.extend(descendants),
            Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(expanded)
}

pub fn class_exists<R>(code: &ClassCode, repo: &R) -> ServiceResult<bool>
where
    R: ClassReader,
{
    checked("class lookup", repo.class_exists(code))
}

pub fn class_is_active<R>(code: &ClassCode, repo: &R) -> ServiceResult<bool>
where
    R: ClassReader,
{
    checked("class lookup", repo.class_is_active(code))
}


#[cfg(test)]
mod proptests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::domain::types::ClassName;
    use crate::repository::test::TestRepository;
    use crate::repository::{ClassListQuery, ClassScope};

    const CODES: usize = 6;

    /// `(kind, target, parent)`; kinds 0 and 1 create, 2 moves, and a parent
    /// index of `CODES` means a root.
    fn arb_steps() -> impl Strategy<Value = Vec<(u8, usize, usize)>> {
        prop::collection::vec((0u8..3, 0..CODES, 0..=CODES), 1..40)
    }

    fn nth(index: usize) -> Option<ClassCode> {
        (index < CODES).then(|| ClassCode::new(format!("c{index}")).unwrap())
    }

    proptest! {
        #[test]
        fn successful_moves_keep_the_tree_a_forest(steps in arb_steps()) {
            let repo = TestRepository::new();
            let registry = LocaleRegistry::new(
                [LocaleCode::new("en").unwrap()],
                LocaleCode::new("en").unwrap(),
                LocaleCode::new("en").unwrap(),
            );

            for (kind, target, parent) in steps {
                let code = nth(target).unwrap();
                let parent = nth(parent);
                if kind < 2 {
                    let payload = CreateClassFormPayload {
                        name: ClassName::new(code.as_str()).unwrap(),
                        code,
                        parent,
                        icon: ClassIcon::new("pin").unwrap(),
                        locale: LocaleCode::new("en").unwrap(),
                    };
                    let _ = create_class(payload, &registry, &repo);
                } else {
                    let _ = set_class_parent(SetParentFormPayload { code, parent }, &repo);
                }

                let (_, classes) = repo
                    .list_classes(ClassListQuery::new(ClassScope::All))
                    .unwrap();
                let parents: HashMap<&ClassCode, Option<&ClassCode>> = classes
                    .iter()
                    .map(|class| (&class.code, class.parent.as_ref()))
                    .collect();

                for class in &classes {
                    let mut chain = vec![&class.code];
                    let mut current = parents[&class.code];
                    while let Some(parent) = current {
                        prop_assert!(chain.len() <= classes.len(), "cycle through {}", class.code);
                        chain.push(parent);
                        current = parents[parent];
                    }
                    chain.reverse();
                    let stored: Vec<&ClassCode> = class.ancestry.codes().iter().collect();
                    prop_assert_eq!(stored, chain);
                }
            }
        }
    }
}
