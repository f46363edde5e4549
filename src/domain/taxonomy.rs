//! Ancestry paths and the rules that keep the class graph a forest.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::types::{ClassCode, TypeConstraintError};

/// Separator used when an ancestry path is stored as a single string.
pub const PATH_SEPARATOR: &str = ".";

/// Structural rule violations of the class tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("class `{0}` cannot be its own parent")]
    ParentEqualsCode(ClassCode),
    #[error("class `{parent}` is a descendant of `{code}`")]
    ParentCycle { code: ClassCode, parent: ClassCode },
}

/// Ordered codes from the root down to (and including) a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AncestryPath(Vec<ClassCode>);

impl AncestryPath {
    /// Path of a root class.
    pub fn root(code: ClassCode) -> Self {
        Self(vec![code])
    }

    /// Path of `code` placed under the class owning `parent`.
    pub fn child_of(parent: &AncestryPath, code: ClassCode) -> Self {
        let mut codes = parent.0.clone();
        codes.push(code);
        Self(codes)
    }

    /// Parses the stored `a.b.c` form.
    pub fn parse(stored: &str) -> Result<Self, TypeConstraintError> {
        let codes = stored
            .split(PATH_SEPARATOR)
            .map(ClassCode::new)
            .collect::<Result<Vec<_>, _>>()?;
        if codes.is_empty() {
            return Err(TypeConstraintError::EmptyString("ancestry"));
        }
        Ok(Self(codes))
    }

    pub fn codes(&self) -> &[ClassCode] {
        &self.0
    }

    /// The class this path belongs to.
    pub fn code(&self) -> &ClassCode {
        // Paths are never empty: every constructor pushes at least one code.
        &self.0[self.0.len() - 1]
    }

    pub fn parent(&self) -> Option<&ClassCode> {
        self.0.len().checked_sub(2).map(|index| &self.0[index])
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether `code` is this class or one of its ancestors.
    pub fn contains(&self, code: &ClassCode) -> bool {
        self.0.contains(code)
    }

    /// Whether this path lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &AncestryPath) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }

    /// Replaces the `old` prefix of this path with `new`.
    ///
    /// Returns `None` when this path does not start with `old`.
    pub fn rebase(&self, old: &AncestryPath, new: &AncestryPath) -> Option<Self> {
        let rest = self.0.strip_prefix(old.0.as_slice())?;
        let mut codes = new.0.clone();
        codes.extend_from_slice(rest);
        Some(Self(codes))
    }

    /// `LIKE` pattern prefix matching every strict descendant in storage.
    pub fn descendant_prefix(&self) -> String {
        format!("{self}{PATH_SEPARATOR}")
    }
}

impl Display for AncestryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ClassCode::as_str)
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR);
        f.write_str(&joined)
    }
}

/// Validates moving `code` under `new_parent`.
///
/// `new_parent` carries the parent's current ancestry path. The checks run in
/// order: self-parenting, then cycles through the parent's ancestors.
pub fn check_parent_change(
    code: &ClassCode,
    new_parent: Option<(&ClassCode, &AncestryPath)>,
) -> Result<(), TaxonomyError> {
    let Some((parent, parent_path)) = new_parent else {
        return Ok(());
    };
    if parent == code {
        return Err(TaxonomyError::ParentEqualsCode(code.clone()));
    }
    if parent_path.contains(code) {
        return Err(TaxonomyError::ParentCycle {
            code: code.clone(),
            parent: parent.clone(),
        });
    }
    Ok(())
}
