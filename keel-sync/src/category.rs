//! Reconciliation categories and the inclusion filter over them.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// An independently reconciled part of a project.
///
/// Variants are declared in the order categories are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Configuration,
    Migrations,
    Functions,
    Workflows,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Configuration,
        Category::Migrations,
        Category::Functions,
        Category::Workflows,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Configuration => "configuration",
            Category::Migrations => "migrations",
            Category::Functions => "functions",
            Category::Workflows => "workflows",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category '{0}' (expected config, migrations, functions or workflows)")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "config" | "configuration" => Ok(Category::Configuration),
            "migration" | "migrations" => Ok(Category::Migrations),
            "function" | "functions" => Ok(Category::Functions),
            "workflow" | "workflows" => Ok(Category::Workflows),
            _ => Err(ParseCategoryError(s.to_string())),
        }
    }
}

/// Which categories a run reconciles. Defaults to all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet(HashSet<Category>);

impl CategorySet {
    pub fn all() -> Self {
        Self(Category::ALL.into_iter().collect())
    }

    pub fn only(categories: impl IntoIterator<Item = Category>) -> Self {
        Self(categories.into_iter().collect())
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    /// Included categories in reconciliation order.
    pub fn ordered(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for CategorySet {
    type Err = ParseCategoryError;

    /// Comma-separated list, e.g. `config,migrations`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let categories = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Category::from_str)
            .collect::<Result<HashSet<_>, _>>()?;
        if categories.is_empty() {
            return Err(ParseCategoryError(s.to_string()));
        }
        Ok(Self(categories))
    }
}
