//! Migration file names: `<12-digit version>[_<name>].sql`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CoreError;

static MIGRATION_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{12})(?:_([a-z0-9_]{0,26}))?$").expect("migration stem pattern is valid")
});

/// Extension of migration files inside `migrations/`.
pub const MIGRATION_EXTENSION: &str = "sql";

/// Version and optional name parsed from a migration file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationName {
    pub version: String,
    pub name: Option<String>,
}

impl MigrationName {
    /// Parse a file name such as `202301010000_create_users.sql`.
    ///
    /// The `.sql` suffix is optional; the stem must match the pattern exactly.
    pub fn parse(file_name: &str) -> Result<Self, CoreError> {
        let stem = file_name
            .strip_suffix(".sql")
            .unwrap_or(file_name);
        let captures = MIGRATION_STEM
            .captures(stem)
            .ok_or_else(|| CoreError::InvalidMigrationName {
                name: file_name.to_string(),
            })?;

        let version = captures[1].to_string();
        let name = captures
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|n| !n.is_empty());
        Ok(Self { version, name })
    }
}
