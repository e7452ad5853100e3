//! Project layout loading and file-name validation tests.

use assert_fs::prelude::*;
use keel_core::{CoreError, MigrationName, ProjectLayout};
use predicates::prelude::predicate;
use rstest::rstest;

// ---------------------------------------------------------------------------
// 1. Migration file names
// ---------------------------------------------------------------------------

#[rstest]
#[case("202301010000.sql", "202301010000", None)]
#[case("202301010000_a.sql", "202301010000", Some("a"))]
#[case("202301010000_create_users.sql", "202301010000", Some("create_users"))]
#[case("999999999999_x1_y2.sql", "999999999999", Some("x1_y2"))]
#[case(
    "202301010000_abcdefghijklmnopqrstuvwxyz.sql",
    "202301010000",
    Some("abcdefghijklmnopqrstuvwxyz")
)]
fn valid_migration_names(#[case] file: &str, #[case] version: &str, #[case] name: Option<&str>) {
    let parsed = MigrationName::parse(file).expect("valid name");
    assert_eq!(parsed.version, version);
    assert_eq!(parsed.name.as_deref(), name);
}

#[rstest]
#[case("20230101000_short.sql")]
#[case("2023010100000_long.sql")]
#[case("202301010000-dash.sql")]
#[case("202301010000_Upper.sql")]
#[case("202301010000_with space.sql")]
#[case("202301010000_abcdefghijklmnopqrstuvwxyz0.sql")]
#[case("init.sql")]
fn invalid_migration_names(#[case] file: &str) {
    let err = MigrationName::parse(file).unwrap_err();
    assert!(matches!(err, CoreError::InvalidMigrationName { .. }), "got: {err}");
    assert!(err.to_string().contains(file));
}

// ---------------------------------------------------------------------------
// 2. project.json loading
// ---------------------------------------------------------------------------

#[test]
fn load_config_reads_project_json() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("project.json")
        .write_str(
            r#"{
                "name": "shop",
                "title": "Shop",
                "capabilities": [
                    {"name": "db", "payload": {"__type__": "database", "schema": "public"}}
                ],
                "imports": {"lodash": "npm:lodash@4"}
            }"#,
        )
        .expect("write");

    let document = ProjectLayout::new(root.path()).load_config().expect("load");
    assert_eq!(document.name, "shop");
    assert_eq!(document.capabilities.len(), 1);
    assert!(document.imports.expect("imports").contains_key("lodash"));
}

#[test]
fn load_corrupt_config_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("project.json")
        .write_str("{ not json")
        .expect("write");

    let err = ProjectLayout::new(root.path()).load_config().unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("project.json"));
}

#[test]
fn load_config_rejects_duplicate_instances() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("project.json")
        .write_str(
            r#"{
                "name": "shop",
                "instances": [
                    {"pluginName": "p", "name": "i", "config": {}, "capabilityNames": []},
                    {"pluginName": "q", "name": "i", "config": {}, "capabilityNames": []}
                ]
            }"#,
        )
        .expect("write");

    let err = ProjectLayout::new(root.path()).load_config().unwrap_err();
    assert!(matches!(err, CoreError::DuplicateInstance { .. }), "got: {err}");
}

#[test]
fn loading_does_not_create_state_dir() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("project.json")
        .write_str(r#"{"name": "shop"}"#)
        .expect("write");

    ProjectLayout::new(root.path()).load_config().expect("load");
    root.child(".keel").assert(predicate::path::missing());
}
