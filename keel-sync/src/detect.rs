//! Content-addressable change detection.
//!
//! Compares locally enumerated entities with the fingerprints recorded in the
//! state cache. Created and updated entities are yielded in enumeration order;
//! deletions (cache keys never visited) follow once enumeration is exhausted.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::entity::{Entity, FunctionDir, Fingerprinted};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// One detected change. Deletions carry only the key: the entity is gone.
#[derive(Debug, Clone)]
pub enum Change<E> {
    Created(E),
    Updated(E),
    Deleted(String),
}

impl<E: Entity> Change<E> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Created(_) => ChangeKind::Created,
            Change::Updated(_) => ChangeKind::Updated,
            Change::Deleted(_) => ChangeKind::Deleted,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Change::Created(entity) | Change::Updated(entity) => entity.key(),
            Change::Deleted(key) => key,
        }
    }

    pub fn entity(&self) -> Option<&E> {
        match self {
            Change::Created(entity) | Change::Updated(entity) => Some(entity),
            Change::Deleted(_) => None,
        }
    }
}

/// Lazy stream of changes; see [`detect`].
#[derive(Debug)]
pub struct ChangeStream<I> {
    local: I,
    /// Cached rows not yet visited by enumeration.
    unvisited: HashMap<String, String>,
    deleted: Option<std::vec::IntoIter<String>>,
}

impl<I, E> Iterator for ChangeStream<I>
where
    I: Iterator<Item = E>,
    E: Fingerprinted,
{
    type Item = Change<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.deleted.is_none() {
            for entity in self.local.by_ref() {
                match self.unvisited.remove(entity.key()) {
                    None => return Some(Change::Created(entity)),
                    Some(cached) if cached != entity.fingerprint() => {
                        return Some(Change::Updated(entity))
                    }
                    Some(_) => debug!(key = entity.key(), "unchanged"),
                }
            }
            let mut remaining: Vec<String> = self.unvisited.drain().map(|(key, _)| key).collect();
            remaining.sort();
            self.deleted = Some(remaining.into_iter());
        }
        self.deleted.as_mut()?.next().map(Change::Deleted)
    }
}

/// Classify `local` against `cached` (`key → fingerprint`).
///
/// Fingerprints are only computed for entities whose key is already cached.
pub fn detect<L, E>(local: L, cached: HashMap<String, String>) -> ChangeStream<L::IntoIter>
where
    L: IntoIterator<Item = E>,
    E: Fingerprinted,
{
    ChangeStream {
        local: local.into_iter(),
        unvisited: cached,
        deleted: None,
    }
}

/// Function-level detection over directory names.
///
/// A function present both locally and in the cache is always `Updated`,
/// since its files are diffed separately beneath it.
pub fn detect_functions(
    local: Vec<FunctionDir>,
    cached: impl IntoIterator<Item = String>,
) -> Vec<Change<FunctionDir>> {
    let mut unvisited: HashSet<String> = cached.into_iter().collect();
    let mut changes = Vec::with_capacity(local.len());
    for function in local {
        if unvisited.remove(&function.name) {
            changes.push(Change::Updated(function));
        } else {
            changes.push(Change::Created(function));
        }
    }
    let mut deleted: Vec<String> = unvisited.into_iter().collect();
    deleted.sort();
    changes.extend(deleted.into_iter().map(Change::Deleted));
    changes
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::path::PathBuf;

    use super::*;
    use crate::entity::FunctionFile;

    /// Entity that counts how often its fingerprint is requested.
    struct Probe {
        key: String,
        fingerprint: String,
        hashed: Cell<usize>,
    }

    impl Probe {
        fn new(key: &str, fingerprint: &str) -> Self {
            Self {
                key: key.to_string(),
                fingerprint: fingerprint.to_string(),
                hashed: Cell::new(0),
            }
        }
    }

    impl Entity for Probe {
        fn key(&self) -> &str {
            &self.key
        }
    }

    impl Fingerprinted for Probe {
        fn fingerprint(&self) -> &str {
            self.hashed.set(self.hashed.get() + 1);
            &self.fingerprint
        }
    }

    fn cached(rows: &[(&str, &str)]) -> HashMap<String, String> {
        rows.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn summary<E: Entity>(changes: &[Change<E>]) -> Vec<(ChangeKind, String)> {
        changes
            .iter()
            .map(|c| (c.kind(), c.key().to_string()))
            .collect()
    }

    #[test]
    fn classifies_created_updated_deleted_and_omits_unchanged() {
        let local = vec![
            Probe::new("new", "1"),
            Probe::new("changed", "2"),
            Probe::new("same", "3"),
        ];
        let changes: Vec<_> = detect(
            local,
            cached(&[("changed", "old"), ("same", "3"), ("gone", "4")]),
        )
        .collect();

        assert_eq!(
            summary(&changes),
            vec![
                (ChangeKind::Created, "new".to_string()),
                (ChangeKind::Updated, "changed".to_string()),
                (ChangeKind::Deleted, "gone".to_string()),
            ]
        );
    }

    #[test]
    fn deletions_come_after_all_local_changes() {
        let local = vec![Probe::new("b", "1"), Probe::new("d", "1")];
        let changes: Vec<_> = detect(local, cached(&[("a", "x"), ("c", "x")])).collect();
        let kinds: Vec<ChangeKind> = changes.iter().map(Change::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Created,
                ChangeKind::Created,
                ChangeKind::Deleted,
                ChangeKind::Deleted,
            ]
        );
    }

    #[test]
    fn fingerprint_is_only_computed_for_cached_keys() {
        let local = vec![Probe::new("fresh", "1"), Probe::new("known", "2")];
        let changes: Vec<_> = detect(local, cached(&[("known", "2")])).collect();
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            Change::Created(probe) => assert_eq!(probe.hashed.get(), 0),
            other => panic!("expected created, got {:?}", other.kind()),
        }
    }

    #[test]
    fn empty_on_both_sides_yields_nothing() {
        let changes: Vec<Change<Probe>> = detect(Vec::new(), HashMap::new()).collect();
        assert!(changes.is_empty());
    }

    #[test]
    fn cached_row_hashed_under_another_server_path_is_updated() {
        let file = FunctionFile::new(
            "api".to_string(),
            "lib/util.ts".to_string(),
            PathBuf::from("functions/api/lib/util.ts"),
            b"same".to_vec(),
        );
        let stale = keel_core::hash::fingerprint_parts([b"util.ts".as_slice(), b"same".as_slice()]);
        let changes: Vec<_> = detect(vec![file], cached(&[("api/lib/util.ts", &stale)])).collect();
        assert_eq!(
            summary(&changes),
            vec![(ChangeKind::Updated, "api/lib/util.ts".to_string())]
        );
    }

    #[test]
    fn existing_functions_are_always_updated() {
        let local = vec![
            FunctionDir {
                name: "api".to_string(),
            },
            FunctionDir {
                name: "new".to_string(),
            },
        ];
        let changes = detect_functions(local, vec!["api".to_string(), "old".to_string()]);
        assert_eq!(
            summary(&changes),
            vec![
                (ChangeKind::Updated, "api".to_string()),
                (ChangeKind::Created, "new".to_string()),
                (ChangeKind::Deleted, "old".to_string()),
            ]
        );
    }
}
