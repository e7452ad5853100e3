//! Order-preserving structural diff over `serde_json::Value`.
//!
//! Produces a flat list of [`Edit`]s. Objects are compared key by key; arrays
//! pairwise by position. Top-level arrays listed in [`Differ::keyed`] are
//! aligned by an identity field first, so reordering them yields no edits and
//! every nested edit path carries the element's index in `before`.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

/// One step of an edit path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, "{name}"),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Render a path as `/a/0/b`; the root is `/`.
pub fn format_path(path: &[Segment]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.iter().map(|s| format!("/{s}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Add,
    Replace,
    Remove,
}

/// A single structural edit. `value` is `None` only for [`EditOp::Remove`].
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub op: EditOp,
    pub path: Vec<Segment>,
    pub value: Option<Value>,
}

impl Edit {
    fn add(path: &[Segment], value: &Value) -> Self {
        Self {
            op: EditOp::Add,
            path: path.to_vec(),
            value: Some(value.clone()),
        }
    }

    fn replace(path: &[Segment], value: &Value) -> Self {
        Self {
            op: EditOp::Replace,
            path: path.to_vec(),
            value: Some(value.clone()),
        }
    }

    fn remove(path: &[Segment]) -> Self {
        Self {
            op: EditOp::Remove,
            path: path.to_vec(),
            value: None,
        }
    }
}

/// Structural differ with optional identity alignment for top-level arrays.
#[derive(Debug, Clone, Copy)]
pub struct Differ<'a> {
    keyed: &'a [&'a str],
    identity: &'a str,
}

impl Default for Differ<'_> {
    fn default() -> Self {
        Self {
            keyed: &[],
            identity: "name",
        }
    }
}

impl<'a> Differ<'a> {
    /// Align the top-level arrays named in `keyed` by their `identity` field.
    pub fn keyed(keyed: &'a [&'a str], identity: &'a str) -> Self {
        Self { keyed, identity }
    }

    pub fn diff(&self, before: &Value, after: &Value) -> Vec<Edit> {
        let mut edits = Vec::new();
        let mut path = Vec::new();
        self.walk(&mut path, before, after, &mut edits);
        edits
    }

    fn walk(&self, path: &mut Vec<Segment>, before: &Value, after: &Value, out: &mut Vec<Edit>) {
        match (before, after) {
            (Value::Object(b), Value::Object(a)) => self.walk_object(path, b, a, out),
            (Value::Array(b), Value::Array(a)) => {
                if self.is_keyed(path) {
                    if let (Some(bk), Some(ak)) = (self.keys(b), self.keys(a)) {
                        self.walk_keyed(path, b, &bk, a, &ak, out);
                        return;
                    }
                }
                self.walk_positional(path, b, a, out);
            }
            _ if before == after => {}
            _ => out.push(Edit::replace(path, after)),
        }
    }

    fn walk_object(
        &self,
        path: &mut Vec<Segment>,
        before: &Map<String, Value>,
        after: &Map<String, Value>,
        out: &mut Vec<Edit>,
    ) {
        for (key, b) in before {
            path.push(Segment::Field(key.clone()));
            match after.get(key) {
                Some(a) => self.walk(path, b, a, out),
                None => out.push(Edit::remove(path)),
            }
            path.pop();
        }
        for (key, a) in after {
            if before.contains_key(key) {
                continue;
            }
            path.push(Segment::Field(key.clone()));
            out.push(Edit::add(path, a));
            path.pop();
        }
    }

    fn walk_positional(
        &self,
        path: &mut Vec<Segment>,
        before: &[Value],
        after: &[Value],
        out: &mut Vec<Edit>,
    ) {
        let common = before.len().min(after.len());
        for (i, (b, a)) in before.iter().zip(after).enumerate() {
            path.push(Segment::Index(i));
            self.walk(path, b, a, out);
            path.pop();
        }
        for (i, a) in after.iter().enumerate().skip(common) {
            path.push(Segment::Index(i));
            out.push(Edit::add(path, a));
            path.pop();
        }
        // Highest index first so the removals stay valid when applied in order.
        for i in (common..before.len()).rev() {
            path.push(Segment::Index(i));
            out.push(Edit::remove(path));
            path.pop();
        }
    }

    fn walk_keyed(
        &self,
        path: &mut Vec<Segment>,
        before: &[Value],
        before_keys: &[&str],
        after: &[Value],
        after_keys: &[&str],
        out: &mut Vec<Edit>,
    ) {
        let index_of: HashMap<&str, usize> = before_keys
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, i))
            .collect();

        for (i, (a, key)) in after.iter().zip(after_keys).enumerate() {
            match index_of.get(key) {
                Some(&j) => {
                    path.push(Segment::Index(j));
                    self.walk(path, &before[j], a, out);
                    path.pop();
                }
                None => {
                    path.push(Segment::Index(i));
                    out.push(Edit::add(path, a));
                    path.pop();
                }
            }
        }

        for (j, key) in before_keys.iter().enumerate().rev() {
            if after_keys.contains(key) {
                continue;
            }
            path.push(Segment::Index(j));
            out.push(Edit::remove(path));
            path.pop();
        }
    }

    fn is_keyed(&self, path: &[Segment]) -> bool {
        match path {
            [Segment::Field(field)] => self.keyed.contains(&field.as_str()),
            _ => false,
        }
    }

    /// Identity keys of every element, or `None` if any element lacks one or
    /// a key repeats.
    fn keys<'v>(&self, items: &'v [Value]) -> Option<Vec<&'v str>> {
        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let key = item.get(self.identity)?.as_str()?;
            if keys.contains(&key) {
                return None;
            }
            keys.push(key);
        }
        Some(keys)
    }
}
