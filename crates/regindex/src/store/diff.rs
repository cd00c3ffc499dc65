//! Structural comparison of JSON documents.
//!
//! Objects are compared key by key, arrays as multisets (element order is
//! ignored, multiplicity is not), scalars by value.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::{ID_FIELD, REV_FIELD};

/// Which top-level fields never count as a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPolicy {
    ignored_fields: BTreeSet<String>,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self::ignoring(std::iter::empty::<String>())
    }
}

impl DiffPolicy {
    /// Ignore `fields` on top of `_id` and `_rev`, which are always ignored.
    pub fn ignoring<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ignored_fields: BTreeSet<String> = [ID_FIELD, REV_FIELD].into_iter().map(String::from).collect();
        ignored_fields.extend(fields.into_iter().map(Into::into));
        Self { ignored_fields }
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.contains(field)
    }

    pub fn ignored_fields(&self) -> impl Iterator<Item = &str> {
        self.ignored_fields.iter().map(String::as_str)
    }
}

/// Differences between a stored and a candidate document.
///
/// Paths are dot-separated, e.g. `tags.latest.total_size`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentDiff {
    pub values_changed: Vec<String>,
    pub keys_added: Vec<String>,
    pub keys_removed: Vec<String>,
}

impl DocumentDiff {
    pub fn is_empty(&self) -> bool {
        self.values_changed.is_empty() && self.keys_added.is_empty() && self.keys_removed.is_empty()
    }

    /// Top-level fields touched by any difference.
    pub fn affected_root_keys(&self) -> BTreeSet<String> {
        self.values_changed
            .iter()
            .chain(&self.keys_added)
            .chain(&self.keys_removed)
            .map(|path| path.split('.').next().unwrap_or_default().to_string())
            .collect()
    }
}

/// Compare `old` against `new`, skipping top-level fields the policy ignores.
pub fn diff_documents(old: &Map<String, Value>, new: &Map<String, Value>, policy: &DiffPolicy) -> DocumentDiff {
    let mut diff = DocumentDiff::default();
    diff_objects(old, new, "", Some(policy), &mut diff);
    diff
}

fn diff_objects(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    prefix: &str,
    policy: Option<&DiffPolicy>,
    diff: &mut DocumentDiff,
) {
    let skip = |key: &str| policy.is_some_and(|p| p.is_ignored(key));

    for (key, old_value) in old {
        if skip(key) {
            continue;
        }
        let path = join(prefix, key);
        match new.get(key) {
            None => diff.keys_removed.push(path),
            Some(new_value) => match (old_value, new_value) {
                (Value::Object(a), Value::Object(b)) => diff_objects(a, b, &path, None, diff),
                (a, b) if !values_equal(a, b) => diff.values_changed.push(path),
                _ => {}
            },
        }
    }

    for key in new.keys() {
        if !skip(key) && !old.contains_key(key) {
            diff.keys_added.push(join(prefix, key));
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Deep equality with arrays treated as multisets.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut used = vec![false; b.len()];
            a.iter().all(|item| {
                let slot = b
                    .iter()
                    .enumerate()
                    .position(|(i, candidate)| !used[i] && values_equal(item, candidate));
                match slot {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_identical_documents_ignoring_store_fields() {
        let old = obj(json!({"_id": "a", "_rev": "3-x", "size": 10, "tags": {"v1": {"total_size": 10}}}));
        let new = obj(json!({"size": 10, "tags": {"v1": {"total_size": 10}}}));
        let diff = diff_documents(&old, &new, &DiffPolicy::default());
        assert!(diff.is_empty(), "{diff:?}");
    }

    #[test]
    fn test_nested_change_reports_path_and_root() {
        let old = obj(json!({"tags": {"v1": {"total_size": 10}}, "size": 10}));
        let new = obj(json!({"tags": {"v1": {"total_size": 12}}, "size": 10}));
        let diff = diff_documents(&old, &new, &DiffPolicy::default());
        assert_eq!(diff.values_changed, vec!["tags.v1.total_size".to_string()]);
        assert_eq!(
            diff.affected_root_keys(),
            BTreeSet::from(["tags".to_string()])
        );
    }

    #[test]
    fn test_added_and_removed_keys() {
        let old = obj(json!({"readme_md": "# x", "size": 1}));
        let new = obj(json!({"size": 1, "tags": {"v2": {}}}));
        let diff = diff_documents(&old, &new, &DiffPolicy::default());
        assert_eq!(diff.keys_removed, vec!["readme_md".to_string()]);
        assert_eq!(diff.keys_added, vec!["tags".to_string()]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_arrays_compare_as_multisets() {
        assert!(values_equal(&json!([1, 2, 2, 3]), &json!([2, 3, 1, 2])));
        assert!(!values_equal(&json!([1, 2, 2]), &json!([1, 1, 2])));
        assert!(!values_equal(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(values_equal(&json!([{"a": [1, 2]}]), &json!([{"a": [2, 1]}])));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(values_equal(&json!(5), &json!(5u64)));
        assert!(values_equal(&json!(1.5), &json!(1.5)));
        assert!(!values_equal(&json!(5), &json!("5")));
    }

    #[test]
    fn test_custom_ignored_fields() {
        let policy = DiffPolicy::ignoring(["_id", "_rev", "age_human_readable"]);
        let old = obj(json!({"age_human_readable": "2 days", "size": 1}));
        let new = obj(json!({"age_human_readable": "3 days", "size": 1}));
        assert!(diff_documents(&old, &new, &policy).is_empty());
        assert!(!diff_documents(&old, &new, &DiffPolicy::default()).is_empty());
        assert!(policy.is_ignored("age_human_readable"));
    }

    #[test]
    fn test_store_fields_stay_ignored_with_custom_fields() {
        let policy = DiffPolicy::ignoring(["status"]);
        assert!(policy.is_ignored("_id"));
        assert!(policy.is_ignored("_rev"));
        assert!(policy.is_ignored("status"));

        let old = obj(json!({"_id": "a", "_rev": "2-x", "status": "old", "size": 1}));
        let new = obj(json!({"status": "new", "size": 1}));
        assert!(diff_documents(&old, &new, &policy).is_empty());
    }

    #[test]
    fn test_ignored_fields_apply_only_at_top_level() {
        let old = obj(json!({"project": {"_id": 1}}));
        let new = obj(json!({"project": {"_id": 2}}));
        let diff = diff_documents(&old, &new, &DiffPolicy::default());
        assert_eq!(diff.values_changed, vec!["project._id".to_string()]);
    }
}
