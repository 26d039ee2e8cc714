//! Construction of minimal JSON patches for in-place updates.
//!
//! Only fields that differ between the previous and the new declared state
//! end up in the patch. Each changed payload field becomes a single
//! operation on its top-level path, label and annotation maps are diffed
//! key by key.

use std::collections::BTreeMap;

use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use serde::Serialize;
use serde_json::Value;

/// An ordered list of patch operations, which is sent as a single JSON patch.
#[derive(Clone, Debug, Default)]
pub struct PatchOperations(Vec<PatchOperation>);

impl PatchOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn add(&mut self, path: PointerBuf, value: Value) {
        self.0.push(PatchOperation::Add(AddOperation { path, value }));
    }

    pub fn replace(&mut self, path: PointerBuf, value: Value) {
        self.0
            .push(PatchOperation::Replace(ReplaceOperation { path, value }));
    }

    pub fn remove(&mut self, path: PointerBuf) {
        self.0.push(PatchOperation::Remove(RemoveOperation { path }));
    }

    /// Sets the top-level field `field` to `new` if it differs from
    /// `previous`.
    ///
    /// The API server omits empty lists, so a field which was previously
    /// empty is added instead of replaced. `add` overwrites existing members,
    /// which keeps this correct if the server did store an empty list.
    pub fn set_field<T>(&mut self, field: &str, previous: &T, new: &T, previous_is_empty: bool)
    where
        T: PartialEq + Serialize,
    {
        if previous == new {
            return;
        }

        let path = PointerBuf::from_tokens([field]);
        let value = to_value(new);

        if previous_is_empty {
            self.add(path, value);
        } else {
            self.replace(path, value);
        }
    }

    /// Diffs two string maps stored at `prefix`.
    ///
    /// A previously empty map is added as a whole, otherwise every added,
    /// changed or removed key results in its own operation. Keys are escaped,
    /// so `app.kubernetes.io/name` ends up as `app.kubernetes.io~1name`.
    pub fn diff_string_map(
        &mut self,
        prefix: &[&str],
        previous: &BTreeMap<String, String>,
        new: &BTreeMap<String, String>,
    ) {
        if previous == new {
            return;
        }

        if previous.is_empty() {
            self.add(PointerBuf::from_tokens(prefix.iter().copied()), to_value(new));
            return;
        }

        for (key, value) in new {
            let path = PointerBuf::from_tokens(prefix.iter().copied().chain([key.as_str()]));
            match previous.get(key) {
                None => self.add(path, Value::String(value.clone())),
                Some(previous_value) if previous_value != value => {
                    self.replace(path, Value::String(value.clone()));
                }
                Some(_) => {}
            }
        }

        for key in previous.keys().filter(|key| !new.contains_key(*key)) {
            self.remove(PointerBuf::from_tokens(
                prefix.iter().copied().chain([key.as_str()]),
            ));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatchOperation> {
        self.0.iter()
    }

    pub fn into_patch(self) -> Patch {
        Patch(self.0)
    }
}

impl<'a> IntoIterator for &'a PatchOperations {
    type IntoIter = std::slice::Iter<'a, PatchOperation>;
    type Item = &'a PatchOperation;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Returns the path an operation applies to.
pub fn operation_path(operation: &PatchOperation) -> &str {
    match operation {
        PatchOperation::Add(op) => op.path.as_str(),
        PatchOperation::Remove(op) => op.path.as_str(),
        PatchOperation::Replace(op) => op.path.as_str(),
        PatchOperation::Move(op) => op.path.as_str(),
        PatchOperation::Copy(op) => op.path.as_str(),
        PatchOperation::Test(op) => op.path.as_str(),
    }
}

// The k8s-openapi types and string maps always serialize successfully.
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::rbac::v1::PolicyRule;
    use serde_json::json;

    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    fn serialized(ops: PatchOperations) -> Value {
        serde_json::to_value(ops.into_patch()).expect("patch must serialize")
    }

    #[test]
    fn unchanged_map_yields_nothing() {
        let mut ops = PatchOperations::new();
        let map = labels(&[("app", "web")]);
        ops.diff_string_map(&["metadata", "labels"], &map, &map);

        assert!(ops.is_empty());
    }

    #[test]
    fn previously_empty_map_is_added_whole() {
        let mut ops = PatchOperations::new();
        ops.diff_string_map(
            &["metadata", "labels"],
            &BTreeMap::new(),
            &labels(&[("app", "web"), ("tier", "frontend")]),
        );

        assert_eq!(
            serialized(ops),
            json!([
                { "op": "add", "path": "/metadata/labels", "value": { "app": "web", "tier": "frontend" } }
            ])
        );
    }

    #[test]
    fn map_keys_are_diffed_individually() {
        let mut ops = PatchOperations::new();
        ops.diff_string_map(
            &["metadata", "annotations"],
            &labels(&[("owner", "team-a"), ("stale", "yes"), ("keep", "me")]),
            &labels(&[("owner", "team-b"), ("app.kubernetes.io/name", "web"), ("keep", "me")]),
        );

        assert_eq!(
            serialized(ops),
            json!([
                { "op": "add", "path": "/metadata/annotations/app.kubernetes.io~1name", "value": "web" },
                { "op": "replace", "path": "/metadata/annotations/owner", "value": "team-b" },
                { "op": "remove", "path": "/metadata/annotations/stale" }
            ])
        );
    }

    #[test]
    fn changed_field_is_replaced() {
        let previous = vec![PolicyRule {
            verbs: vec!["get".to_owned()],
            ..PolicyRule::default()
        }];
        let new = vec![PolicyRule {
            verbs: vec!["get".to_owned(), "list".to_owned()],
            ..PolicyRule::default()
        }];

        let mut ops = PatchOperations::new();
        ops.set_field("rules", &previous, &new, false);

        assert_eq!(
            serialized(ops),
            json!([{ "op": "replace", "path": "/rules", "value": [{ "verbs": ["get", "list"] }] }])
        );
    }

    #[test]
    fn previously_empty_field_is_added() {
        let previous: Vec<PolicyRule> = Vec::new();
        let new = vec![PolicyRule {
            verbs: vec!["get".to_owned()],
            ..PolicyRule::default()
        }];

        let mut ops = PatchOperations::new();
        ops.set_field("rules", &previous, &new, true);

        assert_eq!(ops.len(), 1);
        assert!(matches!(ops.iter().next(), Some(PatchOperation::Add(_))));
        assert_eq!(ops.iter().map(operation_path).collect::<Vec<_>>(), ["/rules"]);
    }
}
