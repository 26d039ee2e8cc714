//! Declared object metadata and its translation to and from [`ObjectMeta`].

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::{
    identifier::Scope,
    patch::PatchOperations,
    validation::{self, Errors},
};

/// Standard object metadata of a declared RBAC object.
///
/// `name` and `namespace` are immutable once the object was created. The
/// `generation`, `resource_version` and `uid` fields are reported by the API
/// server, they are never sent and never compared.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectMetadata {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl PartialEq for ObjectMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.namespace == other.namespace
            && self.labels == other.labels
            && self.annotations == other.annotations
    }
}

impl Eq for ObjectMetadata {}

impl ObjectMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Builds the metadata sent to the API server. Server reported fields are
    /// left out.
    pub fn expand(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: self.namespace.clone(),
            labels: non_empty(&self.labels),
            annotations: non_empty(&self.annotations),
            ..ObjectMeta::default()
        }
    }

    pub fn flatten(meta: &ObjectMeta) -> Self {
        Self {
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
            labels: meta.labels.clone().unwrap_or_default(),
            annotations: meta.annotations.clone().unwrap_or_default(),
            generation: meta.generation,
            resource_version: meta.resource_version.clone(),
            uid: meta.uid.clone(),
        }
    }

    /// Validates the metadata of an object with the given [`Scope`].
    pub fn validate(&self, scope: Scope) -> Result<(), Errors> {
        let mut errors = Errors::new();
        errors.field("metadata.name", validation::is_rbac_name(&self.name));

        match (scope, &self.namespace) {
            (Scope::Namespaced, Some(namespace)) => {
                errors.field("metadata.namespace", validation::is_rfc_1123_label(namespace));
            }
            (Scope::Namespaced, None) => {
                errors.extend(Err(validation::required("metadata.namespace")));
            }
            (Scope::Cluster, Some(_)) => errors.extend(Err(validation::forbidden(
                "metadata.namespace",
                "cluster scoped objects have no namespace",
            ))),
            (Scope::Cluster, None) => {}
        }

        for (key, value) in &self.labels {
            errors.field(
                format!("metadata.labels[{key:?}]"),
                validation::is_qualified_name(key),
            );
            errors.field(
                format!("metadata.labels[{key:?}]"),
                validation::is_label_value(value),
            );
        }

        for key in self.annotations.keys() {
            errors.field(
                format!("metadata.annotations[{key:?}]"),
                validation::is_qualified_name(key),
            );
        }

        errors.into_result()
    }

    /// Name of the first field of `self` that may not change in place, if it
    /// differs in `new`.
    pub fn immutable_change(&self, new: &Self) -> Option<&'static str> {
        if self.name != new.name {
            Some("metadata.name")
        } else if self.namespace != new.namespace {
            Some("metadata.namespace")
        } else {
            None
        }
    }

    /// Appends the operations turning the labels and annotations of `self`
    /// into those of `new`.
    pub fn patch_operations(&self, new: &Self, ops: &mut PatchOperations) {
        ops.diff_string_map(&["metadata", "annotations"], &self.annotations, &new.annotations);
        ops.diff_string_map(&["metadata", "labels"], &self.labels, &new.labels);
    }
}

fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map.clone())
    }
}
