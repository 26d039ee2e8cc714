use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};

use super::{Error, RbacKind, from_yaml_str};
use crate::{
    identifier::{ObjectKey, Scope},
    metadata::ObjectMetadata,
    patch::PatchOperations,
    role_ref::RoleRefConfig,
    subject::{self, SubjectConfig},
    validation::Errors,
};

/// Declared configuration of a namespaced [`RoleBinding`].
///
/// The role reference is immutable, changing it requires the binding to be
/// replaced.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoleBindingConfig {
    pub metadata: ObjectMetadata,

    pub role_ref: RoleRefConfig,

    #[serde(default, rename = "subject")]
    pub subjects: Vec<SubjectConfig>,
}

impl RoleBindingConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, Error> {
        from_yaml_str(input, RoleBinding::KIND_NAME)
    }
}

impl RbacKind for RoleBinding {
    type Config = RoleBindingConfig;

    const KIND_NAME: &'static str = "RoleBinding";
    const SCOPE: Scope = Scope::Namespaced;

    fn api(client: Client, key: &ObjectKey) -> Api<Self> {
        match &key.namespace {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::default_namespaced(client),
        }
    }

    fn config_metadata(config: &Self::Config) -> &ObjectMetadata {
        &config.metadata
    }

    fn expand(config: &Self::Config) -> Self {
        Self {
            metadata: config.metadata.expand(),
            role_ref: config.role_ref.expand(),
            subjects: Some(subject::expand_subjects(&config.subjects)),
        }
    }

    fn flatten(object: &Self) -> Self::Config {
        RoleBindingConfig {
            metadata: ObjectMetadata::flatten(&object.metadata),
            role_ref: RoleRefConfig::flatten(&object.role_ref),
            subjects: subject::flatten_subjects(object.subjects.as_deref()),
        }
    }

    fn validate(config: &Self::Config) -> Result<(), Errors> {
        let mut errors = Errors::new();
        errors.extend(config.metadata.validate(Self::SCOPE));
        errors.extend(config.role_ref.validate());
        errors.extend(subject::validate_subjects(&config.subjects));
        errors.into_result()
    }

    fn immutable_change(previous: &Self::Config, new: &Self::Config) -> Option<&'static str> {
        (previous.role_ref != new.role_ref).then_some("role_ref")
    }

    fn payload_patch(previous: &Self::Config, new: &Self::Config, ops: &mut PatchOperations) {
        ops.set_field(
            "subjects",
            &subject::expand_subjects(&previous.subjects),
            &subject::expand_subjects(&new.subjects),
            previous.subjects.is_empty(),
        );
    }
}
