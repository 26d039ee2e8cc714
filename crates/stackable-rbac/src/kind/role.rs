use k8s_openapi::api::rbac::v1::Role;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};

use super::{Error, RbacKind, from_yaml_str};
use crate::{
    identifier::{ObjectKey, Scope},
    metadata::ObjectMetadata,
    patch::PatchOperations,
    rule::{self, PolicyRuleConfig},
    validation::Errors,
};

/// Declared configuration of a namespaced [`Role`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub metadata: ObjectMetadata,

    #[serde(rename = "rule")]
    pub rules: Vec<PolicyRuleConfig>,
}

impl RoleConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, Error> {
        from_yaml_str(input, Role::KIND_NAME)
    }
}

impl RbacKind for Role {
    type Config = RoleConfig;

    const KIND_NAME: &'static str = "Role";
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
            rules: Some(rule::expand_rules(&config.rules)),
        }
    }

    fn flatten(object: &Self) -> Self::Config {
        RoleConfig {
            metadata: ObjectMetadata::flatten(&object.metadata),
            rules: rule::flatten_rules(object.rules.as_deref()),
        }
    }

    fn validate(config: &Self::Config) -> Result<(), Errors> {
        let mut errors = Errors::new();
        errors.extend(config.metadata.validate(Self::SCOPE));
        errors.extend(rule::validate_rules(&config.rules, true));
        errors.into_result()
    }

    fn payload_patch(previous: &Self::Config, new: &Self::Config, ops: &mut PatchOperations) {
        ops.set_field(
            "rules",
            &rule::expand_rules(&previous.rules),
            &rule::expand_rules(&new.rules),
            previous.rules.is_empty(),
        );
    }
}
