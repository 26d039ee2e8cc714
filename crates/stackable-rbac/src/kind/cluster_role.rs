use k8s_openapi::api::rbac::v1::ClusterRole;
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

/// Declared configuration of a [`ClusterRole`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClusterRoleConfig {
    pub metadata: ObjectMetadata,

    #[serde(rename = "rule")]
    pub rules: Vec<PolicyRuleConfig>,
}

impl ClusterRoleConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, Error> {
        from_yaml_str(input, ClusterRole::KIND_NAME)
    }
}

impl RbacKind for ClusterRole {
    type Config = ClusterRoleConfig;

    const KIND_NAME: &'static str = "ClusterRole";
    const SCOPE: Scope = Scope::Cluster;

    fn api(client: Client, _key: &ObjectKey) -> Api<Self> {
        Api::all(client)
    }

    fn config_metadata(config: &Self::Config) -> &ObjectMetadata {
        &config.metadata
    }

    fn expand(config: &Self::Config) -> Self {
        Self {
            metadata: config.metadata.expand(),
            rules: Some(rule::expand_rules(&config.rules)),
            ..Self::default()
        }
    }

    fn flatten(object: &Self) -> Self::Config {
        ClusterRoleConfig {
            metadata: ObjectMetadata::flatten(&object.metadata),
            rules: rule::flatten_rules(object.rules.as_deref()),
        }
    }

    fn validate(config: &Self::Config) -> Result<(), Errors> {
        let mut errors = Errors::new();
        errors.extend(config.metadata.validate(Self::SCOPE));
        errors.extend(rule::validate_rules(&config.rules, false));
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
