//! The RBAC object kinds managed by this crate.
//!
//! Every kind pairs a `k8s-openapi` struct with its declared configuration
//! and knows how to translate between the two.

use std::fmt::Debug;

use kube::{Api, Client, Resource};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};

use crate::{
    identifier::{ObjectKey, Scope},
    metadata::ObjectMetadata,
    patch::PatchOperations,
    validation::Errors,
};

mod cluster_role;
mod role;
mod role_binding;

pub use cluster_role::ClusterRoleConfig;
pub use role::RoleConfig;
pub use role_binding::RoleBindingConfig;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to deserialize {kind} configuration from YAML"))]
    DeserializeYaml {
        source: serde_yaml::Error,
        kind: &'static str,
    },
}

/// A Kubernetes RBAC object kind which can be reconciled.
pub trait RbacKind:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The declared, desired-state description of an object of this kind.
    type Config: Clone + Debug + PartialEq + Send + Sync;

    /// Kind name used in log messages and errors.
    const KIND_NAME: &'static str;

    const SCOPE: Scope;

    /// Returns the API for the object addressed by `key`.
    fn api(client: Client, key: &ObjectKey) -> Api<Self>;

    fn config_metadata(config: &Self::Config) -> &ObjectMetadata;

    /// Builds the object sent to the API server.
    fn expand(config: &Self::Config) -> Self;

    /// Translates every field of a stored object back into its declared shape.
    fn flatten(object: &Self) -> Self::Config;

    fn validate(config: &Self::Config) -> Result<(), Errors>;

    /// Name of the first payload field which differs between `previous` and
    /// `new` but may not change in place.
    fn immutable_change(_previous: &Self::Config, _new: &Self::Config) -> Option<&'static str> {
        None
    }

    /// Appends one operation per changed payload field.
    fn payload_patch(previous: &Self::Config, new: &Self::Config, ops: &mut PatchOperations);
}

fn from_yaml_str<T: DeserializeOwned>(input: &str, kind: &'static str) -> Result<T, Error> {
    serde_yaml::from_str(input).context(DeserializeYamlSnafu { kind })
}
