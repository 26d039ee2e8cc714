use k8s_openapi::api::rbac::v1::RoleRef;
use serde::{Deserialize, Serialize};

use crate::validation::{self, Errors};

/// The role a binding grants. It cannot be changed once the binding exists.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoleRefConfig {
    pub api_group: String,
    pub kind: String,
    pub name: String,
}

impl RoleRefConfig {
    pub fn expand(&self) -> RoleRef {
        RoleRef {
            api_group: self.api_group.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }

    pub fn flatten(role_ref: &RoleRef) -> Self {
        Self {
            api_group: role_ref.api_group.clone(),
            kind: role_ref.kind.clone(),
            name: role_ref.name.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), Errors> {
        let mut errors = Errors::new();

        if self.kind.is_empty() {
            errors.extend(Err(validation::required("role_ref.kind")));
        }
        if self.name.is_empty() {
            errors.extend(Err(validation::required("role_ref.name")));
        } else {
            errors.field("role_ref.name", validation::is_rbac_name(&self.name));
        }

        errors.into_result()
    }
}
