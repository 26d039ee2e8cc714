use async_trait::async_trait;
use kube::{
    Client,
    api::{DeleteParams, Patch, PatchParams, PostParams},
};
use tracing::debug;

use super::{ObjectStore, StoreError};
use crate::{config::ClientOptions, identifier::ObjectKey, kind::RbacKind};

/// This store talks to a Kubernetes API server.
/// It wraps an underlying [`kube::Client`] and carries the request parameters
/// shared by all calls.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    post_params: PostParams,
    patch_params: PatchParams,
    delete_params: DeleteParams,
}

impl KubeStore {
    pub fn new(client: Client, options: &ClientOptions) -> Self {
        Self {
            client,
            post_params: PostParams {
                field_manager: Some(options.field_manager.clone()),
                ..PostParams::default()
            },
            patch_params: PatchParams {
                field_manager: Some(options.field_manager.clone()),
                ..PatchParams::default()
            },
            delete_params: DeleteParams::default(),
        }
    }

    /// Returns a [`kube::Client`] that can be freely used.
    pub fn as_kube_client(&self) -> Client {
        self.client.clone()
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: RbacKind,
{
    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey {
            namespace: object.meta().namespace.clone(),
            name: object.meta().name.clone().unwrap_or_default(),
        };
        debug!(k8s.rbac.kind = K::KIND_NAME, k8s.rbac.key = %key, "creating object");

        K::api(self.client.clone(), &key)
            .create(&self.post_params, object)
            .await
            .map_err(|err| classify::<K>(err, &key))
    }

    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        K::api(self.client.clone(), key)
            .get(&key.name)
            .await
            .map_err(|err| classify::<K>(err, key))
    }

    async fn patch(&self, key: &ObjectKey, patch: &json_patch::Patch) -> Result<K, StoreError> {
        debug!(
            k8s.rbac.kind = K::KIND_NAME,
            k8s.rbac.key = %key,
            operations = patch.0.len(),
            "patching object"
        );

        K::api(self.client.clone(), key)
            .patch(&key.name, &self.patch_params, &Patch::Json::<()>(patch.clone()))
            .await
            .map_err(|err| classify::<K>(err, key))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        K::api(self.client.clone(), key)
            .delete(&key.name, &self.delete_params)
            .await
            .map(|_| ())
            .map_err(|err| classify::<K>(err, key))
    }
}

/// Sorts a client error into not found, rejected by the API server, or a
/// failure to reach it at all.
fn classify<K: RbacKind>(error: kube::Error, key: &ObjectKey) -> StoreError {
    match error {
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound {
            kind: K::KIND_NAME.to_owned(),
            key: key.to_string(),
        },
        kube::Error::Api(response) => StoreError::Rejected {
            code: response.code,
            reason: response.reason,
            message: response.message,
        },
        error => StoreError::Transport {
            source: Box::new(error),
        },
    }
}
