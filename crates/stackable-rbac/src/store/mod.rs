//! The remote object store which holds the authoritative copy of every
//! object.
//!
//! [`KubeStore`] talks to a Kubernetes API server, [`InMemoryStore`] keeps
//! objects in process and is used to exercise reconcilers without a cluster.

use async_trait::async_trait;
use snafu::Snafu;

use crate::identifier::ObjectKey;

mod kubernetes;
mod memory;

pub use self::{
    kubernetes::KubeStore,
    memory::{Failure, InMemoryStore, Request, SimulatedError, Verb},
};

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classified failure of a single store call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("{kind} {key} not found"))]
    NotFound { kind: String, key: String },

    #[snafu(display("request was rejected with status {code} ({reason}): {message}"))]
    Rejected {
        code: u16,
        reason: String,
        message: String,
    },

    #[snafu(display("failed to reach the object store"))]
    Transport { source: BoxedError },
}

/// Object store verbs for a single object kind `K`.
///
/// Each call is exactly one round trip. Implementations must not retry.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// Creates `object` and returns the stored copy.
    async fn create(&self, object: &K) -> Result<K, StoreError>;

    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError>;

    /// Applies a JSON patch and returns the stored copy.
    async fn patch(&self, key: &ObjectKey, patch: &json_patch::Patch) -> Result<K, StoreError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}
