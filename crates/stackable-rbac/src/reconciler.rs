//! The reconciliation contract between an external orchestrator and the API
//! server.
//!
//! An orchestrator holds the declared configuration of an object together
//! with a remembered identifier. On every planning pass it probes the object
//! with [`Reconciler::exists`] and then invokes one of the other operations
//! depending on its own diff. Every operation performs a single remote call
//! and never retries. Conflicts caused by concurrent modifications surface as
//! [`Error::RemoteRejected`].
use std::{fmt::Debug, marker::PhantomData};

use async_trait::async_trait;
use k8s_openapi::api::rbac::v1::{ClusterRole, Role, RoleBinding};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, instrument, warn};

use crate::{
    identifier::{self, ObjectKey},
    kind::RbacKind,
    patch::PatchOperations,
    store::{BoxedError, ObjectStore, StoreError},
    validation,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{kind} {identifier:?} does not exist"))]
    NotFound {
        kind: &'static str,
        identifier: String,
    },

    #[snafu(display("malformed {kind} identifier"))]
    MalformedIdentifier {
        source: identifier::Error,
        kind: &'static str,
    },

    #[snafu(display("the API server rejected the {kind} request with status {code} ({reason}): {message}"))]
    RemoteRejected {
        kind: &'static str,
        code: u16,
        reason: String,
        message: String,
    },

    #[snafu(display("failed to reach the API server"))]
    TransportError { source: BoxedError },

    #[snafu(display("{field} of {kind} {identifier:?} cannot be changed in place"))]
    Immutable {
        kind: &'static str,
        identifier: String,
        field: &'static str,
    },

    #[snafu(display("invalid {kind} configuration"))]
    InvalidConfig {
        source: validation::Errors,
        kind: &'static str,
    },
}

impl Error {
    fn from_store(error: StoreError, kind: &'static str, identifier: &str) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::NotFound {
                kind,
                identifier: identifier.to_owned(),
            },
            StoreError::Rejected {
                code,
                reason,
                message,
            } => Self::RemoteRejected {
                kind,
                code,
                reason,
                message,
            },
            StoreError::Transport { source } => Self::TransportError { source },
        }
    }
}

/// Result of an existence probe.
#[derive(Debug)]
pub enum Existence {
    Found,
    NotFound,

    /// The probe itself failed, the object may or may not exist.
    ProbeError(Error),
}

impl Existence {
    /// Collapses the probe result into a boolean, treating a failed probe as
    /// an existing object.
    ///
    /// A malformed identifier never reached the API server and cannot address
    /// any object, so it counts as absent.
    pub fn assume_exists(&self) -> bool {
        match self {
            Self::Found => true,
            Self::NotFound => false,
            Self::ProbeError(error @ Error::MalformedIdentifier { .. }) => {
                warn!(
                    error = error as &dyn std::error::Error,
                    "existence probe skipped, the identifier is malformed"
                );
                false
            }
            Self::ProbeError(error) => {
                warn!(
                    error = error as &dyn std::error::Error,
                    "existence probe failed, assuming the object exists"
                );
                true
            }
        }
    }
}

/// The lifecycle operations of a declared object.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Config: Clone + Debug + PartialEq + Send + Sync;

    /// Creates the object and returns its identifier.
    async fn create(&self, config: &Self::Config) -> Result<String>;

    /// Reads the object back into its declared shape.
    async fn read(&self, identifier: &str) -> Result<Self::Config>;

    async fn exists(&self, identifier: &str) -> Existence;

    /// Patches every field which differs between `previous` and `new` and
    /// returns the identifier of the updated object.
    async fn update(
        &self,
        identifier: &str,
        previous: &Self::Config,
        new: &Self::Config,
    ) -> Result<String>;

    /// Deletes the object. Deleting an object which is already gone succeeds.
    async fn delete(&self, identifier: &str) -> Result<()>;

    /// Adopts an existing object by identifier.
    async fn import(&self, identifier: &str) -> Result<Self::Config> {
        self.read(identifier).await
    }
}

/// [`Reconciler`] for any [`RbacKind`] backed by an [`ObjectStore`].
pub struct RbacReconciler<K, S> {
    store: S,
    kind: PhantomData<fn() -> K>,
}

pub type ClusterRoleReconciler<S> = RbacReconciler<ClusterRole, S>;
pub type RoleReconciler<S> = RbacReconciler<Role, S>;
pub type RoleBindingReconciler<S> = RbacReconciler<RoleBinding, S>;

impl<K, S> RbacReconciler<K, S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            kind: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<K, S> RbacReconciler<K, S>
where
    K: RbacKind,
{
    fn parse(identifier: &str) -> Result<ObjectKey> {
        ObjectKey::parse(identifier, K::SCOPE).context(MalformedIdentifierSnafu {
            kind: K::KIND_NAME,
        })
    }

    fn identify(object: &K) -> Result<String> {
        ObjectKey::from_meta(object.meta(), K::SCOPE)
            .map(|key| key.to_string())
            .context(MalformedIdentifierSnafu {
                kind: K::KIND_NAME,
            })
    }

    fn validate(config: &K::Config) -> Result<()> {
        K::validate(config).context(InvalidConfigSnafu {
            kind: K::KIND_NAME,
        })
    }
}

#[async_trait]
impl<K, S> Reconciler for RbacReconciler<K, S>
where
    K: RbacKind,
    S: ObjectStore<K>,
{
    type Config = K::Config;

    #[instrument(skip_all, fields(k8s.rbac.kind = K::KIND_NAME))]
    async fn create(&self, config: &K::Config) -> Result<String> {
        Self::validate(config)?;

        let object = K::expand(config);
        let requested = ObjectKey {
            namespace: object.meta().namespace.clone(),
            name: object.meta().name.clone().unwrap_or_default(),
        };

        let created = self
            .store
            .create(&object)
            .await
            .map_err(|err| Error::from_store(err, K::KIND_NAME, &requested.to_string()))?;

        let identifier = Self::identify(&created)?;
        info!(k8s.rbac.identifier = %identifier, "created object");
        Ok(identifier)
    }

    #[instrument(skip(self), fields(k8s.rbac.kind = K::KIND_NAME))]
    async fn read(&self, identifier: &str) -> Result<K::Config> {
        let key = Self::parse(identifier)?;

        let object = self
            .store
            .get(&key)
            .await
            .map_err(|err| Error::from_store(err, K::KIND_NAME, identifier))?;

        Ok(K::flatten(&object))
    }

    #[instrument(skip(self), fields(k8s.rbac.kind = K::KIND_NAME))]
    async fn exists(&self, identifier: &str) -> Existence {
        let key = match Self::parse(identifier) {
            Ok(key) => key,
            Err(error) => return Existence::ProbeError(error),
        };

        match self.store.get(&key).await {
            Ok(_) => Existence::Found,
            Err(StoreError::NotFound { .. }) => {
                debug!("object does not exist");
                Existence::NotFound
            }
            Err(error) => {
                Existence::ProbeError(Error::from_store(error, K::KIND_NAME, identifier))
            }
        }
    }

    #[instrument(skip(self, previous, new), fields(k8s.rbac.kind = K::KIND_NAME))]
    async fn update(
        &self,
        identifier: &str,
        previous: &K::Config,
        new: &K::Config,
    ) -> Result<String> {
        let previous_metadata = K::config_metadata(previous);
        let new_metadata = K::config_metadata(new);

        if let Some(field) = previous_metadata
            .immutable_change(new_metadata)
            .or_else(|| K::immutable_change(previous, new))
        {
            return ImmutableSnafu {
                kind: K::KIND_NAME,
                identifier,
                field,
            }
            .fail();
        }

        Self::validate(new)?;
        let key = Self::parse(identifier)?;

        let mut ops = PatchOperations::new();
        previous_metadata.patch_operations(new_metadata, &mut ops);
        K::payload_patch(previous, new, &mut ops);

        if ops.is_empty() {
            debug!("declared state is unchanged, skipping patch");
            return Ok(identifier.to_owned());
        }

        debug!(operations = ops.len(), "patching object");
        let patched = self
            .store
            .patch(&key, &ops.into_patch())
            .await
            .map_err(|err| Error::from_store(err, K::KIND_NAME, identifier))?;

        let identifier = Self::identify(&patched)?;
        info!(k8s.rbac.identifier = %identifier, "updated object");
        Ok(identifier)
    }

    #[instrument(skip(self), fields(k8s.rbac.kind = K::KIND_NAME))]
    async fn delete(&self, identifier: &str) -> Result<()> {
        let key = Self::parse(identifier)?;

        match self.store.delete(&key).await {
            Ok(()) => {
                info!("deleted object");
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => {
                debug!("object was already deleted");
                Ok(())
            }
            Err(error) => Err(Error::from_store(error, K::KIND_NAME, identifier)),
        }
    }
}
