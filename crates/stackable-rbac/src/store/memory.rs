use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde_json::Value;
use snafu::Snafu;
use tracing::trace;

use super::{ObjectStore, StoreError};
use crate::{identifier::ObjectKey, kind::RbacKind};

#[derive(Debug, Snafu)]
pub enum SimulatedError {
    #[snafu(display("connection to the object store was lost"))]
    ConnectionLost,
}

/// A failure returned by the next call made against an [`InMemoryStore`].
#[derive(Clone, Debug)]
pub enum Failure {
    Transport,
    Rejected {
        code: u16,
        reason: String,
        message: String,
    },
}

impl Failure {
    pub fn rejected(code: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Rejected {
            code,
            message: format!("request rejected: {reason}"),
            reason,
        }
    }

    fn into_error(self) -> StoreError {
        match self {
            Self::Transport => StoreError::Transport {
                source: Box::new(SimulatedError::ConnectionLost),
            },
            Self::Rejected {
                code,
                reason,
                message,
            } => StoreError::Rejected {
                code,
                reason,
                message,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Create,
    Get,
    Patch,
    Delete,
}

/// A call received by an [`InMemoryStore`].
#[derive(Clone, Debug)]
pub struct Request {
    pub verb: Verb,
    pub kind: &'static str,
    pub key: String,

    /// Only set for [`Verb::Patch`].
    pub patch: Option<json_patch::Patch>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(&'static str, ObjectKey), Value>,
    failures: VecDeque<(Option<Verb>, Failure)>,
    requests: Vec<Request>,
    resource_version: u64,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// An object store that keeps objects in process memory.
///
/// Patches are applied the way the API server applies JSON patches, so
/// operations against missing paths fail just like they would remotely.
/// Clones share the same objects.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure which is returned instead of the result of the next
    /// call. Queued failures are consumed in order.
    pub fn inject_failure(&self, failure: Failure) {
        self.lock().failures.push_back((None, failure));
    }

    /// Queues a failure which is returned by the next call using `verb`.
    pub fn inject_failure_on(&self, verb: Verb, failure: Failure) {
        self.lock().failures.push_back((Some(verb), failure));
    }

    pub fn contains<K: RbacKind>(&self, key: &ObjectKey) -> bool {
        self.lock()
            .objects
            .contains_key(&(K::KIND_NAME, key.clone()))
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    /// Returns every call received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Returns the patches received so far, oldest first.
    pub fn patches(&self) -> Vec<json_patch::Patch> {
        self.lock()
            .requests
            .iter()
            .filter_map(|request| request.patch.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(
        &self,
        verb: Verb,
        kind: &'static str,
        key: &ObjectKey,
        patch: Option<&json_patch::Patch>,
    ) -> Result<MutexGuard<'_, State>, StoreError> {
        trace!(?verb, k8s.rbac.kind = kind, k8s.rbac.key = %key, "received request");

        let mut state = self.lock();
        state.requests.push(Request {
            verb,
            kind,
            key: key.to_string(),
            patch: patch.cloned(),
        });

        let position = state
            .failures
            .iter()
            .position(|(target, _)| target.is_none_or(|target| target == verb));

        match position.and_then(|position| state.failures.remove(position)) {
            Some((_, failure)) => Err(failure.into_error()),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for InMemoryStore
where
    K: RbacKind,
{
    async fn create(&self, object: &K) -> Result<K, StoreError> {
        let key = ObjectKey {
            namespace: object.meta().namespace.clone(),
            name: object.meta().name.clone().unwrap_or_default(),
        };
        let mut state = self.begin(Verb::Create, K::KIND_NAME, &key, None)?;

        if key.name.is_empty() {
            return Err(invalid(K::KIND_NAME, "metadata.name: Required value"));
        }

        if state.objects.contains_key(&(K::KIND_NAME, key.clone())) {
            return Err(StoreError::Rejected {
                code: 409,
                reason: "AlreadyExists".to_owned(),
                message: format!("{} \"{key}\" already exists", K::KIND_NAME),
            });
        }

        let resource_version = state.next_resource_version();
        let mut stored = object.clone();
        let meta = stored.meta_mut();
        meta.uid = Some(format!("{resource_version:0>8}-0000-4000-8000-000000000000"));
        meta.resource_version = Some(resource_version);
        meta.generation = Some(1);

        let value = to_value(&stored)?;
        state.objects.insert((K::KIND_NAME, key), value);
        Ok(stored)
    }

    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        let state = self.begin(Verb::Get, K::KIND_NAME, key, None)?;

        match state.objects.get(&(K::KIND_NAME, key.clone())) {
            Some(value) => from_value(value.clone()),
            None => Err(not_found::<K>(key)),
        }
    }

    async fn patch(&self, key: &ObjectKey, patch: &json_patch::Patch) -> Result<K, StoreError> {
        let mut state = self.begin(Verb::Patch, K::KIND_NAME, key, Some(patch))?;

        let Some(mut value) = state.objects.get(&(K::KIND_NAME, key.clone())).cloned() else {
            return Err(not_found::<K>(key));
        };

        json_patch::patch(&mut value, &patch.0)
            .map_err(|err| invalid(K::KIND_NAME, &err.to_string()))?;

        let mut patched: K = serde_json::from_value(value)
            .map_err(|err| invalid(K::KIND_NAME, &err.to_string()))?;

        if patched.meta().name.as_deref() != Some(key.name.as_str())
            || patched.meta().namespace != key.namespace
        {
            return Err(invalid(
                K::KIND_NAME,
                "metadata.name and metadata.namespace are immutable",
            ));
        }

        let resource_version = state.next_resource_version();
        let meta = patched.meta_mut();
        meta.resource_version = Some(resource_version);
        meta.generation = Some(meta.generation.unwrap_or_default() + 1);

        let value = to_value(&patched)?;
        state.objects.insert((K::KIND_NAME, key.clone()), value);
        Ok(patched)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.begin(Verb::Delete, K::KIND_NAME, key, None)?;

        match state.objects.remove(&(K::KIND_NAME, key.clone())) {
            Some(_) => Ok(()),
            None => Err(not_found::<K>(key)),
        }
    }
}

fn not_found<K: RbacKind>(key: &ObjectKey) -> StoreError {
    StoreError::NotFound {
        kind: K::KIND_NAME.to_owned(),
        key: key.to_string(),
    }
}

fn invalid(kind: &str, message: &str) -> StoreError {
    StoreError::Rejected {
        code: 422,
        reason: "Invalid".to_owned(),
        message: format!("{kind} is invalid: {message}"),
    }
}

fn to_value<K: RbacKind>(object: &K) -> Result<Value, StoreError> {
    serde_json::to_value(object).map_err(|err| StoreError::Transport {
        source: Box::new(err),
    })
}

fn from_value<K: RbacKind>(value: Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(|err| StoreError::Transport {
        source: Box::new(err),
    })
}
