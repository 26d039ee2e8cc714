//! Drives a single declared object through its lifecycle.
//!
//! [`ManagedObject`] plays the orchestrator side of the [`Reconciler`]
//! contract: it remembers the identifier and the last state read from the API
//! server and decides which operation the next declared state requires.
use tracing::{debug, info};

use crate::reconciler::{Error, Existence, Reconciler};

type Result<T, E = Error> = std::result::Result<T, E>;

pub struct ManagedObject<R: Reconciler> {
    reconciler: R,
    identifier: Option<String>,
    state: Option<R::Config>,
}

impl<R: Reconciler> ManagedObject<R> {
    /// Creates a handle for an object which does not exist yet.
    pub fn new(reconciler: R) -> Self {
        Self {
            reconciler,
            identifier: None,
            state: None,
        }
    }

    /// Adopts the existing object identified by `identifier`.
    pub async fn import(reconciler: R, identifier: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        let state = reconciler.import(&identifier).await?;

        Ok(Self {
            reconciler,
            identifier: Some(identifier),
            state: Some(state),
        })
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// The state observed by the last successful read.
    pub fn state(&self) -> Option<&R::Config> {
        self.state.as_ref()
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    /// Converges the remote object towards `desired` and returns the state
    /// read back afterwards.
    ///
    /// The object is created if it was never created or has disappeared,
    /// otherwise it is updated from the last observed state. The identifier
    /// is remembered as soon as the write succeeds, a failing read-back
    /// leaves it in place.
    pub async fn apply(&mut self, desired: &R::Config) -> Result<&R::Config> {
        let existing = match self.identifier.clone() {
            Some(identifier) => match self.reconciler.exists(&identifier).await {
                Existence::NotFound => {
                    debug!(k8s.rbac.identifier = %identifier, "object disappeared, recreating it");
                    None
                }
                existence => existence.assume_exists().then_some(identifier),
            },
            None => None,
        };

        let identifier = match existing {
            Some(identifier) => {
                let previous = match self.state.take() {
                    Some(previous) => previous,
                    None => self.reconciler.read(&identifier).await?,
                };

                if &previous == desired {
                    self.state = Some(previous);
                    identifier
                } else {
                    let result = self.reconciler.update(&identifier, &previous, desired).await;
                    self.state = Some(previous);
                    result?
                }
            }
            None => {
                self.identifier = None;
                self.state = None;
                self.reconciler.create(desired).await?
            }
        };

        self.identifier = Some(identifier.clone());
        let state = self.reconciler.read(&identifier).await?;
        Ok(&*self.state.insert(state))
    }

    /// Re-reads the remote object. Returns [`None`] and forgets the
    /// identifier if the object no longer exists.
    pub async fn refresh(&mut self) -> Result<Option<&R::Config>> {
        let Some(identifier) = self.identifier.clone() else {
            return Ok(None);
        };

        match self.reconciler.read(&identifier).await {
            Ok(state) => Ok(Some(&*self.state.insert(state))),
            Err(Error::NotFound { .. }) => {
                info!(k8s.rbac.identifier = %identifier, "object no longer exists");
                self.identifier = None;
                self.state = None;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Deletes the remote object. The identifier is only forgotten once the
    /// deletion succeeded.
    pub async fn destroy(&mut self) -> Result<()> {
        if let Some(identifier) = &self.identifier {
            self.reconciler.delete(identifier).await?;
        }

        self.identifier = None;
        self.state = None;
        Ok(())
    }
}
