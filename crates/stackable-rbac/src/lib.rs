//! This library keeps declared Kubernetes RBAC objects ([`ClusterRole`],
//! [`Role`] and [`RoleBinding`]) synchronized with their counterparts on the
//! API server.
//!
//! Each resource kind is driven through the [`Reconciler`] trait, which
//! exposes the create, read, exists, update and delete operations an
//! external orchestrator invokes after diffing its declared state. The
//! reconciler translates between the statically typed configuration
//! ([`ClusterRoleConfig`], [`RoleConfig`], [`RoleBindingConfig`]) and the
//! `k8s-openapi` structs at every boundary crossing. All durable state lives
//! on the API server, nothing is cached locally.
//!
//! ## Usage
//!
//! ```no_run
//! use stackable_rbac::{
//!     Reconciler, RoleConfig, RoleReconciler, config::ClientOptions, store::KubeStore,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeStore::new(client, &ClientOptions::default());
//! let reconciler = RoleReconciler::new(store);
//!
//! let role = RoleConfig::from_yaml_str(
//!     "
//!     metadata:
//!       name: pod-reader
//!       namespace: default
//!     rule:
//!       - resources: [pods]
//!         verbs: [get, list]
//!     ",
//! )?;
//!
//! let identifier = reconciler.create(&role).await?;
//! assert_eq!(identifier, "default/pod-reader");
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Features
//!
//! - `clap` (default) enables parsing [`config::ClientOptions`] from command
//!   line arguments and environment variables.
//!
//! [`ClusterRole`]: k8s_openapi::api::rbac::v1::ClusterRole
//! [`Role`]: k8s_openapi::api::rbac::v1::Role
//! [`RoleBinding`]: k8s_openapi::api::rbac::v1::RoleBinding

pub mod config;
pub mod identifier;
pub mod kind;
pub mod logging;
pub mod managed;
pub mod metadata;
pub mod patch;
pub mod reconciler;
pub mod role_ref;
pub mod rule;
pub mod store;
pub mod subject;
pub mod validation;

pub use kind::{ClusterRoleConfig, RbacKind, RoleBindingConfig, RoleConfig};
pub use managed::ManagedObject;
pub use reconciler::{
    ClusterRoleReconciler, Error, Existence, RbacReconciler, Reconciler, RoleBindingReconciler,
    RoleReconciler,
};

// External re-exports
pub use k8s_openapi;
pub use kube;
