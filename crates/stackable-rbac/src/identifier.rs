//! Remote identifiers address a single object on the API server.
//!
//! Cluster scoped objects are identified by their bare name, namespaced
//! objects by `<NAMESPACE>/<NAME>`. The composite form must round-trip
//! exactly, see [`build_id`] and [`id_parts`].

use std::fmt::Display;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use snafu::{OptionExt, Snafu, ensure};

/// Separates the namespace from the name in composite identifiers.
pub const SEPARATOR: char = '/';

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display(
        "unexpected identifier format {identifier:?}, expected {expected:?}"
    ))]
    Malformed {
        identifier: String,
        expected: &'static str,
    },

    #[snafu(display("object metadata is missing the name"))]
    MissingName,

    #[snafu(display("object metadata of namespaced object {name:?} is missing the namespace"))]
    MissingNamespace { name: String },
}

/// Whether objects of a kind live in a namespace or in the cluster scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Cluster,
    Namespaced,
}

impl Scope {
    fn expected_format(self) -> &'static str {
        match self {
            Self::Cluster => "name",
            Self::Namespaced => "namespace/name",
        }
    }
}

/// Parsed form of a remote identifier.
///
/// The [`Display`] implementation renders the identifier handed to the
/// orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parses a remote identifier of an object with the given [`Scope`].
    pub fn parse(identifier: &str, scope: Scope) -> Result<Self> {
        match scope {
            Scope::Cluster => {
                ensure!(
                    !identifier.is_empty() && !identifier.contains(SEPARATOR),
                    MalformedSnafu {
                        identifier,
                        expected: scope.expected_format()
                    }
                );
                Ok(Self::cluster(identifier))
            }
            Scope::Namespaced => {
                let (namespace, name) = id_parts(identifier)?;
                ensure!(
                    !namespace.is_empty() && !name.is_empty(),
                    MalformedSnafu {
                        identifier,
                        expected: scope.expected_format()
                    }
                );
                Ok(Self::namespaced(namespace, name))
            }
        }
    }

    /// Derives the key from object metadata, usually the authoritative copy
    /// returned by the API server.
    pub fn from_meta(meta: &ObjectMeta, scope: Scope) -> Result<Self> {
        let name = meta.name.clone().context(MissingNameSnafu)?;

        match scope {
            Scope::Cluster => Ok(Self::cluster(name)),
            Scope::Namespaced => {
                let namespace = meta
                    .namespace
                    .clone()
                    .with_context(|| MissingNamespaceSnafu { name: name.clone() })?;
                Ok(Self::namespaced(namespace, name))
            }
        }
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => f.write_str(&build_id(namespace, &self.name)),
            None => f.write_str(&self.name),
        }
    }
}

/// Joins namespace and name into a composite identifier.
pub fn build_id(namespace: &str, name: &str) -> String {
    format!("{namespace}{SEPARATOR}{name}")
}

/// Splits a composite identifier into namespace and name.
///
/// Fails unless the identifier contains exactly one separator. Either part
/// may be empty, so that any pair joined by [`build_id`] splits back.
pub fn id_parts(identifier: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = identifier.split(SEPARATOR).collect();

    match parts.as_slice() {
        [namespace, name] => Ok(((*namespace).to_owned(), (*name).to_owned())),
        _ => MalformedSnafu {
            identifier,
            expected: Scope::Namespaced.expected_format(),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("default", "pod-reader")]
    #[case("kube-system", "system:controller:bootstrap-signer")]
    #[case("a", "b")]
    #[case("", "pod-reader")]
    #[case("default", "")]
    #[case("", "")]
    fn id_round_trip(#[case] namespace: &str, #[case] name: &str) {
        let identifier = build_id(namespace, name);
        let (parsed_namespace, parsed_name) =
            id_parts(&identifier).expect("composite identifier must split");

        assert_eq!(parsed_namespace, namespace);
        assert_eq!(parsed_name, name);
    }

    #[rstest]
    #[case("")]
    #[case("pod-reader")]
    #[case("default/pod-reader/extra")]
    #[case("a/b/c/d")]
    fn malformed_id(#[case] identifier: &str) {
        let err = id_parts(identifier).expect_err("identifier must be rejected");
        assert_eq!(
            err,
            Error::Malformed {
                identifier: identifier.to_owned(),
                expected: "namespace/name"
            }
        );
    }

    #[rstest]
    #[case("cluster-admin", Scope::Cluster, ObjectKey::cluster("cluster-admin"))]
    #[case("default/reader", Scope::Namespaced, ObjectKey::namespaced("default", "reader"))]
    fn parse_by_scope(#[case] identifier: &str, #[case] scope: Scope, #[case] expected: ObjectKey) {
        let key = ObjectKey::parse(identifier, scope).expect("valid identifier");
        assert_eq!(key, expected);
        assert_eq!(key.to_string(), identifier);
    }

    #[rstest]
    #[case("/pod-reader")]
    #[case("default/")]
    #[case("/")]
    fn namespaced_identifier_requires_both_parts(#[case] identifier: &str) {
        assert_eq!(
            ObjectKey::parse(identifier, Scope::Namespaced),
            Err(Error::Malformed {
                identifier: identifier.to_owned(),
                expected: "namespace/name"
            })
        );
    }

    #[rstest]
    #[case("")]
    #[case("default/cluster-admin")]
    fn cluster_identifier_rejects_separator(#[case] identifier: &str) {
        assert!(matches!(
            ObjectKey::parse(identifier, Scope::Cluster),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn key_from_meta() {
        let meta = ObjectMeta {
            name: Some("reader".to_owned()),
            namespace: Some("default".to_owned()),
            ..ObjectMeta::default()
        };

        assert_eq!(
            ObjectKey::from_meta(&meta, Scope::Namespaced),
            Ok(ObjectKey::namespaced("default", "reader"))
        );
        assert_eq!(
            ObjectKey::from_meta(&meta, Scope::Cluster),
            Ok(ObjectKey::cluster("reader"))
        );
        assert_eq!(
            ObjectKey::from_meta(&ObjectMeta::default(), Scope::Cluster),
            Err(Error::MissingName)
        );
        assert_eq!(
            ObjectKey::from_meta(
                &ObjectMeta {
                    name: Some("reader".to_owned()),
                    ..ObjectMeta::default()
                },
                Scope::Namespaced
            ),
            Err(Error::MissingNamespace {
                name: "reader".to_owned()
            })
        );
    }
}
