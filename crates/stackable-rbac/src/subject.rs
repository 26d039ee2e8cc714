use k8s_openapi::api::rbac::v1::Subject;
use serde::{Deserialize, Serialize};

use crate::validation::{self, Errors};

/// An identity (user, group or service account) a binding grants its role to.
///
/// `api_group` and `namespace` are passed through verbatim, unset values stay
/// unset.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SubjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,

    pub kind: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SubjectConfig {
    pub fn expand(&self) -> Subject {
        Subject {
            api_group: self.api_group.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn flatten(subject: &Subject) -> Self {
        Self {
            api_group: subject.api_group.clone(),
            kind: subject.kind.clone(),
            name: subject.name.clone(),
            namespace: subject.namespace.clone(),
        }
    }

    pub fn validate(&self, field: &str) -> Result<(), Errors> {
        let mut errors = Errors::new();

        if self.kind.is_empty() {
            errors.extend(Err(validation::required(format!("{field}.kind"))));
        }
        if self.name.is_empty() {
            errors.extend(Err(validation::required(format!("{field}.name"))));
        }

        errors.into_result()
    }
}

pub fn expand_subjects(subjects: &[SubjectConfig]) -> Vec<Subject> {
    subjects.iter().map(SubjectConfig::expand).collect()
}

pub fn flatten_subjects(subjects: Option<&[Subject]>) -> Vec<SubjectConfig> {
    subjects
        .unwrap_or_default()
        .iter()
        .map(SubjectConfig::flatten)
        .collect()
}

pub fn validate_subjects(subjects: &[SubjectConfig]) -> Result<(), Errors> {
    let mut errors = Errors::new();
    for (index, subject) in subjects.iter().enumerate() {
        errors.extend(subject.validate(&format!("subject[{index}]")));
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn service_account(name: &str, namespace: &str) -> SubjectConfig {
        SubjectConfig {
            kind: "ServiceAccount".to_owned(),
            name: name.to_owned(),
            namespace: Some(namespace.to_owned()),
            ..SubjectConfig::default()
        }
    }

    fn group(name: &str) -> SubjectConfig {
        SubjectConfig {
            api_group: Some("rbac.authorization.k8s.io".to_owned()),
            kind: "Group".to_owned(),
            name: name.to_owned(),
            ..SubjectConfig::default()
        }
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![service_account("builder", "ci")])]
    #[case(vec![group("developers"), service_account("builder", "ci"), group("admins")])]
    fn flatten_inverts_expand(#[case] subjects: Vec<SubjectConfig>) {
        let expanded = expand_subjects(&subjects);
        assert_eq!(flatten_subjects(Some(expanded.as_slice())), subjects);
    }

    #[test]
    fn optional_fields_stay_unset() {
        let expanded = group("developers").expand();

        assert_eq!(expanded.namespace, None);
        assert_eq!(
            expanded.api_group.as_deref(),
            Some("rbac.authorization.k8s.io")
        );
    }

    #[test]
    fn empty_optional_fields_pass_through() {
        let subject = SubjectConfig {
            api_group: Some(String::new()),
            ..service_account("builder", "ci")
        };

        assert_eq!(subject.expand().api_group, Some(String::new()));
        assert_eq!(SubjectConfig::flatten(&subject.expand()), subject);
    }

    #[test]
    fn validate() {
        assert!(validate_subjects(&[group("developers")]).is_ok());

        let errors = validate_subjects(&[group("developers"), SubjectConfig::default()])
            .expect_err("incomplete subject must fail");
        assert_eq!(
            errors.to_string(),
            "subject[1].kind is required, subject[1].name is required"
        );
    }
}
