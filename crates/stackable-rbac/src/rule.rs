use k8s_openapi::api::rbac::v1::PolicyRule;
use serde::{Deserialize, Serialize};

use crate::validation::{self, Errors};

/// A single permission grant of a [`ClusterRole`](k8s_openapi::api::rbac::v1::ClusterRole)
/// or [`Role`](k8s_openapi::api::rbac::v1::Role).
///
/// All lists keep their order. Empty lists are never sent as `[""]`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PolicyRuleConfig {
    #[serde(default)]
    pub api_groups: Vec<String>,

    #[serde(default)]
    pub resources: Vec<String>,

    #[serde(default)]
    pub resource_names: Vec<String>,

    #[serde(default)]
    pub non_resource_urls: Vec<String>,

    pub verbs: Vec<String>,
}

impl PolicyRuleConfig {
    pub fn expand(&self) -> PolicyRule {
        PolicyRule {
            api_groups: non_empty(&self.api_groups),
            resources: non_empty(&self.resources),
            resource_names: non_empty(&self.resource_names),
            non_resource_urls: non_empty(&self.non_resource_urls),
            verbs: self.verbs.clone(),
        }
    }

    pub fn flatten(rule: &PolicyRule) -> Self {
        Self {
            api_groups: rule.api_groups.clone().unwrap_or_default(),
            resources: rule.resources.clone().unwrap_or_default(),
            resource_names: rule.resource_names.clone().unwrap_or_default(),
            non_resource_urls: rule.non_resource_urls.clone().unwrap_or_default(),
            verbs: rule.verbs.clone(),
        }
    }

    /// Mirrors the checks the API server applies to policy rules, except for
    /// the api group requirement which is left to the server.
    pub fn validate(&self, field: &str, namespaced: bool) -> Result<(), Errors> {
        let mut errors = Errors::new();

        if self.verbs.is_empty() {
            errors.extend(Err(validation::required(format!("{field}.verbs"))));
        }

        if !self.non_resource_urls.is_empty() {
            if namespaced {
                errors.extend(Err(validation::forbidden(
                    format!("{field}.non_resource_urls"),
                    "namespaced rules cannot apply to non-resource URLs",
                )));
            }

            if !self.api_groups.is_empty()
                || !self.resources.is_empty()
                || !self.resource_names.is_empty()
            {
                errors.extend(Err(validation::forbidden(
                    format!("{field}.non_resource_urls"),
                    "rules cannot apply to both regular resources and non-resource URLs",
                )));
            }
        }

        errors.into_result()
    }
}

pub fn expand_rules(rules: &[PolicyRuleConfig]) -> Vec<PolicyRule> {
    rules.iter().map(PolicyRuleConfig::expand).collect()
}

pub fn flatten_rules(rules: Option<&[PolicyRule]>) -> Vec<PolicyRuleConfig> {
    rules
        .unwrap_or_default()
        .iter()
        .map(PolicyRuleConfig::flatten)
        .collect()
}

pub fn validate_rules(rules: &[PolicyRuleConfig], namespaced: bool) -> Result<(), Errors> {
    let mut errors = Errors::new();

    if rules.is_empty() {
        errors.extend(Err(validation::required("rule")));
    }

    for (index, rule) in rules.iter().enumerate() {
        errors.extend(rule.validate(&format!("rule[{index}]"), namespaced));
    }

    errors.into_result()
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    fn pod_reader() -> PolicyRuleConfig {
        PolicyRuleConfig {
            resources: strings(&["pods"]),
            verbs: strings(&["get", "list"]),
            ..PolicyRuleConfig::default()
        }
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![pod_reader()])]
    #[case(vec![
        PolicyRuleConfig {
            api_groups: strings(&["", "apps"]),
            resources: strings(&["deployments", "pods"]),
            resource_names: strings(&["web"]),
            verbs: strings(&["get", "watch", "list"]),
            ..PolicyRuleConfig::default()
        },
        PolicyRuleConfig {
            non_resource_urls: strings(&["/healthz", "/metrics"]),
            verbs: strings(&["get"]),
            ..PolicyRuleConfig::default()
        },
    ])]
    fn flatten_inverts_expand(#[case] rules: Vec<PolicyRuleConfig>) {
        let expanded = expand_rules(&rules);
        assert_eq!(flatten_rules(Some(expanded.as_slice())), rules);
    }

    #[test]
    fn empty_lists_are_not_sent() {
        let expanded = pod_reader().expand();

        assert_eq!(expanded.api_groups, None);
        assert_eq!(expanded.resource_names, None);
        assert_eq!(expanded.non_resource_urls, None);
        assert_eq!(expanded.resources, Some(strings(&["pods"])));
    }

    #[test]
    fn core_api_group_is_kept() {
        let rule = PolicyRuleConfig {
            api_groups: strings(&[""]),
            ..pod_reader()
        };

        assert_eq!(rule.expand().api_groups, Some(strings(&[""])));
        assert_eq!(PolicyRuleConfig::flatten(&rule.expand()), rule);
    }

    #[test]
    fn absent_rules_flatten_to_empty() {
        assert!(flatten_rules(None).is_empty());
    }

    #[rstest]
    #[case(pod_reader(), true)]
    #[case(pod_reader(), false)]
    #[case(PolicyRuleConfig { non_resource_urls: strings(&["/healthz"]), verbs: strings(&["get"]), ..PolicyRuleConfig::default() }, false)]
    fn validate_pass(#[case] rule: PolicyRuleConfig, #[case] namespaced: bool) {
        assert!(validate_rules(&[rule], namespaced).is_ok());
    }

    #[rstest]
    #[case(PolicyRuleConfig { verbs: vec![], ..pod_reader() }, false)]
    #[case(PolicyRuleConfig { non_resource_urls: strings(&["/healthz"]), verbs: strings(&["get"]), ..PolicyRuleConfig::default() }, true)]
    #[case(PolicyRuleConfig { non_resource_urls: strings(&["/healthz"]), ..pod_reader() }, false)]
    fn validate_fail(#[case] rule: PolicyRuleConfig, #[case] namespaced: bool) {
        assert!(validate_rules(&[rule], namespaced).is_err());
    }

    #[test]
    fn at_least_one_rule_is_required() {
        let errors = validate_rules(&[], false).expect_err("empty rule list must fail");
        assert_eq!(errors.to_string(), "rule is required");
    }
}
