use serde::Deserialize;

/// Options for the requests sent to the API server.
///
/// This struct can be used as CLI arguments. This functionality is only
/// available if the feature `clap` is enabled.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ClientOptions {
    /// Name recorded as the manager of every field written by create and
    /// patch requests.
    #[cfg_attr(feature = "clap", arg(
        long = "field-manager",
        env = "RBAC_FIELD_MANAGER",
        default_value = ClientOptions::DEFAULT_FIELD_MANAGER
    ))]
    pub field_manager: String,
}

impl ClientOptions {
    pub const DEFAULT_FIELD_MANAGER: &'static str = "stackable-rbac";
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            field_manager: Self::DEFAULT_FIELD_MANAGER.to_owned(),
        }
    }
}
