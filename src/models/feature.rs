use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Rule;

/// A feature flag and its targeting configuration.
///
/// Stored records come in two shapes. Legacy records carry `environments`
/// and a single `rules` list shared by every environment. Modern records carry
/// `environment_settings` with an independent rule list per environment.
/// Both shapes deserialize into this type; the store hands them to the
/// [`Normalizer`](crate::normalize::Normalizer) before returning them, so
/// callers always see `environment_settings` populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Unique within `organization`.
    pub id: String,
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub description: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    /// Type tag for `default_value` (boolean, string, number, json). Not validated.
    #[serde(default)]
    pub value_type: String,
    /// String-encoded value served when no rule matches.
    #[serde(default)]
    pub default_value: String,
    /// Legacy: environments where the feature is switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environments: Option<Vec<String>>,
    /// Legacy: rules shared across all environments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_settings: Option<BTreeMap<String, EnvironmentSetting>>,
}

/// Enable state and ordered rules of a feature within one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSetting {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Partial update for a stored feature.
///
/// Every `Some` field replaces the stored field as a whole. Nested values are
/// never merged: patching `environment_settings` with a single environment
/// drops every other environment from the record. `id` and `organization`
/// identify the record and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeaturePatch {
    pub project: Option<String>,
    pub description: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub value_type: Option<String>,
    pub default_value: Option<String>,
    pub environments: Option<Vec<String>>,
    pub rules: Option<Vec<Rule>>,
    pub environment_settings: Option<BTreeMap<String, EnvironmentSetting>>,
}

impl FeaturePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
