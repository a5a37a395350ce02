use serde::{Deserialize, Serialize};

/// A targeting rule that can override a feature's default value.
///
/// Rules are evaluated in list order by the evaluation engine, so the order of
/// a rule list is part of its meaning and is preserved verbatim.
///
/// Missing fields fall back to their defaults on decode; rules written by older
/// clients often omit `enabled` or `value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    pub id: String,
    /// Variant tag, e.g. `force`, `rollout` or `experiment`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_key: Option<String>,
    pub value: String,
    /// Fraction of traffic included, in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    /// Context attribute used for bucketing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_attribute: Option<String>,
    pub enabled: bool,
    /// Serialized condition over context attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<WeightedValue>>,
}

/// One variation of a multi-variant rule.
///
/// Weights are expected to sum to at most 1 across a rule's values; that is
/// left to the writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedValue {
    pub value: String,
    pub weight: f64,
}
