//! Read-time upgrade of legacy feature records.
//!
//! Legacy records keep one rule list for every environment and a list of the
//! environments where the flag is on. The [`Normalizer`] derives the
//! per-environment `environment_settings` from those fields when a record has
//! none. It works on the in-memory value only; stored rows are never
//! rewritten.

use std::collections::BTreeMap;

use crate::models::{EnvironmentSetting, Feature};

/// Environments recognised when configuration does not name any.
pub const DEFAULT_ENVIRONMENTS: &[&str] = &["dev", "production"];

/// The storage shape of a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureShape {
    /// No `environment_settings`, or an empty map; any targeting lives in
    /// `environments` and `rules`.
    Legacy,
    /// `environment_settings` holds at least one environment.
    Modern,
}

pub fn detect_shape(feature: &Feature) -> FeatureShape {
    if matches!(&feature.environment_settings, Some(settings) if !settings.is_empty()) {
        FeatureShape::Modern
    } else {
        FeatureShape::Legacy
    }
}

/// Upgrades legacy records to the per-environment shape.
///
/// The upgrade is additive: legacy `environments` and `rules` stay on the
/// returned record next to the synthesized settings. Normalizing a modern
/// record returns it unchanged, so the operation is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    environments: Vec<String>,
}

impl Normalizer {
    pub fn new<I, S>(environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: Vec<String> = Vec::new();
        for env in environments {
            let env = env.into();
            if !known.contains(&env) {
                known.push(env);
            }
        }
        Self { environments: known }
    }

    /// Environment names that receive a setting when a legacy record is upgraded.
    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    pub fn normalize(&self, mut feature: Feature) -> Feature {
        if detect_shape(&feature) == FeatureShape::Modern {
            return feature;
        }

        let enabled_in = feature.environments.as_deref().unwrap_or_default();
        let rules = feature.rules.as_deref().unwrap_or_default();

        let settings: BTreeMap<String, EnvironmentSetting> = self
            .environments
            .iter()
            .map(|env| {
                let setting = EnvironmentSetting {
                    enabled: enabled_in.contains(env),
                    rules: rules.to_vec(),
                };
                (env.clone(), setting)
            })
            .collect();

        tracing::debug!(
            feature = %feature.id,
            organization = %feature.organization,
            "upgraded legacy feature record"
        );

        feature.environment_settings = Some(settings);
        feature
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ENVIRONMENTS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rule;
    use chrono::{TimeZone, Utc};

    fn rule(id: &str) -> Rule {
        Rule {
            id: id.to_string(),
            kind: "force".to_string(),
            value: "true".to_string(),
            enabled: true,
            ..Rule::default()
        }
    }

    fn bare_feature() -> Feature {
        let ts = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        Feature {
            id: "f1".to_string(),
            organization: "org1".to_string(),
            project: None,
            description: String::new(),
            date_created: ts,
            date_updated: ts,
            value_type: "boolean".to_string(),
            default_value: "false".to_string(),
            environments: None,
            rules: None,
            environment_settings: None,
        }
    }

    fn legacy(environments: &[&str], rules: Vec<Rule>) -> Feature {
        Feature {
            environments: Some(environments.iter().map(|e| e.to_string()).collect()),
            rules: Some(rules),
            ..bare_feature()
        }
    }

    #[test]
    fn test_upgrades_legacy_record() {
        let r1 = rule("r1");
        let normalized = Normalizer::default().normalize(legacy(&["dev"], vec![r1.clone()]));

        let settings = normalized.environment_settings.expect("settings synthesized");
        assert_eq!(settings.len(), 2);
        assert_eq!(
            settings["dev"],
            EnvironmentSetting {
                enabled: true,
                rules: vec![r1.clone()],
            }
        );
        assert_eq!(
            settings["production"],
            EnvironmentSetting {
                enabled: false,
                rules: vec![r1],
            }
        );
    }

    #[test]
    fn test_keeps_legacy_fields() {
        let original = legacy(&["production"], vec![rule("r1")]);
        let normalized = Normalizer::default().normalize(original.clone());

        assert_eq!(normalized.environments, original.environments);
        assert_eq!(normalized.rules, original.rules);
    }

    #[test]
    fn test_fans_out_rules_in_order() {
        let rules = vec![rule("a"), rule("b"), rule("c")];
        let normalizer = Normalizer::new(["dev", "staging", "production"]);
        let normalized = normalizer.normalize(legacy(&["dev", "staging"], rules.clone()));

        let settings = normalized.environment_settings.unwrap();
        for env in ["dev", "staging", "production"] {
            assert_eq!(settings[env].rules, rules);
            assert_eq!(settings[env].enabled, env != "production");
        }
    }

    #[test]
    fn test_record_without_targeting_is_disabled_everywhere() {
        let normalized = Normalizer::default().normalize(bare_feature());

        let settings = normalized.environment_settings.unwrap();
        assert_eq!(settings.len(), 2);
        assert!(settings.values().all(|s| !s.enabled && s.rules.is_empty()));
    }

    #[test]
    fn test_empty_environment_list_disables_all() {
        let normalized = Normalizer::default().normalize(legacy(&[], vec![rule("r1")]));

        let settings = normalized.environment_settings.unwrap();
        assert!(settings.values().all(|s| !s.enabled));
        assert!(settings.values().all(|s| s.rules.len() == 1));
    }

    #[test]
    fn test_unknown_legacy_environment_is_ignored() {
        let normalized = Normalizer::default().normalize(legacy(&["qa"], vec![]));

        let settings = normalized.environment_settings.unwrap();
        assert!(!settings.contains_key("qa"));
        assert!(settings.values().all(|s| !s.enabled));
    }

    #[test]
    fn test_modern_record_is_untouched() {
        let mut settings = BTreeMap::new();
        settings.insert(
            "production".to_string(),
            EnvironmentSetting {
                enabled: true,
                rules: vec![rule("p1")],
            },
        );
        let modern = Feature {
            environments: Some(vec!["dev".to_string()]),
            rules: Some(vec![rule("stale")]),
            environment_settings: Some(settings),
            ..bare_feature()
        };

        assert_eq!(Normalizer::default().normalize(modern.clone()), modern);
    }

    #[test]
    fn test_empty_settings_map_is_upgraded_from_legacy_fields() {
        let r1 = rule("r1");
        let record = Feature {
            environment_settings: Some(BTreeMap::new()),
            ..legacy(&["dev"], vec![r1.clone()])
        };
        assert_eq!(detect_shape(&record), FeatureShape::Legacy);

        let normalized = Normalizer::default().normalize(record);
        let settings = normalized.environment_settings.unwrap();
        assert_eq!(
            settings["dev"],
            EnvironmentSetting {
                enabled: true,
                rules: vec![r1.clone()],
            }
        );
        assert_eq!(
            settings["production"],
            EnvironmentSetting {
                enabled: false,
                rules: vec![r1],
            }
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = Normalizer::default();
        let records = vec![
            bare_feature(),
            legacy(&["dev"], vec![rule("r1")]),
            legacy(&["dev", "production"], vec![rule("r1"), rule("r2")]),
        ];

        for record in records {
            let once = normalizer.normalize(record);
            assert_eq!(detect_shape(&once), FeatureShape::Modern);
            assert_eq!(normalizer.normalize(once.clone()), once);
        }
    }

    #[test]
    fn test_normalize_is_idempotent_without_known_environments() {
        let normalizer = Normalizer::new(Vec::<String>::new());
        let once = normalizer.normalize(legacy(&["dev"], vec![rule("r1")]));

        assert_eq!(once.environment_settings, Some(BTreeMap::new()));
        assert_eq!(normalizer.normalize(once.clone()), once);
    }

    #[test]
    fn test_duplicate_environment_names_collapse() {
        let normalizer = Normalizer::new(["dev", "dev", "production"]);
        assert_eq!(normalizer.environments(), ["dev", "production"]);
    }
}
