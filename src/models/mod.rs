//! Domain models for flagstore.
//!
//! - [`Feature`]: a flag with a default value and targeting configuration,
//!   stored in either the legacy or the per-environment shape.
//! - [`EnvironmentSetting`]: enable state and rules for one environment.
//! - [`Rule`]: an ordered targeting rule, optionally with [`WeightedValue`]s.
//! - [`FeaturePatch`]: shallow partial update of a stored feature.

mod feature;
mod rule;

pub use feature::*;
pub use rule::*;
