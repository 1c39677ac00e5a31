//! Read-only views on a state's values used for reporting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value reported when every tracked action shares the same value.
pub(crate) const NEUTRAL_SCORE: f64 = 0.5;

/// Human-readable bucket for a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceCategory {
    High,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    Medium,
    #[serde(rename = "Low-Medium")]
    LowMedium,
    Low,
}

impl ConfidenceCategory {
    #[must_use]
    pub fn from_score(confidence: f64) -> Self {
        let c = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if c >= 0.8 {
            Self::High
        } else if c >= 0.6 {
            Self::MediumHigh
        } else if c >= 0.4 {
            Self::Medium
        } else if c >= 0.2 {
            Self::LowMedium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for ConfidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "High",
            Self::MediumHigh => "Medium-High",
            Self::Medium => "Medium",
            Self::LowMedium => "Low-Medium",
            Self::Low => "Low",
        })
    }
}

/// Breakdown of how the selected action sits among the state's values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceComponents {
    pub value_spread: f64,
    /// 1-based rank by value; 0 when the action is not tracked.
    pub action_rank: usize,
    pub relative_advantage: f64,
    /// `1 - min(spread / 2, 1)`; 1.0 when nothing separates the actions.
    pub uncertainty: f64,
}

impl ConfidenceComponents {
    #[must_use]
    pub fn compute(values: &BTreeMap<String, f64>, selected: &str) -> Self {
        if values.len() < 2 {
            return Self {
                value_spread: 0.0,
                action_rank: 0,
                relative_advantage: 0.0,
                uncertainty: 1.0,
            };
        }

        let ranked = rank(values);
        let action_rank = ranked
            .iter()
            .position(|(a, _)| *a == selected)
            .map_or(0, |i| i + 1);
        let (min, max) = min_max(values.values().copied());
        let spread = max - min;
        let best = ranked.first().map_or(0.0, |(_, v)| *v);
        let selected_value = values.get(selected).copied().unwrap_or(0.0);
        #[allow(clippy::float_cmp)]
        let relative_advantage = if best == 0.0 {
            0.0
        } else {
            selected_value - best
        };
        let uncertainty = if spread > 0.0 {
            1.0 - (spread / 2.0).min(1.0)
        } else {
            1.0
        };

        Self {
            value_spread: spread,
            action_rank,
            relative_advantage,
            uncertainty,
        }
    }
}

/// Min-max normalizes values into `[0, 1]`; all-equal maps to 0.5.
#[must_use]
pub fn normalize_values(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    if values.is_empty() {
        return BTreeMap::new();
    }
    let (min, max) = min_max(values.values().copied());
    values
        .iter()
        .map(|(action, v)| {
            #[allow(clippy::float_cmp)]
            let n = if max == min {
                NEUTRAL_SCORE
            } else {
                (v - min) / (max - min)
            };
            (action.clone(), n)
        })
        .collect()
}

/// Actions ordered by value, highest first; equal values by action name.
pub(crate) fn rank(values: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = values.iter().map(|(a, v)| (a.as_str(), *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(a, v)| (a.to_string(), *v)).collect()
    }

    #[test]
    fn categories_cover_the_unit_interval() {
        assert_eq!(ConfidenceCategory::from_score(0.95), ConfidenceCategory::High);
        assert_eq!(ConfidenceCategory::from_score(0.8), ConfidenceCategory::High);
        assert_eq!(ConfidenceCategory::from_score(0.6), ConfidenceCategory::MediumHigh);
        assert_eq!(ConfidenceCategory::from_score(0.45), ConfidenceCategory::Medium);
        assert_eq!(ConfidenceCategory::from_score(0.2), ConfidenceCategory::LowMedium);
        assert_eq!(ConfidenceCategory::from_score(0.0), ConfidenceCategory::Low);
        assert_eq!(ConfidenceCategory::from_score(f64::NAN), ConfidenceCategory::Low);
        assert_eq!(ConfidenceCategory::MediumHigh.to_string(), "Medium-High");
    }

    #[test]
    fn normalization_maps_onto_unit_interval() {
        let n = normalize_values(&values(&[("a", 2.0), ("b", -1.0), ("c", 0.5)]));
        assert!((n["a"] - 1.0).abs() < 1e-12);
        assert!(n["b"].abs() < 1e-12);
        assert!((n["c"] - 0.5).abs() < 1e-12);

        let flat = normalize_values(&values(&[("a", 0.3), ("b", 0.3)]));
        assert!(flat.values().all(|v| (*v - 0.5).abs() < 1e-12));
        assert!(normalize_values(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn components_rank_and_spread() {
        let v = values(&[("take_screenshot", 2.0), ("open_photo_viewer", -1.0)]);
        let best = ConfidenceComponents::compute(&v, "take_screenshot");
        assert_eq!(best.action_rank, 1);
        assert!((best.value_spread - 3.0).abs() < 1e-12);
        assert!(best.relative_advantage.abs() < 1e-12);
        assert!(best.uncertainty.abs() < 1e-12);

        let worse = ConfidenceComponents::compute(&v, "open_photo_viewer");
        assert_eq!(worse.action_rank, 2);
        assert!((worse.relative_advantage + 3.0).abs() < 1e-12);

        let untracked = ConfidenceComponents::compute(&v, "volume_up");
        assert_eq!(untracked.action_rank, 0);
    }

    #[test]
    fn components_for_sparse_state() {
        let c = ConfidenceComponents::compute(&values(&[("a", 1.0)]), "a");
        assert_eq!(c.action_rank, 0);
        assert!((c.uncertainty - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rank_breaks_ties_by_name() {
        let v = values(&[("b", 1.0), ("a", 1.0), ("c", 2.0)]);
        let order: Vec<&str> = rank(&v).into_iter().map(|(a, _)| a).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }
}
