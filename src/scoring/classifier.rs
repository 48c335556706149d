// Advisory behavioral classifier (spec.md §4.5 / C5 Classifier).
//
// Never gates a pipeline exit on its own — the Router only ever reads
// `predict()` to decide whether to bump `risk_multiplier` (§4.6 L2). Cluster
// identities are internal and blind; only `label_map` (configuration, not
// code — REDESIGN FLAGS (d)) exposes a display label, and only for logging.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::features::{FeatureVector, FEATURE_DIM};
use crate::error::CoreError;

/// One synthetic training profile, placed far apart in the 7-space so the
/// cold-start centroids separate cleanly (spec.md §4.5).
struct Profile {
    cluster_id: &'static str,
    display_label: &'static str,
    samples: Vec<FeatureVector>,
}

fn synthetic_profiles() -> Vec<Profile> {
    // [duration, rate, recon, lateral, privesc, exfil, pattern_count]
    // Small deterministic jitter per sample avoids four identical points
    // collapsing training into a degenerate single-vector centroid, without
    // pulling in a random-number dependency for four constant profiles.
    let jitter = |i: usize| (i as f64) * 0.01;
    let mut profiles = Vec::new();

    profiles.push(Profile {
        cluster_id: "cluster_bot",
        display_label: "automated_bot",
        samples: (0..4)
            .map(|i| [0.5 + jitter(i), 20.0 + jitter(i), 1.0, 0.0, 0.0, 0.0, 1.0])
            .collect(),
    });

    profiles.push(Profile {
        cluster_id: "cluster_apt",
        display_label: "apt",
        samples: (0..4)
            .map(|i| [8.0 + jitter(i), 0.3 + jitter(i), 1.0, 1.0, 0.0, 1.0, 3.0])
            .collect(),
    });

    profiles.push(Profile {
        cluster_id: "cluster_script_kiddie",
        display_label: "script_kiddie",
        samples: (0..4)
            .map(|i| [1.0 + jitter(i), 15.0 + jitter(i), 1.0, 0.0, 1.0, 0.0, 2.0])
            .collect(),
    });

    profiles.push(Profile {
        cluster_id: "cluster_curious",
        display_label: "curious_user",
        samples: (0..4)
            .map(|i| [4.0 + jitter(i), 2.0 + jitter(i), 1.0, 0.0, 0.0, 0.0, 1.0])
            .collect(),
    });

    profiles
}

fn centroid(samples: &[FeatureVector]) -> FeatureVector {
    let mut sum = [0.0; FEATURE_DIM];
    for s in samples {
        for d in 0..FEATURE_DIM {
            sum[d] += s[d];
        }
    }
    let n = samples.len() as f64;
    for d in sum.iter_mut() {
        *d /= n;
    }
    sum
}

fn squared_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralClassifier {
    trained: bool,
    centroids: Vec<(String, FeatureVector)>,
    label_map: HashMap<String, String>,
}

impl BehavioralClassifier {
    /// Untrained classifier — `predict` returns an empty map until a model
    /// is cold-started or restored.
    pub fn new() -> Self {
        Self {
            trained: false,
            centroids: Vec::new(),
            label_map: HashMap::new(),
        }
    }

    /// Fit on the synthetic cold-start dataset. Used on first run, when no
    /// persisted model exists (spec.md §4.8 Director lifecycle).
    pub fn cold_start() -> Self {
        let mut centroids = Vec::new();
        let mut label_map = HashMap::new();
        for profile in synthetic_profiles() {
            centroids.push((profile.cluster_id.to_string(), centroid(&profile.samples)));
            label_map.insert(profile.cluster_id.to_string(), profile.display_label.to_string());
        }
        Self {
            trained: true,
            centroids,
            label_map,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// `label -> probability`, display labels via `label_map`, summing to 1.
    /// Empty until trained. Distances are converted to a distribution via a
    /// softmax of negative distance, so the nearest centroid dominates but
    /// every label gets nonzero mass.
    pub fn predict(&self, v: &FeatureVector) -> HashMap<String, f64> {
        if !self.trained || self.centroids.is_empty() {
            return HashMap::new();
        }
        let neg_distances: Vec<f64> = self
            .centroids
            .iter()
            .map(|(_, c)| -squared_distance(v, c))
            .collect();
        let max = neg_distances.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = neg_distances.iter().map(|d| (d - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        self.centroids
            .iter()
            .zip(exps.iter())
            .map(|((cluster_id, _), e)| {
                let label = self
                    .label_map
                    .get(cluster_id)
                    .cloned()
                    .unwrap_or_else(|| cluster_id.clone());
                (label, e / sum)
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::CorruptModel(e.to_string()))
    }

    pub fn from_json(data: &str) -> Result<Self, CoreError> {
        serde_json::from_str(data).map_err(|e| CoreError::CorruptModel(e.to_string()))
    }
}

impl Default for BehavioralClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrained_classifier_predicts_empty() {
        let c = BehavioralClassifier::new();
        assert!(!c.is_trained());
        assert!(c.predict(&[0.0; FEATURE_DIM]).is_empty());
    }

    #[test]
    fn trained_probabilities_sum_to_one() {
        let c = BehavioralClassifier::cold_start();
        assert!(c.is_trained());
        let probs = c.predict(&[1.0, 15.0, 1.0, 0.0, 1.0, 0.0, 2.0]);
        let sum: f64 = probs.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_profile_gets_highest_mass() {
        let c = BehavioralClassifier::cold_start();
        let probs = c.predict(&[0.5, 20.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let top = probs.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()).unwrap();
        assert_eq!(top.0, "automated_bot");
    }

    #[test]
    fn json_round_trip() {
        let c = BehavioralClassifier::cold_start();
        let json = c.to_json().unwrap();
        let restored = BehavioralClassifier::from_json(&json).unwrap();
        assert_eq!(restored.is_trained(), c.is_trained());
        assert_eq!(restored.predict(&[1.0; FEATURE_DIM]).len(), c.predict(&[1.0; FEATURE_DIM]).len());
    }
}
