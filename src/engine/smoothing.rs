//! Time-based exponential smoothing of feature values.
//!
//! One EMA per feature; the feature's category only selects the time
//! constant.  All timing derives from frame timestamps, never from the
//! wall clock.

use serde::{Deserialize, Serialize};

use crate::engine::features::{FeatureCategory, FeatureId, FeatureSet, FEATURE_COUNT};

// ── Config ─────────────────────────────────────────────────

/// Smoothing time constants in milliseconds, one per feature category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    #[serde(default = "default_position_ms")]
    pub position_ms: f64,
    #[serde(default = "default_movement_ms")]
    pub movement_ms: f64,
    #[serde(default = "default_curvature_ms")]
    pub curvature_ms: f64,
    #[serde(default = "default_gesture_ms")]
    pub gesture_ms: f64,
}

fn default_position_ms() -> f64 {
    120.0
}
fn default_movement_ms() -> f64 {
    120.0
}
fn default_curvature_ms() -> f64 {
    80.0
}
fn default_gesture_ms() -> f64 {
    80.0
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            position_ms: default_position_ms(),
            movement_ms: default_movement_ms(),
            curvature_ms: default_curvature_ms(),
            gesture_ms: default_gesture_ms(),
        }
    }
}

impl SmoothingConfig {
    pub fn tau_ms(&self, category: FeatureCategory) -> f64 {
        match category {
            FeatureCategory::Position => self.position_ms,
            FeatureCategory::Movement => self.movement_ms,
            FeatureCategory::Curvature => self.curvature_ms,
            FeatureCategory::Gesture => self.gesture_ms,
        }
    }
}

// ── EMA ────────────────────────────────────────────────────

/// Exponential moving average driven by sample timestamps.
#[derive(Debug, Clone)]
pub struct TimeEma {
    tau_ms: f64,
    state: Option<(f64, u64)>,
}

impl TimeEma {
    pub fn new(tau_ms: f64) -> Self {
        Self { tau_ms, state: None }
    }

    /// Fold in a sample at `t_ms` and return the smoothed value.
    ///
    /// τ = 0 passes the sample through.  The first sample, or a sample
    /// whose timestamp does not advance, resets the state to the raw
    /// value.
    pub fn update(&mut self, value: f64, t_ms: u64) -> f64 {
        if self.tau_ms <= 0.0 {
            self.state = Some((value, t_ms));
            return value;
        }
        let smoothed = match self.state {
            Some((prev, t_prev)) if t_ms > t_prev => {
                let dt = (t_ms - t_prev) as f64;
                let alpha = 1.0 - (-dt / self.tau_ms).exp();
                prev + alpha * (value - prev)
            }
            _ => value,
        };
        self.state = Some((smoothed, t_ms));
        smoothed
    }
}

// ── Bank ───────────────────────────────────────────────────

/// One EMA per feature, indexed densely by `FeatureId`.
pub struct SmootherBank {
    emas: [TimeEma; FEATURE_COUNT],
}

impl SmootherBank {
    pub fn new(config: &SmoothingConfig) -> Self {
        let ids = FeatureId::all();
        Self {
            emas: std::array::from_fn(|i| TimeEma::new(config.tau_ms(ids[i].category()))),
        }
    }

    /// Smooth every valid sample in place.  Invalid samples leave their
    /// EMA untouched, so a returning hand restarts from the stale value
    /// with a correspondingly large α.
    pub fn apply(&mut self, set: &mut FeatureSet, t_ms: u64) {
        for id in FeatureId::all() {
            let sample = set.get(id);
            if !sample.valid {
                continue;
            }
            let smoothed = self.emas[id.index()].update(sample.value, t_ms);
            set.set(id, crate::engine::features::FeatureSample::valid(smoothed));
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
