//! Stateful boolean gates with hysteresis and refractory timing.
//!
//! A gate derives an on/off state from one smoothed feature via a
//! trigger/release threshold pair.  Gates combine by logical AND;
//! hysteresis and refractory are tracked per component.

use tracing::debug;

use crate::engine::features::{FeatureId, FeatureSet};

// ── Threshold op ───────────────────────────────────────────

/// Direction of the threshold comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    /// Triggers when the value rises above the trigger threshold,
    /// releases when it falls to or below the release threshold.
    Above,
    /// Mirrored: triggers below, releases at or above.
    Below,
}

impl ThresholdOp {
    pub fn parse(s: &str) -> Option<ThresholdOp> {
        match s {
            ">" => Some(ThresholdOp::Above),
            "<" => Some(ThresholdOp::Below),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => ">",
            Self::Below => "<",
        }
    }

    pub fn triggers(&self, value: f64, trigger_pct: f64) -> bool {
        match self {
            Self::Above => value > trigger_pct,
            Self::Below => value < trigger_pct,
        }
    }

    pub fn releases(&self, value: f64, release_pct: f64) -> bool {
        match self {
            Self::Above => value <= release_pct,
            Self::Below => value >= release_pct,
        }
    }

    /// The hysteresis inequality this op requires between trigger and
    /// release thresholds.
    pub fn hysteresis_ok(&self, trigger_pct: f64, release_pct: f64) -> bool {
        match self {
            Self::Above => trigger_pct > release_pct,
            Self::Below => trigger_pct < release_pct,
        }
    }
}

// ── Lost-hand policy ───────────────────────────────────────

/// What a gate does while its input feature is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateLostPolicy {
    /// Drop to false immediately, bypassing refractory.
    Release,
    /// Keep the last state.
    Hold,
    /// Force true.
    ForceTrue,
    /// Flip once on entry into the lost state.
    Toggle,
}

// ── Gate ───────────────────────────────────────────────────

/// Parameters for one gate component.
#[derive(Debug, Clone, Copy)]
pub struct GateParams {
    pub input: FeatureId,
    pub op: ThresholdOp,
    pub trigger_pct: f64,
    pub release_pct: f64,
    pub refractory_ms: u64,
    pub lost_policy: GateLostPolicy,
}

/// One gate component with its hysteresis/refractory state.
#[derive(Debug)]
pub struct Gate {
    params: GateParams,
    on: bool,
    t_last: Option<u64>,
    was_lost: bool,
}

impl Gate {
    pub fn new(params: GateParams) -> Self {
        Self { params, on: false, t_last: None, was_lost: false }
    }

    fn refractory_over(&self, t_ms: u64) -> bool {
        match self.t_last {
            Some(t_last) => t_ms.saturating_sub(t_last) >= self.params.refractory_ms,
            None => true,
        }
    }

    /// Evaluate against this frame's smoothed features.
    pub fn update(&mut self, features: &FeatureSet, t_ms: u64) -> bool {
        let sample = features.get(self.params.input);
        if !sample.valid {
            match self.params.lost_policy {
                GateLostPolicy::Release => self.on = false,
                GateLostPolicy::Hold => {}
                GateLostPolicy::ForceTrue => self.on = true,
                GateLostPolicy::Toggle => {
                    if !self.was_lost {
                        self.on = !self.on;
                        self.t_last = Some(t_ms);
                        debug!("gate {} toggled to {} on hand loss", self.params.input.name(), self.on);
                    }
                }
            }
            self.was_lost = true;
            return self.on;
        }
        self.was_lost = false;

        let v = sample.value;
        if !self.on {
            if self.params.op.triggers(v, self.params.trigger_pct) && self.refractory_over(t_ms) {
                self.on = true;
                self.t_last = Some(t_ms);
            }
        } else if self.params.op.releases(v, self.params.release_pct) && self.refractory_over(t_ms) {
            self.on = false;
            self.t_last = Some(t_ms);
        }
        self.on
    }
}

// ── Composition ────────────────────────────────────────────

/// Zero or more gate components ANDed together.  An empty set is
/// always open.
#[derive(Debug, Default)]
pub struct GateSet {
    gates: Vec<Gate>,
}

impl GateSet {
    pub fn new(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    /// Update every component, then AND their states.  Components keep
    /// evolving even when an earlier one is already false.
    pub fn update(&mut self, features: &FeatureSet, t_ms: u64) -> bool {
        let mut all = true;
        for gate in &mut self.gates {
            all &= gate.update(features, t_ms);
        }
        all
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
pub fn test_gate(op: ThresholdOp, trigger: f64, release: f64, refractory_ms: u64) -> Gate {
    Gate::new(GateParams {
        input: FeatureId::hands_distance(),
        op,
        trigger_pct: trigger,
        release_pct: release,
        refractory_ms,
        lost_policy: GateLostPolicy::Release,
    })
}

#[cfg(test)]
fn features_with(value: Option<f64>) -> FeatureSet {
    use crate::engine::features::FeatureSample;
    let mut set = FeatureSet::invalid();
    if let Some(v) = value {
        set.set(FeatureId::hands_distance(), FeatureSample::valid(v));
    }
    set
}

// ── Tests ──────────────────────────────────────────────────
