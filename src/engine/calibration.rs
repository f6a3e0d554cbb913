//! Calibration parameters and the guided acquisition state machine.
//!
//! The engine's feature extractor reads learned axes, quads, and
//! min/max ranges from `Calibration`.  `CalibrationSession` collects
//! samples for one hand across five ordered steps and writes the
//! fitted parameters back on each advance.

use nalgebra::{Matrix2, Vector2};
use tracing::{debug, info, warn};

use crate::config::CalibrationEntry;
use crate::engine::features::{raw_sample, FeatureId};
use crate::hand::{Hand, HandObservation};

use std::collections::BTreeMap;

// ── Parameter types ────────────────────────────────────────

/// A learned motion axis: unit direction plus the palm sweep that maps
/// to a full-scale feature excursion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionAxisCal {
    pub axis: [f64; 2],
    pub range_norm: f64,
}

/// A learned raw-value range for affine normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCal {
    pub min: f64,
    pub max: f64,
}

/// Four camera-plane points in TL, TR, BR, BL order.
pub type Quad = [[f64; 2]; 4];

/// The viewport quad: absolute position maps the whole camera frame.
pub const VIEWPORT_QUAD: Quad = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Per-hand calibration block.
#[derive(Debug, Clone, PartialEq)]
pub struct HandCalibration {
    pub motion_up: MotionAxisCal,
    pub motion_left: MotionAxisCal,
    pub quad: Quad,
    pub closed: RangeCal,
    pub diff_index_middle: RangeCal,
    pub diff_middle_avg: RangeCal,
}

impl Default for HandCalibration {
    fn default() -> Self {
        Self {
            motion_up: MotionAxisCal { axis: [0.0, -1.0], range_norm: 0.20 },
            motion_left: MotionAxisCal { axis: [1.0, 0.0], range_norm: 0.20 },
            quad: VIEWPORT_QUAD,
            closed: RangeCal { min: 0.30, max: 0.95 },
            diff_index_middle: RangeCal { min: -0.20, max: 0.50 },
            diff_middle_avg: RangeCal { min: -0.20, max: 0.50 },
        }
    }
}

/// Complete calibration consumed by the feature extractor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Calibration {
    pub left: HandCalibration,
    pub right: HandCalibration,
    pub distance: RangeCal,
}

impl Default for RangeCal {
    fn default() -> Self {
        // Default used for hands.distance; per-feature defaults live in
        // HandCalibration::default.
        Self { min: 0.10, max: 0.80 }
    }
}

impl Calibration {
    pub fn hand(&self, side: Hand) -> &HandCalibration {
        match side {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    fn hand_mut(&mut self, side: Hand) -> &mut HandCalibration {
        match side {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    /// Overlay persisted entries (keyed by feature name) onto defaults.
    pub fn from_entries(entries: &BTreeMap<String, CalibrationEntry>) -> Self {
        let mut cal = Calibration::default();
        for (key, entry) in entries {
            cal.apply_entry(key, entry);
        }
        cal
    }

    fn apply_entry(&mut self, key: &str, entry: &CalibrationEntry) {
        // Quad entries are stored under the "<hand>_hand.pos" base key.
        for side in [Hand::Left, Hand::Right] {
            if key == format!("{}_hand.pos", side.as_str()) {
                if let Some(quad) = entry.quad {
                    self.hand_mut(side).quad = quad;
                }
                return;
            }
        }
        if key == "hands.distance" {
            if let (Some(min), Some(max)) = (entry.min, entry.max) {
                self.distance = RangeCal { min, max };
            }
            return;
        }
        let Some(id) = FeatureId::parse(key) else {
            warn!("ignoring calibration entry for unknown feature `{key}`");
            return;
        };
        let Some(side) = id.hand() else { return };
        let hand = self.hand_mut(side);
        match key.rsplit('.').next() {
            Some("up") | Some("left") if entry.axis.is_some() => {
                let axis = entry.axis.unwrap();
                let range_norm = entry.range_norm.unwrap_or(0.20);
                let target = if key.ends_with(".up") { &mut hand.motion_up } else { &mut hand.motion_left };
                *target = MotionAxisCal { axis, range_norm };
            }
            _ => {
                if let (Some(min), Some(max)) = (entry.min, entry.max) {
                    let range = RangeCal { min, max };
                    if key.ends_with(".gesture.closed") {
                        hand.closed = range;
                    } else if key.ends_with(".index_minus_middle") {
                        hand.diff_index_middle = range;
                    } else if key.ends_with(".middle_minus_avg_index_ring") {
                        hand.diff_middle_avg = range;
                    }
                }
            }
        }
    }

    /// Write every parameter back into the persisted map (all features,
    /// both hands), preserving unrelated keys.
    pub fn write_entries(&self, entries: &mut BTreeMap<String, CalibrationEntry>) {
        for side in [Hand::Left, Hand::Right] {
            let hand = self.hand(side);
            let prefix = format!("{}_hand", side.as_str());
            entries.insert(
                format!("{prefix}.motion.up"),
                CalibrationEntry::motion(hand.motion_up),
            );
            entries.insert(
                format!("{prefix}.motion.left"),
                CalibrationEntry::motion(hand.motion_left),
            );
            entries.insert(format!("{prefix}.pos"), CalibrationEntry::quad(hand.quad));
            entries.insert(
                format!("{prefix}.gesture.closed"),
                CalibrationEntry::range(hand.closed),
            );
            entries.insert(
                format!("{prefix}.curv.diff.index_minus_middle"),
                CalibrationEntry::range(hand.diff_index_middle),
            );
            entries.insert(
                format!("{prefix}.curv.diff.middle_minus_avg_index_ring"),
                CalibrationEntry::range(hand.diff_middle_avg),
            );
        }
        entries.insert("hands.distance".to_string(), CalibrationEntry::range(self.distance));
    }
}

// ── Acquisition steps ──────────────────────────────────────

/// The five ordered acquisition steps for one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    VerticalAxis,
    HorizontalAxis,
    ClosedRange,
    LeftClickRange,
    RightClickRange,
}

impl CalibrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerticalAxis => "vertical-axis",
            Self::HorizontalAxis => "horizontal-axis",
            Self::ClosedRange => "closed-range",
            Self::LeftClickRange => "left-click-range",
            Self::RightClickRange => "right-click-range",
        }
    }

    fn next(self) -> Option<CalibrationStep> {
        match self {
            Self::VerticalAxis => Some(Self::HorizontalAxis),
            Self::HorizontalAxis => Some(Self::ClosedRange),
            Self::ClosedRange => Some(Self::LeftClickRange),
            Self::LeftClickRange => Some(Self::RightClickRange),
            Self::RightClickRange => None,
        }
    }
}

// ── Acquisition session ────────────────────────────────────

/// Collects samples for the active step and writes fitted parameters on
/// each advance.  Dropping the session discards only the pending step;
/// parameters written by earlier advances stay.
#[derive(Debug)]
pub struct CalibrationSession {
    hand: Hand,
    step: CalibrationStep,
    points: Vec<[f64; 2]>,
    values: Vec<f64>,
    vertical_axis: Option<[f64; 2]>,
}

impl CalibrationSession {
    pub fn new(hand: Hand) -> Self {
        info!("calibration started for {} hand", hand.as_str());
        Self {
            hand,
            step: CalibrationStep::VerticalAxis,
            points: Vec::new(),
            values: Vec::new(),
            vertical_axis: None,
        }
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    /// Record one frame's observation of the target hand.
    pub fn record(&mut self, obs: &HandObservation) {
        let raw = raw_sample(obs);
        match self.step {
            CalibrationStep::VerticalAxis | CalibrationStep::HorizontalAxis => {
                self.points.push([raw.palm_center.0, raw.palm_center.1]);
            }
            CalibrationStep::ClosedRange => self.values.push(raw.closed_mean),
            CalibrationStep::LeftClickRange => self.values.push(raw.diff_index_middle),
            CalibrationStep::RightClickRange => self.values.push(raw.diff_middle_avg_index_ring),
        }
    }

    /// Fit and store the current step's parameters, then move to the
    /// next step.  Returns the next step, or None when the session is
    /// complete.  A step without enough samples leaves the existing
    /// parameter untouched.
    pub fn advance(&mut self, cal: &mut Calibration) -> Option<CalibrationStep> {
        let hand = self.hand;
        match self.step {
            CalibrationStep::VerticalAxis => {
                if let Some(axis) = fit_axis(&self.points, None, [0.0, -1.0]) {
                    let range = projection_sweep(&self.points, axis);
                    if range > 1e-6 {
                        cal.hand_mut(hand).motion_up = MotionAxisCal { axis, range_norm: range };
                        self.vertical_axis = Some(axis);
                        info!(
                            "vertical axis for {}: ({:.3}, {:.3}), range {:.3}",
                            hand.as_str(), axis[0], axis[1], range,
                        );
                    } else {
                        warn!("vertical axis sweep degenerate, keeping previous value");
                    }
                } else {
                    warn!("not enough samples for vertical axis, keeping previous value");
                }
            }
            CalibrationStep::HorizontalAxis => {
                let against = self.vertical_axis.unwrap_or(cal.hand(hand).motion_up.axis);
                if let Some(axis) = fit_axis(&self.points, Some(against), [1.0, 0.0]) {
                    let range = projection_sweep(&self.points, axis);
                    if range > 1e-6 {
                        cal.hand_mut(hand).motion_left = MotionAxisCal { axis, range_norm: range };
                        info!(
                            "horizontal axis for {}: ({:.3}, {:.3}), range {:.3}",
                            hand.as_str(), axis[0], axis[1], range,
                        );
                    } else {
                        warn!("horizontal axis sweep degenerate, keeping previous value");
                    }
                } else {
                    warn!("not enough samples for horizontal axis, keeping previous value");
                }
            }
            CalibrationStep::ClosedRange => {
                self.store_range(cal, |h| &mut h.closed);
            }
            CalibrationStep::LeftClickRange => {
                self.store_range(cal, |h| &mut h.diff_index_middle);
            }
            CalibrationStep::RightClickRange => {
                self.store_range(cal, |h| &mut h.diff_middle_avg);
            }
        }
        self.points.clear();
        self.values.clear();
        match self.step.next() {
            Some(next) => {
                self.step = next;
                debug!("calibration step -> {}", next.as_str());
                Some(next)
            }
            None => {
                info!("calibration complete for {} hand", self.hand.as_str());
                None
            }
        }
    }

    fn store_range(
        &self,
        cal: &mut Calibration,
        select: impl FnOnce(&mut HandCalibration) -> &mut RangeCal,
    ) {
        let (min, max) = match sample_extremes(&self.values) {
            Some(extremes) => extremes,
            None => {
                warn!("not enough samples for {}, keeping previous value", self.step.as_str());
                return;
            }
        };
        if max - min < 1e-6 {
            warn!("{} samples span no range, keeping previous value", self.step.as_str());
            return;
        }
        *select(cal.hand_mut(self.hand)) = RangeCal { min, max };
        info!("{}: [{:.3}, {:.3}]", self.step.as_str(), min, max);
    }
}

// ── Fitting ────────────────────────────────────────────────

/// Dominant variance direction of 2-D samples via PCA, optionally
/// orthogonalized against a prior axis.  The sign is chosen so the
/// projection of `positive_toward` onto the result is non-negative
/// (upward-positive for the vertical step, rightward for horizontal).
fn fit_axis(points: &[[f64; 2]], orthogonal_to: Option<[f64; 2]>, positive_toward: [f64; 2]) -> Option<[f64; 2]> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean = points.iter().fold([0.0, 0.0], |m, p| [m[0] + p[0], m[1] + p[1]]);
    let mean = [mean[0] / n, mean[1] / n];

    let mut cov = Matrix2::zeros();
    for p in points {
        let d = Vector2::new(p[0] - mean[0], p[1] - mean[1]);
        cov += d * d.transpose();
    }
    cov /= n;

    let eig = cov.symmetric_eigen();
    let dominant = if eig.eigenvalues[0] >= eig.eigenvalues[1] { 0 } else { 1 };
    if eig.eigenvalues[dominant] < 1e-12 {
        return None;
    }
    let mut axis = Vector2::new(eig.eigenvectors[(0, dominant)], eig.eigenvectors[(1, dominant)]);

    if let Some(prior) = orthogonal_to {
        let prior = Vector2::new(prior[0], prior[1]);
        axis -= prior * axis.dot(&prior);
        if axis.norm() < 1e-9 {
            // Samples ran parallel to the prior axis; fall back to its
            // perpendicular.
            axis = Vector2::new(-prior[1], prior[0]);
        }
    }
    axis = axis.normalize();

    if axis[0] * positive_toward[0] + axis[1] * positive_toward[1] < 0.0 {
        axis = -axis;
    }
    Some([axis[0], axis[1]])
}

/// Full sweep (max minus min) of sample projections along an axis.
fn projection_sweep(points: &[[f64; 2]], axis: [f64; 2]) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in points {
        let proj = p[0] * axis[0] + p[1] * axis[1];
        min = min.min(proj);
        max = max.max(proj);
    }
    if min.is_finite() { max - min } else { 0.0 }
}

fn sample_extremes(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    Some((min, max))
}

// ── Tests ──────────────────────────────────────────────────
