//! Feature extraction from hand landmarks.
//!
//! Turns each landmark frame into the fixed set of named scalar
//! features (motion projections, quad position, curl averages and
//! differences, inter-hand distance), normalized against calibration
//! parameters.  Every feature carries a validity bit; a missing hand
//! or degenerate calibration makes the feature invalid rather than
//! erroring.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::engine::calibration::{Calibration, MotionAxisCal, Quad, RangeCal};
use crate::hand::{landmark, Hand, HandObservation, Landmark, LandmarkFrame, LANDMARK_COUNT};

// ── Feature identity ───────────────────────────────────────

/// Per-hand feature kinds, plus the two-hand distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    MotionUp,
    MotionLeft,
    PosX,
    PosY,
    GestureClosed,
    CurvDiffIndexMiddle,
    CurvDiffMiddleAvgIndexRing,
    HandsDistance,
}

/// Smoothing category; selects the time constant only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureCategory {
    Position,
    Movement,
    Curvature,
    Gesture,
}

/// A resolved feature handle: kind plus hand side (None only for
/// `hands.distance`).  Resolution from names happens once at engine
/// construction; the hot loop works with dense indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureId {
    kind: FeatureKind,
    hand: Option<Hand>,
}

/// Number of distinct features (7 per hand plus the distance).
pub const FEATURE_COUNT: usize = 15;

const PER_HAND_KINDS: [FeatureKind; 7] = [
    FeatureKind::MotionUp,
    FeatureKind::MotionLeft,
    FeatureKind::PosX,
    FeatureKind::PosY,
    FeatureKind::GestureClosed,
    FeatureKind::CurvDiffIndexMiddle,
    FeatureKind::CurvDiffMiddleAvgIndexRing,
];

impl FeatureId {
    pub fn for_hand(kind: FeatureKind, hand: Hand) -> Self {
        debug_assert!(kind != FeatureKind::HandsDistance);
        Self { kind, hand: Some(hand) }
    }

    pub fn hands_distance() -> Self {
        Self { kind: FeatureKind::HandsDistance, hand: None }
    }

    pub fn hand(&self) -> Option<Hand> {
        self.hand
    }

    /// Dense index into a `FeatureSet`.
    pub fn index(&self) -> usize {
        match self.kind {
            FeatureKind::HandsDistance => FEATURE_COUNT - 1,
            kind => {
                let offset = PER_HAND_KINDS.iter().position(|&k| k == kind).unwrap();
                match self.hand {
                    Some(Hand::Left) => offset,
                    Some(Hand::Right) => PER_HAND_KINDS.len() + offset,
                    None => unreachable!("per-hand feature without a hand"),
                }
            }
        }
    }

    /// All feature ids, in dense-index order.
    pub fn all() -> [FeatureId; FEATURE_COUNT] {
        let mut out = [FeatureId::hands_distance(); FEATURE_COUNT];
        let mut i = 0;
        for hand in [Hand::Left, Hand::Right] {
            for kind in PER_HAND_KINDS {
                out[i] = FeatureId::for_hand(kind, hand);
                i += 1;
            }
        }
        out
    }

    /// Parse a feature name such as `right_hand.motion.up`.
    pub fn parse(name: &str) -> Option<FeatureId> {
        if name == "hands.distance" {
            return Some(FeatureId::hands_distance());
        }
        let (hand, rest) = if let Some(rest) = name.strip_prefix("left_hand.") {
            (Hand::Left, rest)
        } else if let Some(rest) = name.strip_prefix("right_hand.") {
            (Hand::Right, rest)
        } else {
            return None;
        };
        let kind = match rest {
            "motion.up" => FeatureKind::MotionUp,
            "motion.left" => FeatureKind::MotionLeft,
            "pos.x" => FeatureKind::PosX,
            "pos.y" => FeatureKind::PosY,
            "gesture.closed" => FeatureKind::GestureClosed,
            "curv.diff.index_minus_middle" => FeatureKind::CurvDiffIndexMiddle,
            "curv.diff.middle_minus_avg_index_ring" => FeatureKind::CurvDiffMiddleAvgIndexRing,
            _ => return None,
        };
        Some(FeatureId::for_hand(kind, hand))
    }

    /// The persisted feature name.
    pub fn name(&self) -> String {
        let suffix = match self.kind {
            FeatureKind::MotionUp => "motion.up",
            FeatureKind::MotionLeft => "motion.left",
            FeatureKind::PosX => "pos.x",
            FeatureKind::PosY => "pos.y",
            FeatureKind::GestureClosed => "gesture.closed",
            FeatureKind::CurvDiffIndexMiddle => "curv.diff.index_minus_middle",
            FeatureKind::CurvDiffMiddleAvgIndexRing => "curv.diff.middle_minus_avg_index_ring",
            FeatureKind::HandsDistance => return "hands.distance".to_string(),
        };
        match self.hand {
            Some(hand) => format!("{}_hand.{}", hand.as_str(), suffix),
            None => suffix.to_string(),
        }
    }

    pub fn category(&self) -> FeatureCategory {
        match self.kind {
            FeatureKind::PosX | FeatureKind::PosY => FeatureCategory::Position,
            FeatureKind::MotionUp | FeatureKind::MotionLeft => FeatureCategory::Movement,
            FeatureKind::CurvDiffIndexMiddle | FeatureKind::CurvDiffMiddleAvgIndexRing => {
                FeatureCategory::Curvature
            }
            FeatureKind::GestureClosed | FeatureKind::HandsDistance => FeatureCategory::Gesture,
        }
    }
}

// ── Samples ────────────────────────────────────────────────

/// One computed feature value with its validity bit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSample {
    pub value: f64,
    pub valid: bool,
}

impl FeatureSample {
    pub const INVALID: FeatureSample = FeatureSample { value: 0.0, valid: false };

    pub fn valid(value: f64) -> Self {
        Self { value, valid: true }
    }
}

/// Dense per-frame feature values, indexed by `FeatureId::index`.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    samples: [FeatureSample; FEATURE_COUNT],
}

impl FeatureSet {
    pub fn invalid() -> Self {
        Self { samples: [FeatureSample::INVALID; FEATURE_COUNT] }
    }

    pub fn get(&self, id: FeatureId) -> FeatureSample {
        self.samples[id.index()]
    }

    pub fn set(&mut self, id: FeatureId, sample: FeatureSample) {
        self.samples[id.index()] = sample;
    }
}

// ── Geometry ───────────────────────────────────────────────

/// Landmark chains per finger: wrist, MCP, PIP, DIP, TIP.  The three
/// interior joints contribute the bend angles.
const FINGER_CHAINS: [[usize; 5]; 4] = [
    [
        landmark::WRIST,
        landmark::INDEX_FINGER_MCP,
        landmark::INDEX_FINGER_PIP,
        landmark::INDEX_FINGER_DIP,
        landmark::INDEX_FINGER_TIP,
    ],
    [
        landmark::WRIST,
        landmark::MIDDLE_FINGER_MCP,
        landmark::MIDDLE_FINGER_PIP,
        landmark::MIDDLE_FINGER_DIP,
        landmark::MIDDLE_FINGER_TIP,
    ],
    [
        landmark::WRIST,
        landmark::RING_FINGER_MCP,
        landmark::RING_FINGER_PIP,
        landmark::RING_FINGER_DIP,
        landmark::RING_FINGER_TIP,
    ],
    [
        landmark::WRIST,
        landmark::PINKY_MCP,
        landmark::PINKY_PIP,
        landmark::PINKY_DIP,
        landmark::PINKY_TIP,
    ],
];

const FINGER_INDEX: usize = 0;
const FINGER_MIDDLE: usize = 1;
const FINGER_RING: usize = 2;

/// Curl of one finger in `[0,1]`: 0 straight, 1 fully folded.
///
/// The bend angle at each of the three interior joints is folded into
/// `(1 - cos θ)/2` and averaged; curl is monotone in every angle.
fn finger_curl(landmarks: &[Landmark; LANDMARK_COUNT], chain: &[usize; 5]) -> f64 {
    let mut total = 0.0;
    for j in 1..=3 {
        let a = landmarks[chain[j - 1]];
        let b = landmarks[chain[j]];
        let c = landmarks[chain[j + 1]];
        let v1 = (a.x - b.x, a.y - b.y, a.z - b.z);
        let v2 = (c.x - b.x, c.y - b.y, c.z - b.z);
        let n1 = (v1.0 * v1.0 + v1.1 * v1.1 + v1.2 * v1.2).sqrt() + 1e-9;
        let n2 = (v2.0 * v2.0 + v2.1 * v2.1 + v2.2 * v2.2).sqrt() + 1e-9;
        let cos_interior =
            ((v1.0 * v2.0 + v1.1 * v2.1 + v1.2 * v2.2) / (n1 * n2)).clamp(-1.0, 1.0);
        // θ = π − interior angle, so (1 − cos θ)/2 = (1 + cos interior)/2.
        total += (1.0 + cos_interior) / 2.0;
    }
    (total / 3.0).clamp(0.0, 1.0)
}

/// Homography sending the quad corners (TL, TR, BR, BL) to the unit
/// square, via the standard 8-parameter solve from four point
/// correspondences.
pub fn quad_homography(quad: &Quad) -> Option<Matrix3<f64>> {
    const DST: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (i, (src, dst)) in quad.iter().zip(DST.iter()).enumerate() {
        let (x, y) = (src[0], src[1]);
        let (u, v) = (dst[0], dst[1]);
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -u * x;
        a[(r, 7)] = -u * y;
        b[r] = u;
        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -v * x;
        a[(r + 1, 7)] = -v * y;
        b[r + 1] = v;
    }
    let h = a.lu().solve(&b)?;
    Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

fn apply_homography(h: &Matrix3<f64>, p: (f64, f64)) -> Option<(f64, f64)> {
    let v = h * Vector3::new(p.0, p.1, 1.0);
    if v[2].abs() < 1e-9 {
        return None;
    }
    Some((v[0] / v[2], v[1] / v[2]))
}

// ── Raw samples (calibration input) ────────────────────────

/// Unnormalized per-hand quantities, as the calibration acquisition
/// records them.
#[derive(Debug, Clone, Copy)]
pub struct RawHandSample {
    pub palm_center: (f64, f64),
    pub closed_mean: f64,
    pub diff_index_middle: f64,
    pub diff_middle_avg_index_ring: f64,
}

pub fn raw_sample(obs: &HandObservation) -> RawHandSample {
    let curls: [f64; 4] =
        std::array::from_fn(|i| finger_curl(&obs.landmarks, &FINGER_CHAINS[i]));
    RawHandSample {
        palm_center: obs.palm_center(),
        closed_mean: curls.iter().sum::<f64>() / 4.0,
        diff_index_middle: curls[FINGER_INDEX] - curls[FINGER_MIDDLE],
        diff_middle_avg_index_ring: curls[FINGER_MIDDLE]
            - (curls[FINGER_INDEX] + curls[FINGER_RING]) / 2.0,
    }
}

// ── Extractor ──────────────────────────────────────────────

/// Computes the full feature set from one landmark frame, against a
/// snapshot of the calibration.  The quad homographies are solved once
/// at construction and reused every tick.
pub struct FeatureExtractor {
    cal: Calibration,
    homography: [Option<Matrix3<f64>>; 2],
}

impl FeatureExtractor {
    pub fn new(cal: &Calibration) -> Self {
        let homography = [
            quad_homography(&cal.left.quad),
            quad_homography(&cal.right.quad),
        ];
        Self { cal: cal.clone(), homography }
    }

    pub fn extract(&self, frame: &LandmarkFrame) -> FeatureSet {
        let mut set = FeatureSet::invalid();
        for hand in [Hand::Left, Hand::Right] {
            if let Some(obs) = frame.hand(hand) {
                self.extract_hand(hand, obs, &mut set);
            }
        }
        self.extract_distance(frame, &mut set);
        set
    }

    fn extract_hand(&self, hand: Hand, obs: &HandObservation, set: &mut FeatureSet) {
        let cal = self.cal.hand(hand);
        let raw = raw_sample(obs);
        let pc = raw.palm_center;

        set.set(
            FeatureId::for_hand(FeatureKind::MotionUp, hand),
            motion_feature(pc, &cal.motion_up),
        );
        set.set(
            FeatureId::for_hand(FeatureKind::MotionLeft, hand),
            motion_feature(pc, &cal.motion_left),
        );

        let h = &self.homography[match hand {
            Hand::Left => 0,
            Hand::Right => 1,
        }];
        let (px, py) = match h.as_ref().and_then(|h| apply_homography(h, pc)) {
            Some((u, v)) => (
                FeatureSample::valid(u.clamp(0.0, 1.0)),
                FeatureSample::valid(v.clamp(0.0, 1.0)),
            ),
            None => (FeatureSample::INVALID, FeatureSample::INVALID),
        };
        set.set(FeatureId::for_hand(FeatureKind::PosX, hand), px);
        set.set(FeatureId::for_hand(FeatureKind::PosY, hand), py);

        set.set(
            FeatureId::for_hand(FeatureKind::GestureClosed, hand),
            normalize(raw.closed_mean, &cal.closed),
        );
        set.set(
            FeatureId::for_hand(FeatureKind::CurvDiffIndexMiddle, hand),
            normalize(raw.diff_index_middle, &cal.diff_index_middle),
        );
        set.set(
            FeatureId::for_hand(FeatureKind::CurvDiffMiddleAvgIndexRing, hand),
            normalize(raw.diff_middle_avg_index_ring, &cal.diff_middle_avg),
        );
    }

    fn extract_distance(&self, frame: &LandmarkFrame, set: &mut FeatureSet) {
        let (Some(left), Some(right)) = (frame.hand(Hand::Left), frame.hand(Hand::Right)) else {
            return;
        };
        let (lx, ly) = left.palm_center();
        let (rx, ry) = right.palm_center();
        let dist = ((lx - rx).powi(2) + (ly - ry).powi(2)).sqrt();
        let scale = (left.palm_width() + right.palm_width()) / 2.0;
        if scale < 1e-6 {
            return;
        }
        set.set(
            FeatureId::hands_distance(),
            normalize(dist / scale, &self.cal.distance),
        );
    }
}

/// Projection of the palm center (relative to the frame center) onto
/// the calibrated axis, scaled so a full calibrated sweep spans [0,1].
fn motion_feature(pc: (f64, f64), cal: &MotionAxisCal) -> FeatureSample {
    if cal.range_norm <= 0.0 {
        return FeatureSample::INVALID;
    }
    let proj = (pc.0 - 0.5) * cal.axis[0] + (pc.1 - 0.5) * cal.axis[1];
    FeatureSample::valid((0.5 + proj / cal.range_norm).clamp(0.0, 1.0))
}

/// Affine normalization to the calibrated range, clamped.  A collapsed
/// range makes the sample invalid.
fn normalize(raw: f64, range: &RangeCal) -> FeatureSample {
    let span = range.max - range.min;
    if span <= 1e-9 {
        return FeatureSample::INVALID;
    }
    FeatureSample::valid(((raw - range.min) / span).clamp(0.0, 1.0))
}

// ── Tests ──────────────────────────────────────────────────
