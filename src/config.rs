//! Persisted YAML configuration: parsing, autofill, validation.
//!
//! The file is keyed by `version`, `last_camera`, `smoothing`,
//! `calibration`, and `outputs`.  Loading a missing file creates a
//! default one.  Autofill completes missing smoothing values, a default
//! calibration block for every referenced feature, and kind-specific
//! output defaults.  User-authored `kind:` strings round-trip verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::engine::binding::{EdgeLostPolicy, OutputTarget, ValueLostPolicy};
use crate::engine::calibration::{MotionAxisCal, Quad, RangeCal, VIEWPORT_QUAD};
use crate::engine::features::FeatureId;
use crate::engine::gate::{GateLostPolicy, ThresholdOp};
use crate::engine::smoothing::SmoothingConfig;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ── Errors ─────────────────────────────────────────────────

/// Pre-run configuration errors; the engine refuses to start on any of
/// these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("output `{output}`: unknown kind `{kind}`")]
    UnknownKind { output: String, kind: String },

    #[error("output `{output}`: unknown input feature `{feature}`")]
    UnknownFeature { output: String, feature: String },

    #[error("feature `{0}` has no calibration entry")]
    MissingCalibration(String),

    #[error("invalid threshold op `{0}` (expected `>` or `<`)")]
    InvalidOp(String),

    #[error(
        "output `{output}`: trigger_pct {trigger} and release_pct {release} \
         violate hysteresis for op `{op}`"
    )]
    Hysteresis { output: String, op: String, trigger: f64, release: f64 },

    #[error("output `{output}`: unparsable screen value `{value}`")]
    InvalidScreenValue { output: String, value: String },

    #[error("output `{output}`: lost_hand_policy `{policy}` does not apply here")]
    PolicyMismatch { output: String, policy: String },

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] serde_yaml::Error),
}

// ── Model ──────────────────────────────────────────────────

/// Root of the persisted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub last_camera: CameraConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default)]
    pub calibration: BTreeMap<String, CalibrationEntry>,
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

fn default_version() -> u32 {
    1
}

/// Camera selection persisted across runs.  Consumed by the capture
/// boundary; the engine never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub index: u32,
}

fn default_backend() -> String {
    "any".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { backend: default_backend(), name: String::new(), id: String::new(), index: 0 }
    }
}

/// One calibration block.  Which fields apply depends on the feature:
/// motion axes use `axis`/`range_norm`, position uses `quad`, ranged
/// features use `min`/`max`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_norm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quad: Option<Quad>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl CalibrationEntry {
    pub fn motion(cal: MotionAxisCal) -> Self {
        Self { axis: Some(cal.axis), range_norm: Some(cal.range_norm), ..Default::default() }
    }

    pub fn quad(quad: Quad) -> Self {
        Self { quad: Some(quad), ..Default::default() }
    }

    pub fn range(range: RangeCal) -> Self {
        Self { min: Some(range.min), max: Some(range.max), ..Default::default() }
    }
}

/// The user-authored output kind, preserved verbatim: either a plain
/// string or an explicit trigger/release edge pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindSpec {
    Simple(String),
    Pair { trigger: String, release: String },
}

impl KindSpec {
    pub fn describe(&self) -> String {
        match self {
            Self::Simple(s) => s.clone(),
            Self::Pair { trigger, release } => format!("{{trigger: {trigger}, release: {release}}}"),
        }
    }
}

/// A number, or a symbolic screen dimension such as `screen.width` or
/// `-screen.height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScreenValue {
    Number(f64),
    Symbol(String),
}

impl ScreenValue {
    /// Resolve against the current screen dimensions.
    pub fn resolve(&self, screen: (f64, f64)) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Symbol(s) => {
                let trimmed = s.trim();
                let (negate, name) = match trimmed.strip_prefix('-') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, trimmed),
                };
                let value = match name {
                    "screen.width" => screen.0,
                    "screen.height" => screen.1,
                    other => other.parse::<f64>().ok()?,
                };
                Some(if negate { -value } else { value })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Symbol(s) => s.clone(),
        }
    }
}

/// Raw lost-hand policy value; YAML allows `true` to arrive as a bool
/// and numeric policies as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicySpec {
    Bool(bool),
    Number(f64),
    Name(String),
}

/// Parsed lost-hand policy, before kind-specific narrowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LostHandPolicy {
    Release,
    Hold,
    True,
    Toggle,
    Zero,
    Min,
    Max,
    Center,
    Value(f64),
}

impl LostHandPolicy {
    pub fn parse(spec: &PolicySpec) -> Option<LostHandPolicy> {
        match spec {
            PolicySpec::Bool(true) => Some(Self::True),
            PolicySpec::Bool(false) => None,
            PolicySpec::Number(n) => Some(Self::Value(*n)),
            PolicySpec::Name(name) => match name.as_str() {
                "release" => Some(Self::Release),
                "hold" => Some(Self::Hold),
                "true" => Some(Self::True),
                "toggle" => Some(Self::Toggle),
                "zero" => Some(Self::Zero),
                "min" => Some(Self::Min),
                "max" => Some(Self::Max),
                "center" => Some(Self::Center),
                other => other.parse::<f64>().ok().map(Self::Value),
            },
        }
    }

    /// Narrow to a gate policy.
    pub fn gate_policy(&self) -> Option<GateLostPolicy> {
        match self {
            Self::Release => Some(GateLostPolicy::Release),
            Self::Hold => Some(GateLostPolicy::Hold),
            Self::True => Some(GateLostPolicy::ForceTrue),
            Self::Toggle => Some(GateLostPolicy::Toggle),
            _ => None,
        }
    }

    /// Narrow to a value-binding policy.  `allow_zero` is false for
    /// absolute axes, which have no baseline to clear.
    pub fn value_policy(&self, allow_zero: bool) -> Option<ValueLostPolicy> {
        match self {
            Self::Zero if allow_zero => Some(ValueLostPolicy::Zero),
            Self::Hold => Some(ValueLostPolicy::Hold),
            Self::Min => Some(ValueLostPolicy::Min),
            Self::Max => Some(ValueLostPolicy::Max),
            Self::Center => Some(ValueLostPolicy::Center),
            Self::Value(x) => Some(ValueLostPolicy::Value(*x)),
            _ => None,
        }
    }

    /// Narrow to a stateful-edge policy.
    pub fn edge_policy(&self) -> Option<EdgeLostPolicy> {
        match self {
            Self::Release => Some(EdgeLostPolicy::Release),
            Self::Hold => Some(EdgeLostPolicy::Hold),
            Self::True => Some(EdgeLostPolicy::ForceTrue),
            Self::Toggle => Some(EdgeLostPolicy::Toggle),
            _ => None,
        }
    }
}

/// One gate block inside an output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refractory_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lost_hand_policy: Option<PolicySpec>,
}

/// One output binding block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: KindSpec,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_all: Option<Vec<GateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<ScreenValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<ScreenValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<ScreenValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refractory_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lost_hand_policy: Option<PolicySpec>,
}

impl OutputConfig {
    /// Identifier for logs and errors.
    pub fn display_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.kind.describe())
    }

    /// The configured gates: `gate_all` components, or the single
    /// `gate`, or none.
    pub fn gates(&self) -> Vec<&GateConfig> {
        if let Some(all) = &self.gate_all {
            all.iter().collect()
        } else {
            self.gate.iter().collect()
        }
    }

    fn gates_mut(&mut self) -> Vec<&mut GateConfig> {
        if let Some(all) = &mut self.gate_all {
            all.iter_mut().collect()
        } else {
            self.gate.iter_mut().collect()
        }
    }
}

// ── Defaults ───────────────────────────────────────────────

fn clutch_gate(hand: &str) -> GateConfig {
    GateConfig {
        input: format!("{hand}_hand.gesture.closed"),
        op: Some("<".to_string()),
        trigger_pct: Some(0.5),
        release_pct: Some(0.55),
        refractory_ms: Some(120),
        lost_hand_policy: Some(PolicySpec::Name("release".to_string())),
    }
}

/// The starter config written when no file exists: right-hand cursor
/// with a closed-fist clutch, curl-difference clicks, and two-hand
/// distance scroll.
pub fn default_config() -> Config {
    let outputs = vec![
        OutputConfig {
            id: Some("move_x".to_string()),
            kind: KindSpec::Simple("mouse.move.x".to_string()),
            input: "right_hand.motion.left".to_string(),
            gate: Some(clutch_gate("right")),
            gate_all: None,
            sensitivity: Some(ScreenValue::Symbol("screen.width".to_string())),
            min: None,
            max: None,
            op: None,
            trigger_pct: None,
            release_pct: None,
            refractory_ms: None,
            lost_hand_policy: Some(PolicySpec::Name("zero".to_string())),
        },
        OutputConfig {
            id: Some("move_y".to_string()),
            kind: KindSpec::Simple("mouse.move.y".to_string()),
            input: "right_hand.motion.up".to_string(),
            gate: Some(clutch_gate("right")),
            gate_all: None,
            sensitivity: Some(ScreenValue::Symbol("-screen.height".to_string())),
            min: None,
            max: None,
            op: None,
            trigger_pct: None,
            release_pct: None,
            refractory_ms: None,
            lost_hand_policy: Some(PolicySpec::Name("zero".to_string())),
        },
        OutputConfig {
            id: Some("left_click".to_string()),
            kind: KindSpec::Simple("mouse.click.left".to_string()),
            input: "right_hand.curv.diff.index_minus_middle".to_string(),
            gate: Some(clutch_gate("right")),
            gate_all: None,
            sensitivity: None,
            min: None,
            max: None,
            op: Some(">".to_string()),
            trigger_pct: Some(0.8),
            release_pct: Some(0.6),
            refractory_ms: Some(250),
            lost_hand_policy: Some(PolicySpec::Name("release".to_string())),
        },
        OutputConfig {
            id: Some("right_click".to_string()),
            kind: KindSpec::Simple("mouse.click.right".to_string()),
            input: "right_hand.curv.diff.middle_minus_avg_index_ring".to_string(),
            gate: Some(clutch_gate("right")),
            gate_all: None,
            sensitivity: None,
            min: None,
            max: None,
            op: Some(">".to_string()),
            trigger_pct: Some(0.8),
            release_pct: Some(0.6),
            refractory_ms: Some(250),
            lost_hand_policy: Some(PolicySpec::Name("release".to_string())),
        },
        OutputConfig {
            id: Some("scroll_y".to_string()),
            kind: KindSpec::Simple("mouse.scroll.y".to_string()),
            input: "hands.distance".to_string(),
            gate: Some(GateConfig {
                input: "left_hand.gesture.closed".to_string(),
                op: Some(">".to_string()),
                trigger_pct: Some(0.6),
                release_pct: Some(0.5),
                refractory_ms: Some(120),
                lost_hand_policy: Some(PolicySpec::Name("release".to_string())),
            }),
            gate_all: None,
            sensitivity: Some(ScreenValue::Number(-180.0)),
            min: None,
            max: None,
            op: None,
            trigger_pct: None,
            release_pct: None,
            refractory_ms: None,
            lost_hand_policy: Some(PolicySpec::Name("zero".to_string())),
        },
    ];
    let mut cfg = Config {
        version: 1,
        last_camera: CameraConfig::default(),
        smoothing: SmoothingConfig::default(),
        calibration: BTreeMap::new(),
        outputs,
    };
    ensure_defaults(&mut cfg);
    cfg
}

/// Calibration key for a feature name: position axes share the
/// per-hand `.pos` quad entry.
fn calibration_key(feature: &str) -> String {
    if let Some(base) = feature.strip_suffix(".x").or_else(|| feature.strip_suffix(".y")) {
        if base.ends_with(".pos") {
            return base.to_string();
        }
    }
    feature.to_string()
}

fn default_calibration_entry(key: &str) -> CalibrationEntry {
    if key.ends_with(".motion.up") {
        CalibrationEntry::motion(MotionAxisCal { axis: [0.0, -1.0], range_norm: 0.20 })
    } else if key.ends_with(".motion.left") {
        CalibrationEntry::motion(MotionAxisCal { axis: [1.0, 0.0], range_norm: 0.20 })
    } else if key.ends_with(".pos") {
        CalibrationEntry::quad(VIEWPORT_QUAD)
    } else if key.ends_with(".gesture.closed") {
        CalibrationEntry::range(RangeCal { min: 0.30, max: 0.95 })
    } else if key.contains(".curv.") {
        CalibrationEntry::range(RangeCal { min: -0.20, max: 0.50 })
    } else if key.ends_with(".distance") {
        CalibrationEntry::range(RangeCal { min: 0.10, max: 0.80 })
    } else {
        CalibrationEntry::range(RangeCal { min: 0.0, max: 1.0 })
    }
}

/// Fill in everything the user left out: calibration blocks for every
/// referenced feature, kind-specific output defaults, gate defaults.
pub fn ensure_defaults(cfg: &mut Config) {
    // Referenced features (inputs plus gate inputs).
    let mut referenced: BTreeSet<String> = BTreeSet::new();
    for output in &cfg.outputs {
        referenced.insert(output.input.clone());
        for gate in output.gates() {
            referenced.insert(gate.input.clone());
        }
    }
    for feature in referenced {
        let key = calibration_key(&feature);
        cfg.calibration
            .entry(key.clone())
            .or_insert_with(|| default_calibration_entry(&key));
    }

    for output in &mut cfg.outputs {
        if let KindSpec::Simple(kind) = &output.kind {
            let kind = kind.clone();
            if kind.starts_with("mouse.move.") {
                let dim = if kind.ends_with(".x") { "screen.width" } else { "screen.height" };
                output
                    .sensitivity
                    .get_or_insert_with(|| ScreenValue::Symbol(dim.to_string()));
                output
                    .lost_hand_policy
                    .get_or_insert_with(|| PolicySpec::Name("zero".to_string()));
            } else if kind.starts_with("mouse.scroll.") {
                output.sensitivity.get_or_insert(ScreenValue::Number(120.0));
                output
                    .lost_hand_policy
                    .get_or_insert_with(|| PolicySpec::Name("zero".to_string()));
            } else if kind.starts_with("mouse.pos.") {
                let dim = if kind.ends_with(".x") { "screen.width" } else { "screen.height" };
                output.min.get_or_insert(ScreenValue::Number(0.0));
                output.max.get_or_insert_with(|| ScreenValue::Symbol(dim.to_string()));
                output
                    .lost_hand_policy
                    .get_or_insert_with(|| PolicySpec::Name("hold".to_string()));
            }
        }
        if is_stateful_kind(&output.kind) {
            output.op.get_or_insert_with(|| ">".to_string());
            output.trigger_pct.get_or_insert(0.80);
            output.release_pct.get_or_insert(0.60);
            output.refractory_ms.get_or_insert(250);
            output
                .lost_hand_policy
                .get_or_insert_with(|| PolicySpec::Name("release".to_string()));
        }
        for gate in output.gates_mut() {
            gate.op.get_or_insert_with(|| ">".to_string());
            gate.trigger_pct.get_or_insert(0.5);
            gate.release_pct.get_or_insert(0.45);
            gate.refractory_ms.get_or_insert(120);
            gate.lost_hand_policy
                .get_or_insert_with(|| PolicySpec::Name("release".to_string()));
        }
    }
}

fn is_stateful_kind(kind: &KindSpec) -> bool {
    match kind {
        KindSpec::Pair { .. } => true,
        KindSpec::Simple(s) => {
            matches!(OutputTarget::parse(s), Some(OutputTarget::Stateful { .. }))
        }
    }
}

// ── Validation ─────────────────────────────────────────────

impl Config {
    /// Check everything the engine will rely on.  Run after
    /// `ensure_defaults`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for output in &self.outputs {
            let id = output.display_id();
            let target = parse_target(output)?;

            let feature =
                FeatureId::parse(&output.input).ok_or_else(|| ConfigError::UnknownFeature {
                    output: id.clone(),
                    feature: output.input.clone(),
                })?;
            self.require_calibration(&feature.name())?;

            for gate in output.gates() {
                let gate_feature =
                    FeatureId::parse(&gate.input).ok_or_else(|| ConfigError::UnknownFeature {
                        output: id.clone(),
                        feature: gate.input.clone(),
                    })?;
                self.require_calibration(&gate_feature.name())?;
                let op_str = gate.op.as_deref().unwrap_or(">");
                let op = ThresholdOp::parse(op_str)
                    .ok_or_else(|| ConfigError::InvalidOp(op_str.to_string()))?;
                let trigger = gate.trigger_pct.unwrap_or(0.5);
                let release = gate.release_pct.unwrap_or(0.45);
                if !op.hysteresis_ok(trigger, release) {
                    return Err(ConfigError::Hysteresis {
                        output: id.clone(),
                        op: op.as_str().to_string(),
                        trigger,
                        release,
                    });
                }
                let policy = parse_policy(gate.lost_hand_policy.as_ref(), &id)?;
                if policy.gate_policy().is_none() {
                    return Err(ConfigError::PolicyMismatch {
                        output: id.clone(),
                        policy: format!("{policy:?}"),
                    });
                }
            }

            let policy = parse_policy(output.lost_hand_policy.as_ref(), &id)?;
            match target {
                OutputTarget::Delta(_) => {
                    let sensitivity =
                        output.sensitivity.clone().unwrap_or(ScreenValue::Number(1.0));
                    if sensitivity.resolve((1.0, 1.0)).is_none() {
                        return Err(ConfigError::InvalidScreenValue {
                            output: id.clone(),
                            value: sensitivity.describe(),
                        });
                    }
                    if policy.value_policy(true).is_none() {
                        return Err(ConfigError::PolicyMismatch {
                            output: id,
                            policy: format!("{policy:?}"),
                        });
                    }
                }
                OutputTarget::Absolute(_) => {
                    for bound in [&output.min, &output.max].into_iter().flatten() {
                        if bound.resolve((1.0, 1.0)).is_none() {
                            return Err(ConfigError::InvalidScreenValue {
                                output: id.clone(),
                                value: bound.describe(),
                            });
                        }
                    }
                    if policy.value_policy(false).is_none() {
                        return Err(ConfigError::PolicyMismatch {
                            output: id,
                            policy: format!("{policy:?}"),
                        });
                    }
                }
                OutputTarget::Stateful { .. } => {
                    let op_str = output.op.as_deref().unwrap_or(">");
                    let op = ThresholdOp::parse(op_str)
                        .ok_or_else(|| ConfigError::InvalidOp(op_str.to_string()))?;
                    let trigger = output.trigger_pct.unwrap_or(0.80);
                    let release = output.release_pct.unwrap_or(0.60);
                    if !op.hysteresis_ok(trigger, release) {
                        return Err(ConfigError::Hysteresis {
                            output: id.clone(),
                            op: op.as_str().to_string(),
                            trigger,
                            release,
                        });
                    }
                    if policy.edge_policy().is_none() {
                        return Err(ConfigError::PolicyMismatch {
                            output: id,
                            policy: format!("{policy:?}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn require_calibration(&self, feature: &str) -> Result<(), ConfigError> {
        let key = calibration_key(feature);
        if self.calibration.contains_key(&key) {
            Ok(())
        } else {
            Err(ConfigError::MissingCalibration(feature.to_string()))
        }
    }
}

/// Parse the output's kind into a target.
pub fn parse_target(output: &OutputConfig) -> Result<OutputTarget, ConfigError> {
    let id = output.display_id();
    match &output.kind {
        KindSpec::Simple(kind) => OutputTarget::parse(kind).ok_or_else(|| {
            ConfigError::UnknownKind { output: id, kind: kind.clone() }
        }),
        KindSpec::Pair { trigger, release } => {
            let press = OutputTarget::parse_edge(trigger).ok_or_else(|| {
                ConfigError::UnknownKind { output: id.clone(), kind: trigger.clone() }
            })?;
            let release = OutputTarget::parse_edge(release).ok_or_else(|| {
                ConfigError::UnknownKind { output: id.clone(), kind: release.clone() }
            })?;
            Ok(OutputTarget::Stateful { press: Some(press), release: Some(release) })
        }
    }
}

/// Parse a policy spec, defaulting to `release` when absent.
pub fn parse_policy(
    spec: Option<&PolicySpec>,
    output: &str,
) -> Result<LostHandPolicy, ConfigError> {
    match spec {
        None => Ok(LostHandPolicy::Release),
        Some(spec) => LostHandPolicy::parse(spec).ok_or_else(|| ConfigError::PolicyMismatch {
            output: output.to_string(),
            policy: format!("{spec:?}"),
        }),
    }
}

// ── File I/O ───────────────────────────────────────────────

/// Load the config file, creating a default one when missing.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!("config not found at {}, creating a default", path.display());
        let cfg = default_config();
        save(path, &cfg)?;
        return Ok(cfg);
    }
    let content = std::fs::read_to_string(path)?;
    let cfg = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Write the config back, preserving user-authored kind strings.
pub fn save(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    let content = serde_yaml::to_string(cfg)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Default config location under the user's config directory.
pub fn default_path() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|d| d.join("handmouse").join("config.yaml"))
        .unwrap_or_else(|| std::path::PathBuf::from("config.yaml"))
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_validates() {
        let cfg = default_config();
        cfg.validate().expect("default config must be valid");
    }

    #[test]
    fn test_autofill_inserts_calibration_for_gate_inputs() {
        let cfg = default_config();
        assert!(cfg.calibration.contains_key("right_hand.gesture.closed"));
        assert!(cfg.calibration.contains_key("right_hand.motion.up"));
        assert!(cfg.calibration.contains_key("hands.distance"));
        let closed = &cfg.calibration["right_hand.gesture.closed"];
        assert_eq!(closed.min, Some(0.30));
        assert_eq!(closed.max, Some(0.95));
    }

    #[test]
    fn test_autofill_position_quad_shared_key() {
        let mut cfg = default_config();
        cfg.outputs.push(OutputConfig {
            id: Some("pos_x".to_string()),
            kind: KindSpec::Simple("mouse.pos.x".to_string()),
            input: "right_hand.pos.x".to_string(),
            gate: None,
            gate_all: None,
            sensitivity: None,
            min: None,
            max: None,
            op: None,
            trigger_pct: None,
            release_pct: None,
            refractory_ms: None,
            lost_hand_policy: None,
        });
        ensure_defaults(&mut cfg);
        let entry = cfg.calibration.get("right_hand.pos").expect("quad entry");
        assert_eq!(entry.quad, Some(VIEWPORT_QUAD));
        // Absolute defaults: screen edges and hold policy.
        let out = cfg.outputs.last().unwrap();
        assert_eq!(out.min, Some(ScreenValue::Number(0.0)));
        assert_eq!(out.max, Some(ScreenValue::Symbol("screen.width".to_string())));
        assert_eq!(out.lost_hand_policy, Some(PolicySpec::Name("hold".to_string())));
        cfg.validate().expect("still valid");
    }

    #[test]
    fn test_autofill_stateful_defaults() {
        let mut cfg = Config {
            version: 1,
            last_camera: CameraConfig::default(),
            smoothing: SmoothingConfig::default(),
            calibration: BTreeMap::new(),
            outputs: vec![OutputConfig {
                id: None,
                kind: KindSpec::Simple("key.space".to_string()),
                input: "left_hand.gesture.closed".to_string(),
                gate: None,
                gate_all: None,
                sensitivity: None,
                min: None,
                max: None,
                op: None,
                trigger_pct: None,
                release_pct: None,
                refractory_ms: None,
                lost_hand_policy: None,
            }],
        };
        ensure_defaults(&mut cfg);
        let out = &cfg.outputs[0];
        assert_eq!(out.op.as_deref(), Some(">"));
        assert_eq!(out.trigger_pct, Some(0.80));
        assert_eq!(out.release_pct, Some(0.60));
        assert_eq!(out.refractory_ms, Some(250));
        cfg.validate().expect("valid after autofill");
    }

    #[test]
    fn test_scroll_sensitivity_default() {
        let mut cfg = Config {
            version: 1,
            last_camera: CameraConfig::default(),
            smoothing: SmoothingConfig::default(),
            calibration: BTreeMap::new(),
            outputs: vec![OutputConfig {
                id: None,
                kind: KindSpec::Simple("mouse.scroll.y".to_string()),
                input: "hands.distance".to_string(),
                gate: None,
                gate_all: None,
                sensitivity: None,
                min: None,
                max: None,
                op: None,
                trigger_pct: None,
                release_pct: None,
                refractory_ms: None,
                lost_hand_policy: None,
            }],
        };
        ensure_defaults(&mut cfg);
        assert_eq!(cfg.outputs[0].sensitivity, Some(ScreenValue::Number(120.0)));
        assert_eq!(
            cfg.outputs[0].lost_hand_policy,
            Some(PolicySpec::Name("zero".to_string())),
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut cfg = default_config();
        cfg.outputs[0].kind = KindSpec::Simple("mouse.warp".to_string());
        match cfg.validate() {
            Err(ConfigError::UnknownKind { kind, .. }) => assert_eq!(kind, "mouse.warp"),
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let mut cfg = default_config();
        cfg.outputs[0].input = "right_hand.curv.thumb".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownFeature { .. })));
    }

    #[test]
    fn test_missing_calibration_rejected() {
        let mut cfg = default_config();
        cfg.calibration.remove("right_hand.motion.left");
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingCalibration(_))));
    }

    #[test]
    fn test_hysteresis_violation_rejected() {
        let mut cfg = default_config();
        // left_click has op ">": trigger must exceed release.
        let click = cfg.outputs.iter_mut().find(|o| o.id.as_deref() == Some("left_click")).unwrap();
        click.trigger_pct = Some(0.5);
        click.release_pct = Some(0.7);
        assert!(matches!(cfg.validate(), Err(ConfigError::Hysteresis { .. })));
    }

    #[test]
    fn test_gate_hysteresis_violation_rejected() {
        let mut cfg = default_config();
        let gate = cfg.outputs[0].gate.as_mut().unwrap();
        // op "<" needs trigger below release.
        gate.op = Some("<".to_string());
        gate.trigger_pct = Some(0.6);
        gate.release_pct = Some(0.5);
        assert!(matches!(cfg.validate(), Err(ConfigError::Hysteresis { .. })));
    }

    #[test]
    fn test_unparsable_sensitivity_rejected() {
        let mut cfg = default_config();
        cfg.outputs[0].sensitivity = Some(ScreenValue::Symbol("screen.depth".to_string()));
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidScreenValue { .. })));
    }

    #[test]
    fn test_policy_mismatch_rejected() {
        let mut cfg = default_config();
        let click = cfg.outputs.iter_mut().find(|o| o.id.as_deref() == Some("left_click")).unwrap();
        click.lost_hand_policy = Some(PolicySpec::Name("zero".to_string()));
        assert!(matches!(cfg.validate(), Err(ConfigError::PolicyMismatch { .. })));
    }

    #[test]
    fn test_screen_value_resolution() {
        let screen = (1920.0, 1080.0);
        assert_eq!(ScreenValue::Number(42.0).resolve(screen), Some(42.0));
        assert_eq!(
            ScreenValue::Symbol("screen.width".to_string()).resolve(screen),
            Some(1920.0),
        );
        assert_eq!(
            ScreenValue::Symbol("-screen.height".to_string()).resolve(screen),
            Some(-1080.0),
        );
        assert_eq!(ScreenValue::Symbol("250".to_string()).resolve(screen), Some(250.0));
        assert_eq!(ScreenValue::Symbol("screen.depth".to_string()).resolve(screen), None);
    }

    #[test]
    fn test_policy_parse_variants() {
        assert_eq!(
            LostHandPolicy::parse(&PolicySpec::Bool(true)),
            Some(LostHandPolicy::True),
        );
        assert_eq!(LostHandPolicy::parse(&PolicySpec::Bool(false)), None);
        assert_eq!(
            LostHandPolicy::parse(&PolicySpec::Number(0.25)),
            Some(LostHandPolicy::Value(0.25)),
        );
        assert_eq!(
            LostHandPolicy::parse(&PolicySpec::Name("center".to_string())),
            Some(LostHandPolicy::Center),
        );
        assert_eq!(LostHandPolicy::parse(&PolicySpec::Name("sideways".to_string())), None);
    }

    #[test]
    fn test_kind_strings_roundtrip_verbatim() {
        let cfg = default_config();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        assert!(yaml.contains("kind: mouse.move.x"));
        assert!(yaml.contains("sensitivity: screen.width"));
        assert!(yaml.contains("sensitivity: -screen.height"));
        let restored: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored.outputs[0].kind, KindSpec::Simple("mouse.move.x".to_string()));
        assert_eq!(
            restored.outputs[1].sensitivity,
            Some(ScreenValue::Symbol("-screen.height".to_string())),
        );
    }

    #[test]
    fn test_pair_kind_roundtrip() {
        let yaml = r#"
version: 1
outputs:
  - id: hold_space
    kind:
      trigger: key.space.down
      release: key.space.up
    input: right_hand.gesture.closed
"#;
        let mut cfg: Config = serde_yaml::from_str(yaml).unwrap();
        ensure_defaults(&mut cfg);
        cfg.validate().expect("pair kind valid");
        assert!(matches!(cfg.outputs[0].kind, KindSpec::Pair { .. }));
        // Stateful defaults were applied to the pair form too.
        assert_eq!(cfg.outputs[0].trigger_pct, Some(0.80));
        let out = serde_yaml::to_string(&cfg).unwrap();
        assert!(out.contains("trigger: key.space.down"));
        assert!(out.contains("release: key.space.up"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = default_config();
        save(&path, &cfg).expect("save");
        assert!(path.exists());
        let loaded = load(&path).expect("load");
        assert_eq!(loaded.outputs.len(), cfg.outputs.len());
        assert_eq!(loaded.smoothing, cfg.smoothing);
        assert_eq!(loaded.calibration, cfg.calibration);
    }

    #[test]
    fn test_load_missing_creates_default() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        let cfg = load(&path).expect("load creates default");
        assert!(path.exists());
        assert!(!cfg.outputs.is_empty());
    }

    #[test]
    fn test_partial_smoothing_block_fills_defaults() {
        let yaml = r#"
version: 1
smoothing:
  position_ms: 200
outputs: []
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.smoothing.position_ms, 200.0);
        assert_eq!(cfg.smoothing.movement_ms, 120.0);
        assert_eq!(cfg.smoothing.curvature_ms, 80.0);
        assert_eq!(cfg.smoothing.gesture_ms, 80.0);
    }

    #[test]
    fn test_last_camera_preserved() {
        let yaml = r#"
version: 1
last_camera:
  backend: v4l2
  name: "HD Webcam"
  index: 2
outputs: []
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.last_camera.backend, "v4l2");
        assert_eq!(cfg.last_camera.index, 2);
        let out = serde_yaml::to_string(&cfg).unwrap();
        assert!(out.contains("backend: v4l2"));
    }

    #[test]
    fn test_unused_warns_not_required() {
        // Calibration entries for unreferenced features are preserved
        // and harmless.
        let mut cfg = default_config();
        cfg.calibration.insert(
            "left_hand.motion.up".to_string(),
            default_calibration_entry("left_hand.motion.up"),
        );
        cfg.validate().expect("extra calibration is fine");
    }
}
