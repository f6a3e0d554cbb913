//! The runtime evaluation engine.
//!
//! Each tick runs the fixed pipeline over one landmark frame:
//! features are computed, smoothed, gates evaluated, and output
//! bindings driven, in config order.  All timing derives from frame
//! timestamps, so the engine is a pure function of
//! `(state, frame, t)` and is exercised end-to-end in tests against a
//! recording sink.

pub mod binding;
pub mod calibration;
pub mod features;
pub mod gate;
pub mod smoothing;

use tracing::{debug, info};

use crate::config::{parse_policy, parse_target, Config, ConfigError, OutputConfig, ScreenValue};
use crate::hand::{Hand, LandmarkFrame};
use crate::sink::ActionSink;

use binding::{Binding, BindingBody, CursorAxis, CursorPending, OutputTarget};
use calibration::{Calibration, CalibrationSession, CalibrationStep};
use features::{FeatureExtractor, FeatureId};
use gate::{Gate, GateParams, GateSet, ThresholdOp};
use smoothing::SmootherBank;

// ── Engine ─────────────────────────────────────────────────

/// Evaluation engine: extractor, smoother bank, and bindings resolved
/// from a validated config.
pub struct Engine {
    extractor: FeatureExtractor,
    smoother: SmootherBank,
    bindings: Vec<Binding>,
    calibration: Calibration,
    session: Option<CalibrationSession>,
    cursor_x: Option<f64>,
    cursor_y: Option<f64>,
}

impl Engine {
    /// Resolve feature names, kinds, sensitivities, and policies into
    /// direct handles.  Any configuration problem refuses to start the
    /// engine.
    pub fn new(cfg: &Config, screen: (f64, f64)) -> Result<Engine, ConfigError> {
        let calibration = Calibration::from_entries(&cfg.calibration);
        let extractor = FeatureExtractor::new(&calibration);
        let smoother = SmootherBank::new(&cfg.smoothing);
        let mut bindings = Vec::with_capacity(cfg.outputs.len());
        for output in &cfg.outputs {
            bindings.push(build_binding(output, screen)?);
        }
        info!("engine ready: {} bindings", bindings.len());
        Ok(Engine {
            extractor,
            smoother,
            bindings,
            calibration,
            session: None,
            cursor_x: None,
            cursor_y: None,
        })
    }

    /// Evaluate one frame and emit actions to the sink.
    pub fn tick(&mut self, frame: &LandmarkFrame, sink: &mut dyn ActionSink) {
        if let Some(session) = &mut self.session {
            if let Some(obs) = frame.hand(session.hand()) {
                session.record(obs);
            }
        }

        let mut features = self.extractor.extract(frame);
        self.smoother.apply(&mut features, frame.t_ms);

        let mut pending = CursorPending::default();
        for binding in &mut self.bindings {
            binding.update(&features, frame.t_ms, sink, &mut pending);
        }

        // Merge absolute-axis commits into one cursor placement; the
        // placement waits until both axes have been seen at least once.
        let dirty = pending.x.is_some() || pending.y.is_some();
        if let Some(x) = pending.x {
            self.cursor_x = Some(x);
        }
        if let Some(y) = pending.y {
            self.cursor_y = Some(y);
        }
        if dirty {
            if let (Some(x), Some(y)) = (self.cursor_x, self.cursor_y) {
                sink.set_position(x.round() as i32, y.round() as i32);
            }
        }
    }

    /// Release every pressed stateful binding.  Called on quit and on
    /// fatal errors so no button is left down.
    pub fn release_all(&mut self, sink: &mut dyn ActionSink) {
        let pressed = self.bindings.iter().filter(|b| b.is_pressed()).count();
        if pressed > 0 {
            info!("releasing {pressed} pressed binding(s)");
        }
        for binding in &mut self.bindings {
            binding.release_pressed(sink);
        }
    }

    // ── Calibration control ───────────────────────────────

    pub fn calibrate_begin(&mut self, hand: Hand) {
        self.session = Some(CalibrationSession::new(hand));
    }

    /// Commit the active step and move on.  Returns the next step, or
    /// None when the session finished (or none was active).  Updated
    /// parameters take effect immediately.
    pub fn calibrate_advance(&mut self) -> Option<CalibrationStep> {
        let session = self.session.as_mut()?;
        let next = session.advance(&mut self.calibration);
        self.extractor = FeatureExtractor::new(&self.calibration);
        if next.is_none() {
            self.session = None;
        }
        next
    }

    /// Discard the pending step, keeping parameters from completed
    /// steps.
    pub fn calibrate_cancel(&mut self) {
        if self.session.take().is_some() {
            info!("calibration cancelled");
        }
    }

    pub fn calibrating(&self) -> bool {
        self.session.is_some()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}

// ── Construction ───────────────────────────────────────────

fn build_binding(output: &OutputConfig, screen: (f64, f64)) -> Result<Binding, ConfigError> {
    let id = output.display_id();

    let input = FeatureId::parse(&output.input).ok_or_else(|| ConfigError::UnknownFeature {
        output: id.clone(),
        feature: output.input.clone(),
    })?;

    let mut gates = Vec::new();
    for g in output.gates() {
        let gate_input =
            FeatureId::parse(&g.input).ok_or_else(|| ConfigError::UnknownFeature {
                output: id.clone(),
                feature: g.input.clone(),
            })?;
        let op_str = g.op.as_deref().unwrap_or(">");
        let op = ThresholdOp::parse(op_str)
            .ok_or_else(|| ConfigError::InvalidOp(op_str.to_string()))?;
        let lost_policy = parse_policy(g.lost_hand_policy.as_ref(), &id)?
            .gate_policy()
            .ok_or_else(|| ConfigError::PolicyMismatch {
                output: id.clone(),
                policy: format!("{:?}", g.lost_hand_policy),
            })?;
        gates.push(Gate::new(GateParams {
            input: gate_input,
            op,
            trigger_pct: g.trigger_pct.unwrap_or(0.5),
            release_pct: g.release_pct.unwrap_or(0.45),
            refractory_ms: g.refractory_ms.unwrap_or(120),
            lost_policy,
        }));
    }
    let gate = GateSet::new(gates);

    let policy = parse_policy(output.lost_hand_policy.as_ref(), &id)?;
    let body = match parse_target(output)? {
        OutputTarget::Delta(axis) => {
            let value = output.sensitivity.clone().unwrap_or(ScreenValue::Number(1.0));
            let sensitivity =
                value.resolve(screen).ok_or_else(|| ConfigError::InvalidScreenValue {
                    output: id.clone(),
                    value: format!("{value:?}"),
                })?;
            let lost = policy.value_policy(true).ok_or_else(|| ConfigError::PolicyMismatch {
                output: id.clone(),
                policy: format!("{policy:?}"),
            })?;
            debug!("binding {id}: delta, sensitivity {sensitivity}");
            BindingBody::Delta { axis, sensitivity, lost, v_prev: None, residual: 0.0 }
        }
        OutputTarget::Absolute(axis) => {
            let min = resolve_bound(&output.min, 0.0, screen, &id)?;
            let default_max = match axis {
                CursorAxis::X => screen.0,
                CursorAxis::Y => screen.1,
            };
            let max = resolve_bound(&output.max, default_max, screen, &id)?;
            let lost = policy.value_policy(false).ok_or_else(|| ConfigError::PolicyMismatch {
                output: id.clone(),
                policy: format!("{policy:?}"),
            })?;
            debug!("binding {id}: absolute, range [{min}, {max}]");
            BindingBody::Absolute { axis, min, max, lost }
        }
        OutputTarget::Stateful { press, release } => {
            let op_str = output.op.as_deref().unwrap_or(">");
            let op = ThresholdOp::parse(op_str)
                .ok_or_else(|| ConfigError::InvalidOp(op_str.to_string()))?;
            let lost = policy.edge_policy().ok_or_else(|| ConfigError::PolicyMismatch {
                output: id.clone(),
                policy: format!("{policy:?}"),
            })?;
            BindingBody::Stateful {
                op,
                trigger_pct: output.trigger_pct.unwrap_or(0.80),
                release_pct: output.release_pct.unwrap_or(0.60),
                refractory_ms: output.refractory_ms.unwrap_or(250),
                lost,
                press,
                release,
                pressed: false,
                t_last: None,
                was_lost: false,
            }
        }
    };

    Ok(Binding::new(id, input, gate, body))
}

fn resolve_bound(
    value: &Option<ScreenValue>,
    default: f64,
    screen: (f64, f64),
    id: &str,
) -> Result<f64, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.resolve(screen).ok_or_else(|| ConfigError::InvalidScreenValue {
            output: id.to_string(),
            value: format!("{v:?}"),
        }),
    }
}

// ── Tests ──────────────────────────────────────────────────
