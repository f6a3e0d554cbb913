//! Output bindings: delta axes, absolute axes, and stateful edges.
//!
//! Each binding reads one smoothed feature and its gate, updates
//! binding-local state, and emits zero or more action primitives.
//! The three kinds are a tagged variant dispatched once per binding
//! per frame.

use tracing::debug;

use crate::engine::features::{FeatureId, FeatureSet};
use crate::engine::gate::{GateSet, ThresholdOp};
use crate::sink::{ActionSink, ButtonId};

// ── Targets ────────────────────────────────────────────────

/// Delta-emitting axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaAxis {
    MoveX,
    MoveY,
    ScrollX,
    ScrollY,
}

/// Absolute cursor axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAxis {
    X,
    Y,
}

/// One half-edge emission: which button, and whether it is the press
/// or the release direction.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAction {
    pub button: ButtonId,
    pub down: bool,
}

/// A parsed binding kind.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    Delta(DeltaAxis),
    Absolute(CursorAxis),
    Stateful { press: Option<EdgeAction>, release: Option<EdgeAction> },
}

impl OutputTarget {
    /// Parse a simple kind string.  Buttons and keys expand into a
    /// press/release pair.
    pub fn parse(kind: &str) -> Option<OutputTarget> {
        match kind {
            "mouse.move.x" => return Some(OutputTarget::Delta(DeltaAxis::MoveX)),
            "mouse.move.y" => return Some(OutputTarget::Delta(DeltaAxis::MoveY)),
            "mouse.scroll.x" => return Some(OutputTarget::Delta(DeltaAxis::ScrollX)),
            "mouse.scroll.y" => return Some(OutputTarget::Delta(DeltaAxis::ScrollY)),
            "mouse.pos.x" => return Some(OutputTarget::Absolute(CursorAxis::X)),
            "mouse.pos.y" => return Some(OutputTarget::Absolute(CursorAxis::Y)),
            _ => {}
        }
        let button = ButtonId::parse(kind)?;
        Some(OutputTarget::Stateful {
            press: Some(EdgeAction { button: button.clone(), down: true }),
            release: Some(EdgeAction { button, down: false }),
        })
    }

    /// Parse an explicit half-edge such as `mouse.click.left.down` or
    /// `key.space.up`.
    pub fn parse_edge(kind: &str) -> Option<EdgeAction> {
        let (base, down) = if let Some(base) = kind.strip_suffix(".down") {
            (base, true)
        } else if let Some(base) = kind.strip_suffix(".up") {
            (base, false)
        } else {
            return None;
        };
        Some(EdgeAction { button: ButtonId::parse(base)?, down })
    }
}

// ── Lost-hand policies ─────────────────────────────────────

/// Lost-hand behavior for value-shaped bindings (delta, absolute).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueLostPolicy {
    /// Clear the delta baseline; the next engage starts fresh.
    Zero,
    /// Keep existing state, emit nothing.
    Hold,
    /// Substitute the range minimum (0.0).
    Min,
    /// Substitute the range maximum (1.0).
    Max,
    /// Substitute the midpoint (0.5).
    Center,
    /// Substitute a fixed value.
    Value(f64),
}

/// Lost-hand behavior for stateful edge bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLostPolicy {
    /// Release immediately if pressed; ignore input while lost.
    Release,
    /// Keep current state, no transitions.
    Hold,
    /// Force pressed.
    ForceTrue,
    /// Flip state once on entry into the lost state.
    Toggle,
}

// ── Cursor accumulation ────────────────────────────────────

/// Per-tick absolute-axis commits; the engine merges them into one
/// cursor placement at the end of the tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct CursorPending {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl CursorPending {
    fn set(&mut self, axis: CursorAxis, value: f64) {
        match axis {
            CursorAxis::X => self.x = Some(value),
            CursorAxis::Y => self.y = Some(value),
        }
    }
}

// ── Binding ────────────────────────────────────────────────

/// Kind-specific parameters and mutable state.
#[derive(Debug)]
pub enum BindingBody {
    Delta {
        axis: DeltaAxis,
        sensitivity: f64,
        lost: ValueLostPolicy,
        v_prev: Option<f64>,
        residual: f64,
    },
    Absolute {
        axis: CursorAxis,
        min: f64,
        max: f64,
        lost: ValueLostPolicy,
    },
    Stateful {
        op: ThresholdOp,
        trigger_pct: f64,
        release_pct: f64,
        refractory_ms: u64,
        lost: EdgeLostPolicy,
        press: Option<EdgeAction>,
        release: Option<EdgeAction>,
        pressed: bool,
        t_last: Option<u64>,
        was_lost: bool,
    },
}

/// One configured output binding with its gate and state.
#[derive(Debug)]
pub struct Binding {
    id: String,
    input: FeatureId,
    gate: GateSet,
    body: BindingBody,
}

impl Binding {
    pub fn new(id: String, input: FeatureId, gate: GateSet, body: BindingBody) -> Self {
        Self { id, input, gate, body }
    }

    /// Evaluate one frame.
    pub fn update(
        &mut self,
        features: &FeatureSet,
        t_ms: u64,
        sink: &mut dyn ActionSink,
        cursor: &mut CursorPending,
    ) {
        let gate_on = self.gate.update(features, t_ms);
        let sample = features.get(self.input);
        match &mut self.body {
            BindingBody::Delta { axis, sensitivity, lost, v_prev, residual } => {
                let value = if sample.valid {
                    Some(sample.value)
                } else {
                    match lost {
                        ValueLostPolicy::Zero => {
                            *v_prev = None;
                            None
                        }
                        ValueLostPolicy::Hold => None,
                        ValueLostPolicy::Min => Some(0.0),
                        ValueLostPolicy::Max => Some(1.0),
                        ValueLostPolicy::Center => Some(0.5),
                        ValueLostPolicy::Value(x) => Some(*x),
                    }
                };
                let Some(v) = value else { return };
                // With the gate closed the baseline still tracks, so
                // re-engaging does not jump.
                let prev = match *v_prev {
                    Some(prev) => prev,
                    None => {
                        *v_prev = Some(v);
                        return;
                    }
                };
                *v_prev = Some(v);
                if !gate_on {
                    return;
                }
                let scaled = *sensitivity * (v - prev) + *residual;
                let whole = scaled.trunc();
                *residual = scaled - whole;
                if whole == 0.0 {
                    return;
                }
                let d = whole as i32;
                match axis {
                    DeltaAxis::MoveX => sink.move_relative(d, 0),
                    DeltaAxis::MoveY => sink.move_relative(0, d),
                    DeltaAxis::ScrollX => sink.scroll(d, 0),
                    DeltaAxis::ScrollY => sink.scroll(0, d),
                }
            }
            BindingBody::Absolute { axis, min, max, lost } => {
                let value = if sample.valid {
                    Some(sample.value)
                } else {
                    match lost {
                        ValueLostPolicy::Hold | ValueLostPolicy::Zero => None,
                        ValueLostPolicy::Min => Some(0.0),
                        ValueLostPolicy::Max => Some(1.0),
                        ValueLostPolicy::Center => Some(0.5),
                        ValueLostPolicy::Value(x) => Some(*x),
                    }
                };
                if !gate_on {
                    return;
                }
                let Some(v) = value else { return };
                cursor.set(*axis, *min + v.clamp(0.0, 1.0) * (*max - *min));
            }
            BindingBody::Stateful {
                op,
                trigger_pct,
                release_pct,
                refractory_ms,
                lost,
                press,
                release,
                pressed,
                t_last,
                was_lost,
            } => {
                if !gate_on {
                    // The clutch dropping must never leave a button
                    // down; refractory is bypassed.
                    if *pressed {
                        debug!("binding {} released by gate", self.id);
                        emit(sink, release);
                        *pressed = false;
                        *t_last = Some(t_ms);
                    }
                    *was_lost = !sample.valid;
                    return;
                }
                if !sample.valid {
                    match lost {
                        EdgeLostPolicy::Release => {
                            if *pressed {
                                emit(sink, release);
                                *pressed = false;
                                *t_last = Some(t_ms);
                            }
                        }
                        EdgeLostPolicy::Hold => {}
                        EdgeLostPolicy::ForceTrue => {
                            if !*pressed {
                                emit(sink, press);
                                *pressed = true;
                                *t_last = Some(t_ms);
                            }
                        }
                        EdgeLostPolicy::Toggle => {
                            if !*was_lost {
                                if *pressed {
                                    emit(sink, release);
                                } else {
                                    emit(sink, press);
                                }
                                *pressed = !*pressed;
                                *t_last = Some(t_ms);
                            }
                        }
                    }
                    *was_lost = true;
                    return;
                }
                *was_lost = false;

                let v = sample.value;
                let refractory_over = match *t_last {
                    Some(last) => t_ms.saturating_sub(last) >= *refractory_ms,
                    None => true,
                };
                if !*pressed {
                    if op.triggers(v, *trigger_pct) && refractory_over {
                        emit(sink, press);
                        *pressed = true;
                        *t_last = Some(t_ms);
                    }
                } else if op.releases(v, *release_pct) && refractory_over {
                    emit(sink, release);
                    *pressed = false;
                    *t_last = Some(t_ms);
                }
            }
        }
    }

    /// Emit a release if this binding currently holds a button down.
    /// Used on shutdown and fatal-error paths.
    pub fn release_pressed(&mut self, sink: &mut dyn ActionSink) {
        if let BindingBody::Stateful { release, pressed, .. } = &mut self.body {
            if *pressed {
                debug!("binding {} released on shutdown", self.id);
                emit(sink, release);
                *pressed = false;
            }
        }
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self.body, BindingBody::Stateful { pressed: true, .. })
    }
}

fn emit(sink: &mut dyn ActionSink, edge: &Option<EdgeAction>) {
    if let Some(action) = edge {
        sink.button(&action.button, action.down);
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
pub mod harness {
    use super::*;
    use crate::engine::features::FeatureSample;
    use crate::engine::gate::{Gate, GateLostPolicy, GateParams};
    use crate::hand::Hand;

    pub fn input() -> FeatureId {
        FeatureId::hands_distance()
    }

    pub fn gate_input() -> FeatureId {
        FeatureId::for_hand(crate::engine::features::FeatureKind::GestureClosed, Hand::Right)
    }

    /// FeatureSet with the binding input and gate input set (None =
    /// invalid).
    pub fn feats(input: Option<f64>, gate: Option<f64>) -> FeatureSet {
        let mut set = FeatureSet::invalid();
        if let Some(v) = input {
            set.set(self::input(), FeatureSample::valid(v));
        }
        if let Some(v) = gate {
            set.set(gate_input(), FeatureSample::valid(v));
        }
        set
    }

    /// Clutch gate: open while the gate feature stays below trigger.
    pub fn clutch(trigger: f64, release: f64) -> GateSet {
        GateSet::new(vec![Gate::new(GateParams {
            input: gate_input(),
            op: ThresholdOp::Below,
            trigger_pct: trigger,
            release_pct: release,
            refractory_ms: 0,
            lost_policy: GateLostPolicy::Release,
        })])
    }

    pub fn click_body(lost: EdgeLostPolicy, refractory_ms: u64) -> BindingBody {
        BindingBody::Stateful {
            op: ThresholdOp::Above,
            trigger_pct: 0.8,
            release_pct: 0.6,
            refractory_ms,
            lost,
            press: Some(EdgeAction { button: ButtonId::MouseLeft, down: true }),
            release: Some(EdgeAction { button: ButtonId::MouseLeft, down: false }),
            pressed: false,
            t_last: None,
            was_lost: false,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::harness::*;
    use super::*;
    use crate::sink::{Action, RecordingSink};

    #[test]
    fn test_clutch_release_drops_click() {
        // Press at t=50, then the closing hand drops the gate at t=100
        // and the release bypasses the 250ms refractory.
        let mut binding = Binding::new(
            "left_click".into(),
            input(),
            clutch(0.5, 0.6),
            click_body(EdgeLostPolicy::Release, 250),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        binding.update(&feats(Some(0.0), Some(0.2)), 0, &mut sink, &mut cursor);
        assert!(sink.actions.is_empty());
        binding.update(&feats(Some(0.9), Some(0.2)), 50, &mut sink, &mut cursor);
        assert_eq!(sink.buttons(), vec![(ButtonId::MouseLeft, true)]);
        binding.update(&feats(Some(0.9), Some(0.9)), 100, &mut sink, &mut cursor);
        assert_eq!(
            sink.buttons(),
            vec![(ButtonId::MouseLeft, true), (ButtonId::MouseLeft, false)],
        );
        assert!(!binding.is_pressed());
    }

    #[test]
    fn test_hysteresis_oscillation_in_band() {
        // 0.5, 0.85, 0.75, 0.65, 0.55, 0.7: press at the second sample,
        // release at the fifth, nothing else.
        let mut binding = Binding::new(
            "click".into(),
            input(),
            GateSet::default(),
            click_body(EdgeLostPolicy::Release, 0),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();
        let inputs = [0.5, 0.85, 0.75, 0.65, 0.55, 0.7];
        let mut edges = Vec::new();
        for (i, v) in inputs.iter().enumerate() {
            let before = sink.buttons().len();
            binding.update(&feats(Some(*v), None), i as u64 * 16, &mut sink, &mut cursor);
            if sink.buttons().len() > before {
                edges.push(i);
            }
        }
        assert_eq!(edges, vec![1, 4]);
        assert_eq!(
            sink.buttons(),
            vec![(ButtonId::MouseLeft, true), (ButtonId::MouseLeft, false)],
        );
    }

    #[test]
    fn test_refractory_suppresses_retrigger() {
        let mut binding = Binding::new(
            "click".into(),
            input(),
            GateSet::default(),
            click_body(EdgeLostPolicy::Release, 250),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        binding.update(&feats(Some(0.9), None), 0, &mut sink, &mut cursor);
        // Release condition within the window: suppressed.
        binding.update(&feats(Some(0.1), None), 100, &mut sink, &mut cursor);
        assert_eq!(sink.buttons().len(), 1);
        // After the window it goes through.
        binding.update(&feats(Some(0.1), None), 260, &mut sink, &mut cursor);
        assert_eq!(sink.buttons().len(), 2);
    }

    #[test]
    fn test_hand_lost_mid_press_releases_once() {
        let mut binding = Binding::new(
            "click".into(),
            input(),
            GateSet::default(),
            click_body(EdgeLostPolicy::Release, 250),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        binding.update(&feats(Some(0.9), None), 0, &mut sink, &mut cursor);
        assert!(binding.is_pressed());
        binding.update(&feats(None, None), 16, &mut sink, &mut cursor);
        assert_eq!(
            sink.buttons(),
            vec![(ButtonId::MouseLeft, true), (ButtonId::MouseLeft, false)],
        );
        // Further lost frames emit nothing.
        binding.update(&feats(None, None), 32, &mut sink, &mut cursor);
        binding.update(&feats(None, None), 48, &mut sink, &mut cursor);
        assert_eq!(sink.buttons().len(), 2);
    }

    #[test]
    fn test_lost_toggle_flips_once_per_loss() {
        let mut binding = Binding::new(
            "click".into(),
            input(),
            GateSet::default(),
            click_body(EdgeLostPolicy::Toggle, 0),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        binding.update(&feats(None, None), 0, &mut sink, &mut cursor);
        assert!(binding.is_pressed());
        binding.update(&feats(None, None), 16, &mut sink, &mut cursor);
        assert!(binding.is_pressed());
        assert_eq!(sink.buttons().len(), 1);
    }

    #[test]
    fn test_lost_force_true_presses() {
        let mut binding = Binding::new(
            "click".into(),
            input(),
            GateSet::default(),
            click_body(EdgeLostPolicy::ForceTrue, 0),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();
        binding.update(&feats(None, None), 0, &mut sink, &mut cursor);
        assert_eq!(sink.buttons(), vec![(ButtonId::MouseLeft, true)]);
        // Already pressed: no repeat.
        binding.update(&feats(None, None), 16, &mut sink, &mut cursor);
        assert_eq!(sink.buttons().len(), 1);
    }

    #[test]
    fn test_explicit_edge_pair_emits_halves() {
        let press = OutputTarget::parse_edge("key.space.down").unwrap();
        let release = OutputTarget::parse_edge("key.space.up").unwrap();
        assert!(press.down);
        assert!(!release.down);
        let mut binding = Binding::new(
            "space".into(),
            input(),
            GateSet::default(),
            BindingBody::Stateful {
                op: ThresholdOp::Above,
                trigger_pct: 0.8,
                release_pct: 0.6,
                refractory_ms: 0,
                lost: EdgeLostPolicy::Release,
                press: Some(press),
                release: Some(release),
                pressed: false,
                t_last: None,
                was_lost: false,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();
        binding.update(&feats(Some(0.9), None), 0, &mut sink, &mut cursor);
        binding.update(&feats(Some(0.1), None), 16, &mut sink, &mut cursor);
        assert_eq!(
            sink.buttons(),
            vec![
                (ButtonId::Key("space".into()), true),
                (ButtonId::Key("space".into()), false),
            ],
        );
    }

    #[test]
    fn test_delta_accumulates_fractions() {
        let mut binding = Binding::new(
            "move_x".into(),
            input(),
            GateSet::default(),
            BindingBody::Delta {
                axis: DeltaAxis::MoveX,
                sensitivity: 1000.0,
                lost: ValueLostPolicy::Zero,
                v_prev: None,
                residual: 0.0,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        let values = [0.100, 0.1004, 0.1008, 0.1012];
        for (i, v) in values.iter().enumerate() {
            binding.update(&feats(Some(*v), None), i as u64 * 16, &mut sink, &mut cursor);
        }
        // Total emitted pixels equal the full-range delta minus at most
        // one unit of residual.
        let total: i32 = sink
            .actions
            .iter()
            .map(|a| match a {
                Action::MoveRelative(dx, _) => *dx,
                _ => 0,
            })
            .sum();
        let exact = 1000.0 * (0.1012 - 0.100);
        assert_eq!(total, 1, "total {total}, exact {exact}");
        assert!((exact - total as f64).abs() < 1.0);
    }

    #[test]
    fn test_delta_gate_false_tracks_baseline() {
        let mut binding = Binding::new(
            "move_x".into(),
            input(),
            clutch(0.5, 0.6),
            BindingBody::Delta {
                axis: DeltaAxis::MoveX,
                sensitivity: 100.0,
                lost: ValueLostPolicy::Zero,
                v_prev: None,
                residual: 0.0,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        // Gate open, establish baseline at 0.2.
        binding.update(&feats(Some(0.2), Some(0.2)), 0, &mut sink, &mut cursor);
        // Gate closed while the hand sweeps to 0.8: nothing emitted.
        binding.update(&feats(Some(0.5), Some(0.9)), 16, &mut sink, &mut cursor);
        binding.update(&feats(Some(0.8), Some(0.9)), 32, &mut sink, &mut cursor);
        assert!(sink.actions.is_empty());
        // Re-engage: only the small step from 0.8 emits, not the sweep.
        binding.update(&feats(Some(0.82), Some(0.2)), 48, &mut sink, &mut cursor);
        assert_eq!(sink.actions, vec![Action::MoveRelative(2, 0)]);
    }

    #[test]
    fn test_delta_lost_zero_resets_baseline() {
        let mut binding = Binding::new(
            "move_x".into(),
            input(),
            GateSet::default(),
            BindingBody::Delta {
                axis: DeltaAxis::MoveX,
                sensitivity: 100.0,
                lost: ValueLostPolicy::Zero,
                v_prev: None,
                residual: 0.0,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        binding.update(&feats(Some(0.2), None), 0, &mut sink, &mut cursor);
        binding.update(&feats(None, None), 16, &mut sink, &mut cursor);
        // The hand reappears far away: fresh baseline, no jump.
        binding.update(&feats(Some(0.5), None), 32, &mut sink, &mut cursor);
        assert!(sink.actions.is_empty());
        binding.update(&feats(Some(0.75), None), 48, &mut sink, &mut cursor);
        assert_eq!(sink.actions, vec![Action::MoveRelative(25, 0)]);
    }

    #[test]
    fn test_scroll_axis_emits_scroll() {
        let mut binding = Binding::new(
            "scroll_y".into(),
            input(),
            GateSet::default(),
            BindingBody::Delta {
                axis: DeltaAxis::ScrollY,
                sensitivity: 10.0,
                lost: ValueLostPolicy::Zero,
                v_prev: None,
                residual: 0.0,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();
        binding.update(&feats(Some(0.0), None), 0, &mut sink, &mut cursor);
        binding.update(&feats(Some(0.5), None), 16, &mut sink, &mut cursor);
        assert_eq!(sink.actions, vec![Action::Scroll(0, 5)]);
    }

    #[test]
    fn test_absolute_scales_and_clamps() {
        let mut binding = Binding::new(
            "pos_x".into(),
            input(),
            GateSet::default(),
            BindingBody::Absolute {
                axis: CursorAxis::X,
                min: 0.0,
                max: 1920.0,
                lost: ValueLostPolicy::Hold,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();

        binding.update(&feats(Some(0.5), None), 0, &mut sink, &mut cursor);
        assert_eq!(cursor.x, Some(960.0));
        // Values arrive pre-clamped from the extractor, but substituted
        // lost values clamp here too.
        let mut cursor2 = CursorPending::default();
        binding.update(&feats(Some(1.0), None), 16, &mut sink, &mut cursor2);
        assert_eq!(cursor2.x, Some(1920.0));
    }

    #[test]
    fn test_absolute_hold_on_lost_commits_nothing() {
        let mut binding = Binding::new(
            "pos_x".into(),
            input(),
            GateSet::default(),
            BindingBody::Absolute {
                axis: CursorAxis::X,
                min: 0.0,
                max: 1920.0,
                lost: ValueLostPolicy::Hold,
            },
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();
        binding.update(&feats(None, None), 0, &mut sink, &mut cursor);
        assert_eq!(cursor.x, None);
    }

    #[test]
    fn test_release_pressed_on_shutdown() {
        let mut binding = Binding::new(
            "click".into(),
            input(),
            GateSet::default(),
            click_body(EdgeLostPolicy::Hold, 0),
        );
        let mut sink = RecordingSink::default();
        let mut cursor = CursorPending::default();
        binding.update(&feats(Some(0.9), None), 0, &mut sink, &mut cursor);
        assert!(binding.is_pressed());
        binding.release_pressed(&mut sink);
        assert!(!binding.is_pressed());
        assert_eq!(
            sink.buttons(),
            vec![(ButtonId::MouseLeft, true), (ButtonId::MouseLeft, false)],
        );
        // Idempotent.
        binding.release_pressed(&mut sink);
        assert_eq!(sink.buttons().len(), 2);
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(OutputTarget::parse("mouse.move.x"), Some(OutputTarget::Delta(DeltaAxis::MoveX)));
        assert_eq!(OutputTarget::parse("mouse.pos.y"), Some(OutputTarget::Absolute(CursorAxis::Y)));
        match OutputTarget::parse("mouse.click.right") {
            Some(OutputTarget::Stateful { press: Some(p), release: Some(r) }) => {
                assert_eq!(p.button, ButtonId::MouseRight);
                assert!(p.down);
                assert!(!r.down);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert_eq!(OutputTarget::parse("mouse.warp"), None);
        assert_eq!(OutputTarget::parse_edge("mouse.click.left.sideways"), None);
    }
}
