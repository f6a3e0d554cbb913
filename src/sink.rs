//! OS input injection boundary.
//!
//! The engine talks to a four-primitive `ActionSink`; the real
//! implementation drives enigo.  Injection failures are logged and
//! never propagate — pressed state tracks intent, not OS reality.

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use tracing::{debug, info, warn};

// ── Button identity ────────────────────────────────────────

/// Target of a press/release edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ButtonId {
    MouseLeft,
    MouseRight,
    MouseMiddle,
    /// A named keyboard key, e.g. `space` or `a`.
    Key(String),
}

impl ButtonId {
    /// Parse a binding kind string such as `mouse.click.left` or
    /// `key.space`.
    pub fn parse(kind: &str) -> Option<ButtonId> {
        match kind {
            "mouse.click.left" => Some(ButtonId::MouseLeft),
            "mouse.click.right" => Some(ButtonId::MouseRight),
            "mouse.click.middle" => Some(ButtonId::MouseMiddle),
            _ => kind.strip_prefix("key.").map(|name| ButtonId::Key(name.to_string())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::MouseLeft => "mouse.left".to_string(),
            Self::MouseRight => "mouse.right".to_string(),
            Self::MouseMiddle => "mouse.middle".to_string(),
            Self::Key(name) => format!("key.{name}"),
        }
    }
}

// ── Sink trait ─────────────────────────────────────────────

/// The four output primitives the engine emits.
pub trait ActionSink {
    /// Integer pixel delta from the current cursor position.
    fn move_relative(&mut self, dx: i32, dy: i32);
    /// Absolute pixel position, clamped to screen bounds.
    fn set_position(&mut self, x: i32, y: i32);
    /// Platform-defined scroll units.
    fn scroll(&mut self, dx: i32, dy: i32);
    /// Press (`down = true`) or release a button or key.
    fn button(&mut self, id: &ButtonId, down: bool);
}

// ── Screen ─────────────────────────────────────────────────

/// Current display dimensions, falling back to 1920x1080 when the
/// platform query fails (e.g. headless runs).
pub fn screen_size() -> (f64, f64) {
    match rdev::display_size() {
        Ok((w, h)) => (w as f64, h as f64),
        Err(e) => {
            warn!("display size query failed ({e:?}), assuming 1920x1080");
            (1920.0, 1080.0)
        }
    }
}

// ── Enigo sink ─────────────────────────────────────────────

/// Real OS injection via enigo.
pub struct EnigoSink {
    enigo: Enigo,
    screen: (i32, i32),
}

impl EnigoSink {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("input injector init failed: {e:?}"))?;
        let (w, h) = screen_size();
        info!("input injector ready, screen {}x{}", w as i32, h as i32);
        Ok(Self { enigo, screen: (w as i32, h as i32) })
    }

    fn key_for(name: &str) -> enigo::Key {
        use enigo::Key;
        match name.to_ascii_lowercase().as_str() {
            "space" => Key::Space,
            "enter" | "return" => Key::Return,
            "escape" | "esc" => Key::Escape,
            "tab" => Key::Tab,
            "backspace" => Key::Backspace,
            "delete" => Key::Delete,
            "shift" => Key::Shift,
            "control" | "ctrl" => Key::Control,
            "alt" => Key::Alt,
            "meta" | "super" | "cmd" => Key::Meta,
            "up" => Key::UpArrow,
            "down" => Key::DownArrow,
            "left" => Key::LeftArrow,
            "right" => Key::RightArrow,
            "home" => Key::Home,
            "end" => Key::End,
            "page_up" | "pageup" => Key::PageUp,
            "page_down" | "pagedown" => Key::PageDown,
            "f1" => Key::F1,
            "f2" => Key::F2,
            "f3" => Key::F3,
            "f4" => Key::F4,
            "f5" => Key::F5,
            "f6" => Key::F6,
            "f7" => Key::F7,
            "f8" => Key::F8,
            "f9" => Key::F9,
            "f10" => Key::F10,
            "f11" => Key::F11,
            "f12" => Key::F12,
            other => Key::Unicode(other.chars().next().unwrap_or(' ')),
        }
    }
}

impl ActionSink for EnigoSink {
    fn move_relative(&mut self, dx: i32, dy: i32) {
        if let Err(e) = self.enigo.move_mouse(dx, dy, Coordinate::Rel) {
            warn!("relative move failed: {e:?}");
        }
    }

    fn set_position(&mut self, x: i32, y: i32) {
        let x = x.clamp(0, self.screen.0 - 1);
        let y = y.clamp(0, self.screen.1 - 1);
        if let Err(e) = self.enigo.move_mouse(x, y, Coordinate::Abs) {
            warn!("absolute move failed: {e:?}");
        }
    }

    fn scroll(&mut self, dx: i32, dy: i32) {
        if dx != 0 {
            if let Err(e) = self.enigo.scroll(dx, Axis::Horizontal) {
                warn!("horizontal scroll failed: {e:?}");
            }
        }
        if dy != 0 {
            if let Err(e) = self.enigo.scroll(dy, Axis::Vertical) {
                warn!("vertical scroll failed: {e:?}");
            }
        }
    }

    fn button(&mut self, id: &ButtonId, down: bool) {
        let direction = if down { Direction::Press } else { Direction::Release };
        let result = match id {
            ButtonId::MouseLeft => self.enigo.button(Button::Left, direction),
            ButtonId::MouseRight => self.enigo.button(Button::Right, direction),
            ButtonId::MouseMiddle => self.enigo.button(Button::Middle, direction),
            ButtonId::Key(name) => self.enigo.key(Self::key_for(name), direction),
        };
        if let Err(e) = result {
            warn!("{} {} failed: {e:?}", id.describe(), if down { "press" } else { "release" });
        }
    }
}

// ── Dry-run sink ───────────────────────────────────────────

/// Logs every emission instead of injecting it.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn move_relative(&mut self, dx: i32, dy: i32) {
        debug!("move_relative({dx}, {dy})");
    }

    fn set_position(&mut self, x: i32, y: i32) {
        debug!("set_position({x}, {y})");
    }

    fn scroll(&mut self, dx: i32, dy: i32) {
        debug!("scroll({dx}, {dy})");
    }

    fn button(&mut self, id: &ButtonId, down: bool) {
        info!("button {} {}", id.describe(), if down { "down" } else { "up" });
    }
}

// ── Recording double ───────────────────────────────────────

/// One recorded emission.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MoveRelative(i32, i32),
    SetPosition(i32, i32),
    Scroll(i32, i32),
    Button(ButtonId, bool),
}

/// Test double that records the emission log.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub actions: Vec<Action>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn buttons(&self) -> Vec<(ButtonId, bool)> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Button(id, down) => Some((id.clone(), *down)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}

#[cfg(test)]
impl ActionSink for RecordingSink {
    fn move_relative(&mut self, dx: i32, dy: i32) {
        self.actions.push(Action::MoveRelative(dx, dy));
    }

    fn set_position(&mut self, x: i32, y: i32) {
        self.actions.push(Action::SetPosition(x, y));
    }

    fn scroll(&mut self, dx: i32, dy: i32) {
        self.actions.push(Action::Scroll(dx, dy));
    }

    fn button(&mut self, id: &ButtonId, down: bool) {
        self.actions.push(Action::Button(id.clone(), down));
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_id_parse() {
        assert_eq!(ButtonId::parse("mouse.click.left"), Some(ButtonId::MouseLeft));
        assert_eq!(ButtonId::parse("mouse.click.middle"), Some(ButtonId::MouseMiddle));
        assert_eq!(ButtonId::parse("key.space"), Some(ButtonId::Key("space".to_string())));
        assert_eq!(ButtonId::parse("mouse.move.x"), None);
    }

    #[test]
    fn test_recording_sink_logs_in_order() {
        let mut sink = RecordingSink::default();
        sink.move_relative(3, 0);
        sink.button(&ButtonId::MouseLeft, true);
        sink.button(&ButtonId::MouseLeft, false);
        assert_eq!(sink.actions.len(), 3);
        assert_eq!(
            sink.buttons(),
            vec![(ButtonId::MouseLeft, true), (ButtonId::MouseLeft, false)],
        );
    }
}
