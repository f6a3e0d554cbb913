//! Landmark stream boundary.
//!
//! The detector process (or a recording) feeds line-oriented JSON:
//! frame records carrying a timestamp and hand observations, plus
//! control records for calibration and shutdown.  Malformed lines are
//! logged and skipped; the engine never sees them.

use serde::Deserialize;
use tracing::warn;

use crate::hand::{Hand, HandObservation, Landmark, LandmarkFrame, LANDMARK_COUNT};

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

// ── Wire format ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Record {
    Control(ControlRecord),
    Frame(FrameRecord),
}

#[derive(Debug, Deserialize)]
struct ControlRecord {
    control: String,
    #[serde(default)]
    hand: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    /// Monotonic milliseconds.
    t: u64,
    #[serde(default)]
    hands: Vec<HandRecord>,
}

#[derive(Debug, Deserialize)]
struct HandRecord {
    handedness: String,
    landmarks: Vec<[f64; 3]>,
}

// ── Events ─────────────────────────────────────────────────

/// One decoded input event for the run loop.
#[derive(Debug)]
pub enum SourceEvent {
    Frame(LandmarkFrame),
    CalibrateBegin(Hand),
    CalibrateAdvance,
    CalibrateCancel,
    Quit,
}

// ── Reader ─────────────────────────────────────────────────

/// Line reader over stdin or a file.
pub struct JsonlSource {
    reader: Box<dyn BufRead>,
    line: String,
}

impl JsonlSource {
    pub fn stdin() -> Self {
        Self { reader: Box::new(BufReader::new(io::stdin())), line: String::new() }
    }

    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self { reader: Box::new(BufReader::new(file)), line: String::new() })
    }

    /// Next decoded event, skipping malformed lines.  None means the
    /// stream ended.
    pub fn next_event(&mut self) -> io::Result<Option<SourceEvent>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(line) {
                Ok(Record::Frame(frame)) => return Ok(Some(SourceEvent::Frame(decode_frame(frame)))),
                Ok(Record::Control(control)) => match decode_control(&control) {
                    Some(event) => return Ok(Some(event)),
                    None => warn!("ignoring unknown control record: {control:?}"),
                },
                Err(e) => warn!("skipping malformed record: {e}"),
            }
        }
    }
}

fn decode_control(control: &ControlRecord) -> Option<SourceEvent> {
    match control.control.as_str() {
        "calibrate_begin" => {
            let hand = control.hand.as_deref().and_then(Hand::parse).unwrap_or(Hand::Right);
            Some(SourceEvent::CalibrateBegin(hand))
        }
        "calibrate_advance" => Some(SourceEvent::CalibrateAdvance),
        "calibrate_cancel" => Some(SourceEvent::CalibrateCancel),
        "quit" => Some(SourceEvent::Quit),
        _ => None,
    }
}

fn decode_frame(record: FrameRecord) -> LandmarkFrame {
    let mut observations = Vec::with_capacity(record.hands.len());
    for hand in record.hands {
        let Some(handedness) = Hand::parse(&hand.handedness) else {
            warn!("dropping hand with unknown handedness `{}`", hand.handedness);
            continue;
        };
        if hand.landmarks.len() != LANDMARK_COUNT {
            warn!(
                "dropping {} hand: expected {} landmarks, got {}",
                handedness.as_str(),
                LANDMARK_COUNT,
                hand.landmarks.len(),
            );
            continue;
        }
        let mut landmarks = [Landmark::default(); LANDMARK_COUNT];
        for (i, [x, y, z]) in hand.landmarks.into_iter().enumerate() {
            landmarks[i] = Landmark::new(x, y, z);
        }
        observations.push(HandObservation { handedness, landmarks });
    }
    LandmarkFrame::new(record.t, observations)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source_from(text: &str) -> JsonlSource {
        JsonlSource {
            reader: Box::new(Cursor::new(text.to_string())),
            line: String::new(),
        }
    }

    fn landmarks_json() -> String {
        let point = "[0.5,0.5,0.0]";
        let all: Vec<&str> = (0..LANDMARK_COUNT).map(|_| point).collect();
        format!("[{}]", all.join(","))
    }

    #[test]
    fn test_frame_record_decodes() {
        let text = format!(
            "{{\"t\": 42, \"hands\": [{{\"handedness\": \"Right\", \"landmarks\": {}}}]}}\n",
            landmarks_json(),
        );
        let mut source = source_from(&text);
        match source.next_event().unwrap() {
            Some(SourceEvent::Frame(frame)) => {
                assert_eq!(frame.t_ms, 42);
                assert!(frame.hand(Hand::Right).is_some());
                assert!(frame.hand(Hand::Left).is_none());
            }
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(source.next_event().unwrap().is_none());
    }

    #[test]
    fn test_empty_hands_frame() {
        let mut source = source_from("{\"t\": 7}\n");
        match source.next_event().unwrap() {
            Some(SourceEvent::Frame(frame)) => {
                assert!(frame.hand(Hand::Left).is_none());
                assert!(frame.hand(Hand::Right).is_none());
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_landmark_count_drops_hand() {
        let text = "{\"t\": 1, \"hands\": [{\"handedness\": \"Left\", \"landmarks\": [[0,0,0]]}]}\n";
        let mut source = source_from(text);
        match source.next_event().unwrap() {
            Some(SourceEvent::Frame(frame)) => {
                assert!(frame.hand(Hand::Left).is_none());
                assert!(frame.hand(Hand::Right).is_none());
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_control_records() {
        let text = "\
{\"control\": \"calibrate_begin\", \"hand\": \"left\"}
{\"control\": \"calibrate_advance\"}
{\"control\": \"calibrate_cancel\"}
{\"control\": \"quit\"}
";
        let mut source = source_from(text);
        assert!(matches!(
            source.next_event().unwrap(),
            Some(SourceEvent::CalibrateBegin(Hand::Left)),
        ));
        assert!(matches!(source.next_event().unwrap(), Some(SourceEvent::CalibrateAdvance)));
        assert!(matches!(source.next_event().unwrap(), Some(SourceEvent::CalibrateCancel)));
        assert!(matches!(source.next_event().unwrap(), Some(SourceEvent::Quit)));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let text = format!(
            "not json\n\n{{\"control\": \"warp\"}}\n{{\"t\": 5, \"hands\": []}}\n",
        );
        let mut source = source_from(&text);
        match source.next_event().unwrap() {
            Some(SourceEvent::Frame(frame)) => assert_eq!(frame.t_ms, 5),
            other => panic!("expected frame, got {other:?}"),
        }
    }
}
