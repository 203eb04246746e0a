//! Key-combination detection.
//!
//! The detector is a pure state machine fed with key presses and the current
//! time, so it can be driven from the evdev thread or from tests alike.

use std::time::{Duration, Instant};

use osd_types::error::{OsdError, Result};

use crate::event::OverlayTarget;

/// Longest accepted key sequence.
pub const MAX_SEQUENCE: usize = 5;
/// Capacity of the rolling detected set.
pub const MAX_DETECTED: usize = MAX_SEQUENCE * 2;

/// Parse `"0x13c,0x136,0x137"` or `"316,310,311"` into key codes.
///
/// A token containing an `x` is hex, anything else decimal. Sequences longer
/// than [`MAX_SEQUENCE`] are truncated with a warning.
pub fn parse_sequence(text: &str) -> Result<Vec<u16>> {
    let mut codes = Vec::new();
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let parsed = match token.find(['x', 'X']) {
            Some(pos) => u16::from_str_radix(&token[pos + 1..], 16),
            None => token.parse::<u16>(),
        };
        let code = parsed
            .map_err(|_| OsdError::InvalidFormat(format!("key code '{token}' in '{text}'")))?;
        codes.push(code);
    }
    if codes.len() > MAX_SEQUENCE {
        log::warn!(
            "key sequence '{text}' has {} codes, only the first {MAX_SEQUENCE} are used",
            codes.len()
        );
        codes.truncate(MAX_SEQUENCE);
    }
    Ok(codes)
}

/// A key event as read from the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub code: u16,
    /// 0 release, 1 press, 2 autorepeat.
    pub value: i32,
}

/// Detects when every key of a sequence is held within one time window.
#[derive(Debug, Clone)]
pub struct SequenceDetector {
    osd: Vec<u16>,
    tiny: Vec<u16>,
    interval: Duration,
    detected: Vec<u16>,
    window_start: Option<Instant>,
}

impl SequenceDetector {
    pub fn new(osd: Vec<u16>, tiny: Vec<u16>, interval: Duration) -> Self {
        Self {
            osd,
            tiny,
            interval,
            detected: Vec::with_capacity(MAX_DETECTED),
            window_start: None,
        }
    }

    /// Whether either sequence has at least one code.
    pub fn has_sequences(&self) -> bool {
        !self.osd.is_empty() || !self.tiny.is_empty()
    }

    pub fn detected(&self) -> &[u16] {
        &self.detected
    }

    /// Feed one batch of events read at `now`.
    ///
    /// The full OSD sequence is checked before the compact one. A completed
    /// sequence resets the window, so it fires once per window.
    pub fn process_batch(&mut self, events: &[KeyPress], now: Instant) -> Option<OverlayTarget> {
        if self.window_expired(now) {
            self.reset();
        }

        for ev in events {
            if ev.code == 0 || ev.value == 0 || !self.is_tracked(ev.code) {
                continue;
            }
            let start = *self.window_start.get_or_insert(now);
            if now.saturating_duration_since(start) > self.interval {
                continue;
            }
            if !self.detected.contains(&ev.code) && self.detected.len() < MAX_DETECTED {
                self.detected.push(ev.code);
            }
        }

        let hit = if complete(&self.osd, &self.detected) {
            Some(OverlayTarget::Full)
        } else if complete(&self.tiny, &self.detected) {
            Some(OverlayTarget::Tiny)
        } else {
            None
        };
        if hit.is_some() {
            self.reset();
        }
        hit
    }

    fn window_expired(&self, now: Instant) -> bool {
        self.window_start
            .is_some_and(|start| now.saturating_duration_since(start) > self.interval)
    }

    fn is_tracked(&self, code: u16) -> bool {
        self.osd.contains(&code) || self.tiny.contains(&code)
    }

    fn reset(&mut self) {
        self.detected.clear();
        self.window_start = None;
    }
}

fn complete(target: &[u16], detected: &[u16]) -> bool {
    !target.is_empty() && target.iter().all(|code| detected.contains(code))
}
