use std::fmt;
use std::time::Instant;

/// Which OSD a trigger asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayTarget {
    /// Multi-line system overview.
    Full,
    /// One-line header bar.
    Tiny,
}

impl fmt::Display for OverlayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("osd"),
            Self::Tiny => f.write_str("tiny osd"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    KeySequence,
    Gpio,
    Signal,
    SignalFile,
    /// Test mode, re-issued every tick.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub source: TriggerSource,
    pub target: OverlayTarget,
    pub at: Instant,
}

impl TriggerEvent {
    pub fn new(source: TriggerSource, target: OverlayTarget, at: Instant) -> Self {
        Self { source, target, at }
    }
}
