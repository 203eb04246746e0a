//! Error types for the OSD daemon.

use std::io;

/// Errors produced by the OSD crates.
///
/// Only [`OsdError::Display`] stops the daemon at startup. Every other variant
/// degrades a single feature: one trigger source, one overlay or one config
/// value.
#[derive(Debug, thiserror::Error)]
pub enum OsdError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("compositor rejected: {0}")]
    CompositorRejected(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OsdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let e = OsdError::Config("timeout out of range".into());
        assert_eq!(format!("{e}"), "config error: timeout out of range");
    }

    #[test]
    fn invalid_format_display() {
        let e = OsdError::InvalidFormat("color 'ff55'".into());
        assert_eq!(format!("{e}"), "invalid format: color 'ff55'");
    }

    #[test]
    fn device_unavailable_display() {
        let e = OsdError::DeviceUnavailable("/dev/input/event3".into());
        assert_eq!(format!("{e}"), "device unavailable: /dev/input/event3");
    }

    #[test]
    fn resource_exhausted_display() {
        let e = OsdError::ResourceExhausted("osd buffer".into());
        assert_eq!(format!("{e}"), "resource exhausted: osd buffer");
    }

    #[test]
    fn compositor_rejected_display() {
        let e = OsdError::CompositorRejected("element add".into());
        assert_eq!(format!("{e}"), "compositor rejected: element add");
    }

    #[test]
    fn display_error_display() {
        let e = OsdError::Display("fb0 geometry".into());
        assert_eq!(format!("{e}"), "display error: fb0 geometry");
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: OsdError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: OsdError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: OsdError = json_err.into();
        assert!(format!("{e}").contains("JSON error"));
    }

    #[test]
    fn error_is_debug() {
        let e = OsdError::Image("truncated".into());
        assert!(format!("{e:?}").contains("Image"));
    }
}
