//! Foundation types for the handheld OSD daemon.
//!
//! This crate contains the platform-agnostic types shared by every OSD crate:
//! the packed RGBA color model, the error taxonomy, and the process-wide
//! configuration built once at startup.

pub mod color;
pub mod config;
pub mod error;
