//! # system-capture-macos
//!
//! macOS ScreenCaptureKit backend for system-capture-core.
//!
//! Provides:
//! - `ScreenCaptureKitBackend`: `CaptureBackend` over `SCShareableContent` and `SCStream`
//! - `permissions`: Screen Recording (TCC) permission check
//!
//! ## Platform Requirements
//! - macOS 13+ for system audio capture through ScreenCaptureKit
//! - Screen Recording permission granted to the host application
//! - macOS 15+ and the `macos_15_0` feature for recording outputs; without
//!   the feature, attaching one fails with `RecordingOutputFailed`
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use system_capture_core::{Capturer, CapturerSettings};
//! use system_capture_macos::ScreenCaptureKitBackend;
//!
//! let capturer = Arc::new(Capturer::new(ScreenCaptureKitBackend::new(), CapturerSettings::default()));
//! capturer.start().await?;
//! ```

#[cfg(target_os = "macos")]
mod conversion;
#[cfg(target_os = "macos")]
pub mod permissions;
#[cfg(all(target_os = "macos", feature = "macos_15_0"))]
mod recording;
#[cfg(target_os = "macos")]
pub mod screencapturekit_backend;

#[cfg(target_os = "macos")]
pub use screencapturekit_backend::ScreenCaptureKitBackend;
