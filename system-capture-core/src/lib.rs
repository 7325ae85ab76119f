//! # system-capture-core
//!
//! Platform-agnostic capture session core.
//!
//! Negotiates a capture configuration with the OS screen/media capture
//! subsystem, turns its push-based sample callbacks into an async channel,
//! and tears the stream down on request or on failure. Platform backends
//! (macOS ScreenCaptureKit) implement the `CaptureBackend` trait and plug
//! into the generic `CaptureEngine` and `Capturer`.
//!
//! ## Architecture
//!
//! ```text
//! system-capture-core (this crate)
//! ├── traits/    ← CaptureBackend, CaptureStream, CaptureObserver, SampleHandler
//! ├── models/    ← CaptureError, CaptureConfiguration, ContentFilter, SampleEvent, EngineState
//! ├── channel/   ← sample channel (OS callback context → consumer task)
//! ├── session/   ← StreamOutputSink, CaptureEngine, Capturer
//! └── testing    ← FakeBackend (tests and the `test-utils` feature)
//! ```
//!
//! ## Data flow
//!
//! ```text
//! Capturer ─ config + filter → CaptureEngine ─ open/start → OS stream
//!                                                          │ callbacks
//!                                                 StreamOutputSink
//!                                                          │ send
//! Capturer drain loop ←──────────── sample channel ←───────┘
//! ```

pub mod channel;
pub mod models;
pub mod session;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export key types at crate root for convenience.
pub use channel::sample_channel::{sample_channel, SampleReceiver, SampleSender, TryRecvError};
pub use models::config::{CaptureConfiguration, CapturerSettings, FrameInterval};
pub use models::content::{
    ApplicationId, Display, DisplayId, RunningApplication, ShareableContent, Window, WindowId,
};
pub use models::error::{CaptureError, ErrorCategory};
pub use models::filter::ContentFilter;
pub use models::recording::{RecordingFileType, RecordingOutput, RecordingOutputConfig};
pub use models::sample::{OutputType, SampleBuffer, SampleEvent};
pub use models::state::EngineState;
pub use session::capturer::Capturer;
pub use session::engine::CaptureEngine;
pub use session::sink::{StreamDiagnostics, StreamOutputSink};
pub use traits::capture_backend::{CaptureBackend, CaptureStream};
pub use traits::capture_observer::CaptureObserver;
pub use traits::sample_handler::{LoggingSampleHandler, SampleHandler};
