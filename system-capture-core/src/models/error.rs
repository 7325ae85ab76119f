use thiserror::Error;

/// Errors that can occur while negotiating, running or tearing down a capture session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("screen recording permission denied")]
    PermissionDenied,

    #[error("no display available for capture")]
    NoDisplay,

    #[error("shareable content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("stream start failed: {0}")]
    StreamStartFailed(String),

    #[error("stream stopped unexpectedly: {0}")]
    StreamStopped(String),

    #[error("stream stop failed: {0}")]
    StopFailed(String),

    #[error("stream update failed: {0}")]
    UpdateFailed(String),

    #[error("recording output failed: {0}")]
    RecordingOutputFailed(String),

    #[error("capture session already running")]
    AlreadyRunning,

    #[error("no capture session running")]
    NotRunning,

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Where in the session lifecycle an error belongs.
///
/// Setup and runtime failures are surfaced to the caller; teardown and update
/// failures are logged and swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Setup,
    Runtime,
    Teardown,
    Update,
    Recording,
    Usage,
}

impl CaptureError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PermissionDenied
            | Self::NoDisplay
            | Self::ContentUnavailable(_)
            | Self::ConfigurationFailed(_)
            | Self::StreamStartFailed(_) => ErrorCategory::Setup,
            Self::StreamStopped(_) | Self::Unknown(_) => ErrorCategory::Runtime,
            Self::StopFailed(_) => ErrorCategory::Teardown,
            Self::UpdateFailed(_) => ErrorCategory::Update,
            Self::RecordingOutputFailed(_) => ErrorCategory::Recording,
            Self::AlreadyRunning | Self::NotRunning => ErrorCategory::Usage,
        }
    }

    /// Whether this error must be reported to the user rather than only logged.
    pub fn is_surfaced(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Setup | ErrorCategory::Runtime | ErrorCategory::Recording
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_display_is_a_recoverable_setup_failure() {
        let err = CaptureError::NoDisplay;
        assert_eq!(err.category(), ErrorCategory::Setup);
        assert!(err.is_surfaced());
    }

    #[test]
    fn teardown_and_update_failures_are_swallowed() {
        assert!(!CaptureError::StopFailed("busy".into()).is_surfaced());
        assert!(!CaptureError::UpdateFailed("busy".into()).is_surfaced());
        assert!(CaptureError::StreamStopped("display removed".into()).is_surfaced());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            CaptureError::StopFailed("timeout".into()).to_string(),
            "stream stop failed: timeout"
        );
        assert_eq!(CaptureError::NoDisplay.to_string(), "no display available for capture");
    }
}
