use super::error::CaptureError;

/// Capture engine state machine.
///
/// State transitions:
/// ```text
/// idle → starting → active → stopping → idle
///           ↓          ↓
///         idle      failed → idle (reaped by the next engine call)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Idle,
    Starting,
    Active,
    Stopping,
    Failed(CaptureError),
}

impl EngineState {
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_state_carries_error() {
        let state = EngineState::Failed(CaptureError::StreamStopped("gone".into()));
        assert_eq!(state.error(), Some(&CaptureError::StreamStopped("gone".into())));
        assert!(EngineState::Active.error().is_none());
        assert!(EngineState::Stopping.error().is_none());
    }
}
