use std::time::Duration;

use bytes::Bytes;

use super::error::CaptureError;

/// Kind of output a stream delivers buffers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    Audio,
    Screen,
}

/// One discrete unit of captured audio or video, as delivered by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    data: Bytes,
    presentation_time: Duration,
    frame_count: usize,
    os_valid: bool,
}

impl SampleBuffer {
    pub fn new(data: impl Into<Bytes>, presentation_time: Duration, frame_count: usize) -> Self {
        Self {
            data: data.into(),
            presentation_time,
            frame_count,
            os_valid: true,
        }
    }

    /// A buffer the OS flagged as not ready or corrupt.
    pub fn invalid(presentation_time: Duration) -> Self {
        Self {
            data: Bytes::new(),
            presentation_time,
            frame_count: 0,
            os_valid: false,
        }
    }

    pub fn with_os_validity(mut self, valid: bool) -> Self {
        self.os_valid = valid;
        self
    }

    /// Valid buffers are flagged valid by the OS and carry a payload.
    pub fn is_valid(&self) -> bool {
        self.os_valid && !self.data.is_empty()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Item carried by the sample channel.
///
/// `Finished` and `Failed` are terminal: nothing follows them.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    Audio(SampleBuffer),
    Video(SampleBuffer),
    Finished,
    Failed(CaptureError),
}

impl SampleEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_))
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        match self {
            Self::Audio(buffer) | Self::Video(buffer) => Some(buffer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_buffers_are_invalid() {
        let buffer = SampleBuffer::new(Vec::new(), Duration::ZERO, 0);
        assert!(!buffer.is_valid());
        assert!(buffer.is_empty());
    }

    #[test]
    fn os_flag_overrides_payload() {
        let buffer = SampleBuffer::new(vec![1u8, 2, 3], Duration::from_millis(5), 1);
        assert!(buffer.is_valid());
        assert!(!buffer.clone().with_os_validity(false).is_valid());
        assert!(!SampleBuffer::invalid(Duration::ZERO).is_valid());
    }

    #[test]
    fn terminal_events() {
        assert!(SampleEvent::Finished.is_terminal());
        assert!(SampleEvent::Failed(CaptureError::NoDisplay).is_terminal());

        let audio = SampleEvent::Audio(SampleBuffer::new(vec![0u8; 4], Duration::ZERO, 1));
        assert!(!audio.is_terminal());
        assert_eq!(audio.buffer().map(|b| b.len()), Some(4));
        assert!(SampleEvent::Finished.buffer().is_none());
    }
}
