use crate::models::sample::SampleBuffer;

/// Consumer of the media events drained by the `Capturer`.
///
/// Runs on the draining task. Keep it short: a slow handler delays the
/// channel, and with a bounded channel that means dropped buffers.
pub trait SampleHandler: Send + Sync {
    fn on_audio(&self, buffer: &SampleBuffer);

    fn on_video(&self, _buffer: &SampleBuffer) {}
}

/// Logs audio buffers and ignores video.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSampleHandler;

impl SampleHandler for LoggingSampleHandler {
    fn on_audio(&self, buffer: &SampleBuffer) {
        log::trace!(
            "audio buffer: {} bytes, {} frames, pts {:?}",
            buffer.len(),
            buffer.frame_count(),
            buffer.presentation_time()
        );
    }
}
