use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::sample_channel::SampleSender;
use crate::models::error::CaptureError;
use crate::models::sample::{OutputType, SampleBuffer, SampleEvent};
use crate::models::state::EngineState;

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDiagnostics {
    pub audio_buffers: u64,
    pub video_buffers: u64,
    pub invalid_buffers: u64,
    pub ignored_screen_buffers: u64,
    pub channel_dropped: u64,
}

/// Receiver for everything the OS stream pushes: sample buffers for each
/// registered output type, and the abrupt-stop notification.
///
/// Called on the OS capture worker context. Only validates and forwards into
/// the sample channel; never blocks.
#[derive(Clone)]
pub struct StreamOutputSink {
    sender: SampleSender,
    engine_state: Arc<Mutex<EngineState>>,
    diagnostics: Arc<Mutex<StreamDiagnostics>>,
    forward_video: bool,
}

impl StreamOutputSink {
    pub(crate) fn new(
        sender: SampleSender,
        engine_state: Arc<Mutex<EngineState>>,
        forward_video: bool,
    ) -> Self {
        Self {
            sender,
            engine_state,
            diagnostics: Arc::new(Mutex::new(StreamDiagnostics::default())),
            forward_video,
        }
    }

    pub fn did_output_sample_buffer(&self, buffer: SampleBuffer, output_type: OutputType) {
        if !buffer.is_valid() {
            self.diagnostics.lock().invalid_buffers += 1;
            log::trace!("dropping invalid {:?} buffer", output_type);
            return;
        }

        match output_type {
            OutputType::Audio => self.forward(SampleEvent::Audio(buffer), |d| d.audio_buffers += 1),
            OutputType::Screen if self.forward_video => {
                self.forward(SampleEvent::Video(buffer), |d| d.video_buffers += 1)
            }
            OutputType::Screen => self.diagnostics.lock().ignored_screen_buffers += 1,
        }
    }

    pub fn did_stop_with_error(&self, error: CaptureError) {
        log::error!("capture stream stopped with an error: {}", error);

        {
            let mut state = self.engine_state.lock();
            if matches!(*state, EngineState::Starting | EngineState::Active) {
                *state = EngineState::Failed(error.clone());
            }
        }

        self.sender.fail(error);
    }

    /// Whether the sink still forwards buffers.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.diagnostics.lock().clone()
    }

    /// Shared counters; outlive the sink and its channel.
    pub(crate) fn diagnostics_handle(&self) -> Arc<Mutex<StreamDiagnostics>> {
        Arc::clone(&self.diagnostics)
    }

    fn forward(&self, event: SampleEvent, count: impl FnOnce(&mut StreamDiagnostics)) {
        if self.sender.send(event) {
            let mut diagnostics = self.diagnostics.lock();
            count(&mut diagnostics);
            diagnostics.channel_dropped = self.sender.dropped();
        }
    }

    pub(crate) fn sender(&self) -> &SampleSender {
        &self.sender
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::sample_channel::{sample_channel, TryRecvError};

    fn sink(forward_video: bool) -> (StreamOutputSink, crate::SampleReceiver, Arc<Mutex<EngineState>>) {
        let (tx, rx) = sample_channel(None);
        let state = Arc::new(Mutex::new(EngineState::Active));
        (StreamOutputSink::new(tx, Arc::clone(&state), forward_video), rx, state)
    }

    fn buffer(n: u8) -> SampleBuffer {
        SampleBuffer::new(vec![n; 8], Duration::from_millis(n as u64), 2)
    }

    #[test]
    fn invalid_buffers_are_dropped_silently() {
        let (sink, mut rx, _) = sink(false);

        sink.did_output_sample_buffer(SampleBuffer::invalid(Duration::ZERO), OutputType::Audio);
        sink.did_output_sample_buffer(
            SampleBuffer::new(Vec::new(), Duration::ZERO, 0),
            OutputType::Audio,
        );
        sink.did_output_sample_buffer(buffer(1).with_os_validity(false), OutputType::Screen);

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(sink.is_open());
        assert_eq!(sink.diagnostics().invalid_buffers, 3);
    }

    #[test]
    fn routes_audio_and_ignores_screen_by_default() {
        let (sink, mut rx, _) = sink(false);

        sink.did_output_sample_buffer(buffer(1), OutputType::Audio);
        sink.did_output_sample_buffer(buffer(2), OutputType::Screen);
        sink.did_output_sample_buffer(buffer(3), OutputType::Audio);

        assert_eq!(rx.try_recv(), Ok(SampleEvent::Audio(buffer(1))));
        assert_eq!(rx.try_recv(), Ok(SampleEvent::Audio(buffer(3))));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.audio_buffers, 2);
        assert_eq!(diagnostics.ignored_screen_buffers, 1);
    }

    #[test]
    fn forwards_screen_as_video_when_enabled() {
        let (sink, mut rx, _) = sink(true);
        sink.did_output_sample_buffer(buffer(4), OutputType::Screen);
        assert_eq!(rx.try_recv(), Ok(SampleEvent::Video(buffer(4))));
        assert_eq!(sink.diagnostics().video_buffers, 1);
    }

    #[test]
    fn stream_error_fails_channel_and_engine() {
        let (sink, mut rx, state) = sink(false);
        let err = CaptureError::StreamStopped("permission revoked".into());

        sink.did_output_sample_buffer(buffer(1), OutputType::Audio);
        sink.did_stop_with_error(err.clone());
        sink.did_output_sample_buffer(buffer(2), OutputType::Audio);

        assert_eq!(*state.lock(), EngineState::Failed(err.clone()));
        assert!(!sink.is_open());
        assert_eq!(rx.try_recv(), Ok(SampleEvent::Audio(buffer(1))));
        assert_eq!(rx.try_recv(), Ok(SampleEvent::Failed(err)));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
        assert_eq!(sink.diagnostics().audio_buffers, 1);
    }

    #[tokio::test]
    async fn diagnostics_outlive_the_sink() {
        let (sink, mut rx, _) = sink(false);
        sink.did_output_sample_buffer(buffer(1), OutputType::Audio);
        let diagnostics = sink.diagnostics_handle();
        drop(sink);

        assert_eq!(rx.recv().await, Some(SampleEvent::Audio(buffer(1))));
        assert_eq!(rx.recv().await, None);
        assert_eq!(diagnostics.lock().audio_buffers, 1);
    }

    #[test]
    fn stream_error_while_stopping_keeps_engine_state() {
        let (sink, _rx, state) = sink(false);
        *state.lock() = EngineState::Stopping;
        sink.did_stop_with_error(CaptureError::StreamStopped("late".into()));
        assert_eq!(*state.lock(), EngineState::Stopping);
    }
}
