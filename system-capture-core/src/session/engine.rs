use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::channel::sample_channel::{sample_channel, SampleReceiver};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::filter::ContentFilter;
use crate::models::recording::{RecordingOutput, RecordingOutputConfig};
use crate::models::sample::OutputType;
use crate::models::state::EngineState;
use crate::session::sink::{StreamDiagnostics, StreamOutputSink};
use crate::traits::capture_backend::{CaptureBackend, CaptureStream};

/// The open OS stream and everything tied to its lifetime.
struct ActiveSession {
    id: Uuid,
    stream: Box<dyn CaptureStream>,
    sink: StreamOutputSink,
    recording_outputs: Vec<RecordingOutput>,
}

/// Wraps the OS capture stream and returns its output as a [`SampleReceiver`].
///
/// At most one stream is open per engine. The handle lives behind an async
/// mutex that is held only across OS calls, so `stop_capture` can always run
/// while another task drains the channel.
///
/// ```text
/// [OS stream] → [StreamOutputSink] → [sample channel] → consumer
/// ```
pub struct CaptureEngine<B: CaptureBackend> {
    backend: B,
    state: Arc<Mutex<EngineState>>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
    last_session: Mutex<Option<(Uuid, Arc<Mutex<StreamDiagnostics>>)>>,
    channel_capacity: Option<usize>,
    forward_video: bool,
}

impl<B: CaptureBackend> CaptureEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(EngineState::Idle)),
            session: tokio::sync::Mutex::new(None),
            last_session: Mutex::new(None),
            channel_capacity: None,
            forward_video: false,
        }
    }

    /// Bound the sample channel; the oldest buffers are dropped when full.
    pub fn with_channel_capacity(mut self, capacity: Option<usize>) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Deliver screen buffers as video events instead of discarding them.
    pub fn with_video_forwarding(mut self, forward_video: bool) -> Self {
        self.forward_video = forward_video;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().clone()
    }

    /// Identifier of the most recently started session.
    pub fn session_id(&self) -> Option<Uuid> {
        self.last_session.lock().as_ref().map(|(id, _)| *id)
    }

    /// Counters of the most recently started session.
    pub fn diagnostics(&self) -> Option<StreamDiagnostics> {
        self.last_session
            .lock()
            .as_ref()
            .map(|(_, diagnostics)| diagnostics.lock().clone())
    }

    /// Start capturing. Setup failures are reported as the channel's first
    /// (and only) event.
    pub async fn start_capture(
        &self,
        configuration: CaptureConfiguration,
        filter: ContentFilter,
    ) -> SampleReceiver {
        match self.try_start_capture(configuration, filter).await {
            Ok(receiver) => receiver,
            Err(e) => {
                let (sender, receiver) = sample_channel(None);
                sender.fail(e);
                receiver
            }
        }
    }

    /// Start capturing. Transitions: idle → starting → active.
    ///
    /// On failure the engine is back in idle and no stream is retained.
    pub async fn try_start_capture(
        &self,
        configuration: CaptureConfiguration,
        filter: ContentFilter,
    ) -> Result<SampleReceiver, CaptureError> {
        let configuration = configuration.validated()?;

        let mut session = self.session.lock().await;
        self.reap_failed(&mut session);
        if session.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        *self.state.lock() = EngineState::Starting;
        let mut starting = StartingGuard::new(&self.state);

        let (sender, receiver) = sample_channel(self.channel_capacity);
        let sink = StreamOutputSink::new(sender, Arc::clone(&self.state), self.forward_video);

        let stream = match self.open_stream(&configuration, &filter, sink.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                log::debug!("capture stream setup failed: {}", e);
                return Err(e);
            }
        };

        starting.disarm();
        let id = Uuid::new_v4();
        {
            let mut state = self.state.lock();
            if matches!(*state, EngineState::Starting) {
                *state = EngineState::Active;
            }
        }

        log::info!(
            "capture session {} started on display {:?} ({} excluded apps)",
            id,
            filter.display(),
            filter.excluded_applications().len()
        );

        *self.last_session.lock() = Some((id, sink.diagnostics_handle()));
        *session = Some(ActiveSession {
            id,
            stream,
            sink,
            recording_outputs: Vec::new(),
        });

        Ok(receiver)
    }

    /// Stop capturing. Transitions: active → stopping → idle.
    ///
    /// A no-op without a session. The channel is finished on a clean OS stop
    /// and failed with the stop error otherwise; the stream handle is released
    /// either way.
    pub async fn stop_capture(&self) -> Result<(), CaptureError> {
        let mut session = self.session.lock().await;
        let Some(mut active) = session.take() else {
            return Ok(());
        };

        {
            let mut state = self.state.lock();
            if let Some(err) = state.error() {
                log::debug!("releasing failed capture session {}: {}", active.id, err);
                *state = EngineState::Idle;
                return Ok(());
            }
            *state = EngineState::Stopping;
        }

        let result = active.stream.stop().await.map_err(|e| match e {
            CaptureError::StopFailed(_) => e,
            other => CaptureError::StopFailed(other.to_string()),
        });

        match &result {
            Ok(()) => {
                active.sink.sender().finish();
                log::info!("capture session {} stopped", active.id);
            }
            Err(e) => {
                log::warn!("capture session {} stop failed: {}", active.id, e);
                active.sink.sender().fail(e.clone());
            }
        }

        drop(active);
        *self.state.lock() = EngineState::Idle;
        result
    }

    /// Apply a new configuration to the live stream. Best effort: failures
    /// are logged and the session keeps its previous settings.
    pub async fn update_configuration(&self, configuration: CaptureConfiguration) {
        if let Err(e) = configuration.validate() {
            log::warn!("ignoring invalid stream configuration: {}", e);
            return;
        }

        let mut session = self.session.lock().await;
        self.reap_failed(&mut session);
        let Some(active) = session.as_mut() else {
            log::debug!("no capture session to update");
            return;
        };

        if let Err(e) = active.stream.update_configuration(&configuration).await {
            log::warn!("failed to update the stream configuration: {}", e);
        }
    }

    /// Apply a new content filter to the live stream. Best effort, like
    /// [`update_configuration`](Self::update_configuration).
    pub async fn update_filter(&self, filter: ContentFilter) {
        let mut session = self.session.lock().await;
        self.reap_failed(&mut session);
        let Some(active) = session.as_mut() else {
            log::debug!("no capture session to update");
            return;
        };

        if let Err(e) = active.stream.update_content_filter(&filter).await {
            log::warn!("failed to update the stream content filter: {}", e);
        }
    }

    /// Attach a recording output to the live stream.
    pub async fn attach_recording_output(
        &self,
        config: RecordingOutputConfig,
    ) -> Result<RecordingOutput, CaptureError> {
        config
            .validate()
            .map_err(CaptureError::RecordingOutputFailed)?;

        let mut session = self.session.lock().await;
        self.reap_failed(&mut session);
        let active = session.as_mut().ok_or(CaptureError::NotRunning)?;

        let output = RecordingOutput::new(config);
        active
            .stream
            .add_recording_output(&output)
            .map_err(recording_error)?;

        log::info!(
            "recording output {} attached to session {} ({})",
            output.id,
            active.id,
            output.config.output_path.display()
        );
        active.recording_outputs.push(output.clone());
        Ok(output)
    }

    /// Detach a recording output previously attached to the live stream.
    pub async fn detach_recording_output(
        &self,
        output: &RecordingOutput,
    ) -> Result<(), CaptureError> {
        let mut session = self.session.lock().await;
        self.reap_failed(&mut session);
        let active = session.as_mut().ok_or(CaptureError::NotRunning)?;

        if !active.recording_outputs.iter().any(|o| o.id == output.id) {
            return Err(CaptureError::RecordingOutputFailed(format!(
                "recording output {} is not attached",
                output.id
            )));
        }

        active
            .stream
            .remove_recording_output(output)
            .map_err(recording_error)?;
        active.recording_outputs.retain(|o| o.id != output.id);

        log::info!("recording output {} detached", output.id);
        Ok(())
    }

    pub async fn recording_outputs(&self) -> Vec<RecordingOutput> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|active| active.recording_outputs.clone())
            .unwrap_or_default()
    }

    // --- Internal helpers ---

    async fn open_stream(
        &self,
        configuration: &CaptureConfiguration,
        filter: &ContentFilter,
        sink: StreamOutputSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let mut stream = self.backend.open_stream(configuration, filter, sink)?;

        stream.add_output(OutputType::Screen)?;
        if configuration.captures_audio {
            stream.add_output(OutputType::Audio)?;
        }

        stream.start().await?;
        Ok(stream)
    }

    /// Release a stream the OS already stopped. Transitions: failed → idle.
    fn reap_failed(&self, session: &mut Option<ActiveSession>) {
        let mut state = self.state.lock();
        let Some(err) = state.error() else {
            return;
        };
        if let Some(active) = session.take() {
            log::debug!("releasing failed capture session {}: {}", active.id, err);
        }
        *state = EngineState::Idle;
    }
}

/// Returns the engine to idle if a start fails or its future is dropped
/// before a session is stored.
struct StartingGuard<'a> {
    state: &'a Mutex<EngineState>,
    armed: bool,
}

impl<'a> StartingGuard<'a> {
    fn new(state: &'a Mutex<EngineState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.lock() = EngineState::Idle;
        }
    }
}

fn recording_error(e: CaptureError) -> CaptureError {
    match e {
        CaptureError::RecordingOutputFailed(_) => e,
        other => CaptureError::RecordingOutputFailed(other.to_string()),
    }
}
