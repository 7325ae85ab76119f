use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::channel::sample_channel::SampleReceiver;
use crate::models::config::{CaptureConfiguration, CapturerSettings};
use crate::models::content::{ApplicationId, ShareableContent};
use crate::models::error::{CaptureError, ErrorCategory};
use crate::models::filter::ContentFilter;
use crate::models::recording::{RecordingOutput, RecordingOutputConfig};
use crate::models::sample::SampleEvent;
use crate::session::engine::CaptureEngine;
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::capture_observer::CaptureObserver;
use crate::traits::sample_handler::{LoggingSampleHandler, SampleHandler};

/// Published run state plus the bookkeeping that keeps it consistent.
///
/// `generation` increments on every start so a drain loop that outlived its
/// session can never overwrite the state of a newer one.
#[derive(Debug, Default)]
struct RunState {
    running: bool,
    starting: bool,
    generation: u64,
}

/// Clears `starting` when a start fails or its future is dropped before the
/// session is published, so a later `start` is not swallowed.
struct StartGuard<'a> {
    run_state: &'a Mutex<RunState>,
    generation: u64,
    armed: bool,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut run_state = self.run_state.lock();
        if run_state.generation == self.generation {
            run_state.starting = false;
        }
    }
}

/// Start/stop facade for the presentation shell.
///
/// `is_running` means "capture was requested and the OS stream exists". It
/// turns true as soon as the stream starts, before the first sample arrives,
/// and false once the session ends for any reason.
pub struct Capturer<B: CaptureBackend> {
    engine: CaptureEngine<B>,
    settings: CapturerSettings,
    run_state: Mutex<RunState>,
    running_tx: watch::Sender<bool>,
    observer: RwLock<Option<Arc<dyn CaptureObserver>>>,
    sample_handler: Arc<dyn SampleHandler>,
}

impl<B: CaptureBackend> Capturer<B> {
    pub fn new(backend: B, settings: CapturerSettings) -> Self {
        let engine = CaptureEngine::new(backend)
            .with_channel_capacity(settings.channel_capacity)
            .with_video_forwarding(settings.forward_video);
        let (running_tx, _) = watch::channel(false);

        Self {
            engine,
            settings,
            run_state: Mutex::new(RunState::default()),
            running_tx,
            observer: RwLock::new(None),
            sample_handler: Arc::new(LoggingSampleHandler),
        }
    }

    pub fn with_sample_handler(mut self, handler: Arc<dyn SampleHandler>) -> Self {
        self.sample_handler = handler;
        self
    }

    pub fn set_observer(&self, observer: Arc<dyn CaptureObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn is_running(&self) -> bool {
        self.run_state.lock().running
    }

    /// Watch the running flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.running_tx.subscribe()
    }

    pub fn engine(&self) -> &CaptureEngine<B> {
        &self.engine
    }

    pub fn settings(&self) -> &CapturerSettings {
        &self.settings
    }

    /// Start capturing and drain the session until it ends.
    ///
    /// Returns immediately if a session is running or another start is in
    /// flight. Dropping the future before the session is published abandons
    /// the start; dropping it while draining leaves the session running
    /// until `stop`. Otherwise resolves when the session is stopped (`Ok`) or fails
    /// during setup or at runtime (`Err`, also reported to the observer).
    pub async fn start(&self) -> Result<(), CaptureError> {
        let generation = {
            let mut run_state = self.run_state.lock();
            if run_state.running || run_state.starting {
                log::debug!("capture already running, ignoring start");
                return Ok(());
            }
            run_state.starting = true;
            run_state.generation += 1;
            run_state.generation
        };

        let mut in_flight = StartGuard {
            run_state: &self.run_state,
            generation,
            armed: true,
        };

        let receiver = match self.open_session().await {
            Ok(receiver) => receiver,
            Err(e) => {
                drop(in_flight);
                self.report(&e);
                return Err(e);
            }
        };

        self.publish(generation, true);
        in_flight.armed = false;
        let outcome = self.drain(receiver).await;
        self.publish(generation, false);

        if let Err(e) = &outcome {
            self.report(e);
        }
        outcome
    }

    /// Stop the running session. Always ends in the stopped state, even if
    /// the OS fails to stop the stream.
    pub async fn stop(&self) {
        let generation = {
            let run_state = self.run_state.lock();
            if !run_state.running {
                log::debug!("capture not running, ignoring stop");
                return;
            }
            run_state.generation
        };

        if let Err(e) = self.engine.stop_capture().await {
            log::warn!("failed to stop capture cleanly: {}", e);
        }

        self.publish(generation, false);
    }

    /// Best-effort update of the running session's configuration.
    pub async fn update_configuration(&self, configuration: CaptureConfiguration) {
        self.engine.update_configuration(configuration).await;
    }

    pub async fn attach_recording_output(
        &self,
        config: RecordingOutputConfig,
    ) -> Result<RecordingOutput, CaptureError> {
        self.engine.attach_recording_output(config).await
    }

    pub async fn detach_recording_output(
        &self,
        output: &RecordingOutput,
    ) -> Result<(), CaptureError> {
        self.engine.detach_recording_output(output).await
    }

    // --- Internal helpers ---

    async fn open_session(&self) -> Result<SampleReceiver, CaptureError> {
        let content = self.engine.backend().shareable_content().await?;
        let display = content.primary_display().ok_or(CaptureError::NoDisplay)?;

        let filter =
            ContentFilter::new(display.id).excluding_applications(self.excluded_applications(&content));

        self.engine
            .try_start_capture(self.settings.configuration.clone(), filter)
            .await
    }

    /// The capturing application itself, plus every enumerated application
    /// that shares its identifier or its pid.
    fn excluded_applications(&self, content: &ShareableContent) -> Vec<ApplicationId> {
        let pid = std::process::id();
        let own = self
            .settings
            .application_id
            .as_deref()
            .map(ApplicationId::new)
            .or_else(|| self.engine.backend().current_application_id(content))
            .unwrap_or_else(|| ApplicationId::for_process(pid));

        let mut excluded = vec![own.clone()];
        excluded.extend(
            content
                .applications
                .iter()
                .filter(|app| app.id == own || app.process_id == pid)
                .map(|app| app.id.clone()),
        );
        excluded
    }

    async fn drain(&self, mut receiver: SampleReceiver) -> Result<(), CaptureError> {
        while let Some(event) = receiver.recv().await {
            match event {
                SampleEvent::Audio(buffer) => self.sample_handler.on_audio(&buffer),
                SampleEvent::Video(buffer) => self.sample_handler.on_video(&buffer),
                SampleEvent::Finished => break,
                SampleEvent::Failed(e) if e.category() == ErrorCategory::Teardown => {
                    // Already logged by `stop`.
                    break;
                }
                SampleEvent::Failed(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// The only place the running flag is written.
    fn publish(&self, generation: u64, running: bool) {
        {
            let mut run_state = self.run_state.lock();
            if run_state.generation != generation {
                return;
            }
            if running {
                run_state.starting = false;
            }
            if run_state.running == running {
                return;
            }
            run_state.running = running;
            self.running_tx.send_replace(running);
        }

        log::info!("capture {}", if running { "running" } else { "stopped" });
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer.on_running_changed(running);
        }
    }

    fn report(&self, error: &CaptureError) {
        if !error.is_surfaced() {
            log::warn!("capture error: {}", error);
            return;
        }

        log::error!("capture failed: {}", error);
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer.on_error(error);
        }
    }
}
