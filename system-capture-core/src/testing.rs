//! In-memory stand-in for the OS capture subsystem.
//!
//! Scripted shareable content, injectable failures for every OS call, and a
//! handle to push sample buffers or stream errors into the registered sink as
//! if they came from the OS worker context.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::models::config::CaptureConfiguration;
use crate::models::content::{
    ApplicationId, Display, DisplayId, RunningApplication, ShareableContent,
};
use crate::models::error::CaptureError;
use crate::models::filter::ContentFilter;
use crate::models::recording::RecordingOutput;
use crate::models::sample::{OutputType, SampleBuffer};
use crate::session::sink::StreamOutputSink;
use crate::traits::capture_backend::{CaptureBackend, CaptureStream};

#[derive(Default)]
struct FakeState {
    content: ShareableContent,
    current_application: Option<ApplicationId>,

    content_error: Option<CaptureError>,
    open_error: Option<CaptureError>,
    start_error: Option<CaptureError>,
    stop_error: Option<CaptureError>,
    update_error: Option<CaptureError>,
    recording_error: Option<CaptureError>,
    start_gate: Option<Arc<Notify>>,

    sink: Option<StreamOutputSink>,
    outputs: Vec<OutputType>,
    streaming: bool,
    last_filter: Option<ContentFilter>,
    last_configuration: Option<CaptureConfiguration>,
    recording_outputs: Vec<Uuid>,

    content_count: usize,
    open_count: usize,
    start_count: usize,
    stop_count: usize,
    update_count: usize,
}

/// Fake OS capture backend. Clones share state.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new(content: ShareableContent) -> Self {
        let backend = Self::default();
        backend.state.lock().content = content;
        backend
    }

    /// One 1920x1080 display and no other running applications.
    pub fn with_display() -> Self {
        Self::new(ShareableContent {
            displays: vec![Display {
                id: DisplayId(1),
                width: 1920,
                height: 1080,
            }],
            ..Default::default()
        })
    }

    pub fn set_content(&self, content: ShareableContent) {
        self.state.lock().content = content;
    }

    pub fn add_application(&self, id: &str, process_id: u32) {
        self.state.lock().content.applications.push(RunningApplication {
            id: ApplicationId::new(id),
            name: id.rsplit('.').next().unwrap_or(id).to_string(),
            process_id,
        });
    }

    pub fn set_current_application(&self, id: ApplicationId) {
        self.state.lock().current_application = Some(id);
    }

    pub fn fail_content(&self, error: CaptureError) {
        self.state.lock().content_error = Some(error);
    }

    pub fn fail_open(&self, error: CaptureError) {
        self.state.lock().open_error = Some(error);
    }

    pub fn fail_start(&self, error: CaptureError) {
        self.state.lock().start_error = Some(error);
    }

    pub fn fail_stop(&self, error: CaptureError) {
        self.state.lock().stop_error = Some(error);
    }

    pub fn fail_updates(&self, error: CaptureError) {
        self.state.lock().update_error = Some(error);
    }

    pub fn fail_recording(&self, error: CaptureError) {
        self.state.lock().recording_error = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.content_error = None;
        state.open_error = None;
        state.start_error = None;
        state.stop_error = None;
        state.update_error = None;
        state.recording_error = None;
    }

    /// Make the next stream start wait until the returned gate is notified.
    pub fn hold_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().start_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Deliver a buffer to the sink as the OS would, if the stream is
    /// running and the output type is registered.
    pub fn emit(&self, output_type: OutputType, buffer: SampleBuffer) {
        let sink = {
            let state = self.state.lock();
            if !state.streaming || !state.outputs.contains(&output_type) {
                return;
            }
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.did_output_sample_buffer(buffer, output_type);
        }
    }

    /// Report that the OS stopped the stream on its own.
    pub fn emit_stream_error(&self, error: CaptureError) {
        let sink = {
            let mut state = self.state.lock();
            state.streaming = false;
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.did_stop_with_error(error);
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    pub fn registered_outputs(&self) -> Vec<OutputType> {
        self.state.lock().outputs.clone()
    }

    pub fn last_filter(&self) -> Option<ContentFilter> {
        self.state.lock().last_filter.clone()
    }

    pub fn last_configuration(&self) -> Option<CaptureConfiguration> {
        self.state.lock().last_configuration.clone()
    }

    pub fn recording_outputs(&self) -> Vec<Uuid> {
        self.state.lock().recording_outputs.clone()
    }

    pub fn content_count(&self) -> usize {
        self.state.lock().content_count
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stop_count
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().update_count
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        let mut state = self.state.lock();
        state.content_count += 1;
        match &state.content_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.content.clone()),
        }
    }

    fn current_application_id(&self, content: &ShareableContent) -> Option<ApplicationId> {
        let configured = self.state.lock().current_application.clone();
        configured.or_else(|| {
            content
                .application_for_process(std::process::id())
                .map(|app| app.id.clone())
        })
    }

    fn open_stream(
        &self,
        configuration: &CaptureConfiguration,
        filter: &ContentFilter,
        sink: StreamOutputSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let mut state = self.state.lock();
        state.open_count += 1;
        if let Some(e) = &state.open_error {
            return Err(e.clone());
        }

        state.sink = Some(sink);
        state.outputs.clear();
        state.streaming = false;
        state.last_filter = Some(filter.clone());
        state.last_configuration = Some(configuration.clone());
        state.recording_outputs.clear();

        Ok(Box::new(FakeStream {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeStream {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl CaptureStream for FakeStream {
    fn add_output(&mut self, output_type: OutputType) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if !state.outputs.contains(&output_type) {
            state.outputs.push(output_type);
        }
        Ok(())
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        let gate = self.state.lock().start_gate.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        state.start_count += 1;
        if let Some(e) = &state.start_error {
            return Err(e.clone());
        }
        state.streaming = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.stop_count += 1;
        state.streaming = false;
        match &state.stop_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn update_configuration(
        &mut self,
        configuration: &CaptureConfiguration,
    ) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.update_count += 1;
        if let Some(e) = &state.update_error {
            return Err(e.clone());
        }
        state.last_configuration = Some(configuration.clone());
        Ok(())
    }

    async fn update_content_filter(&mut self, filter: &ContentFilter) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.update_count += 1;
        if let Some(e) = &state.update_error {
            return Err(e.clone());
        }
        state.last_filter = Some(filter.clone());
        Ok(())
    }

    fn add_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if let Some(e) = &state.recording_error {
            return Err(e.clone());
        }
        state.recording_outputs.push(output.id);
        Ok(())
    }

    fn remove_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if let Some(e) = &state.recording_error {
            return Err(e.clone());
        }
        state.recording_outputs.retain(|id| *id != output.id);
        Ok(())
    }
}
