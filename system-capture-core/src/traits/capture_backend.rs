use async_trait::async_trait;

use crate::models::config::CaptureConfiguration;
use crate::models::content::{ApplicationId, ShareableContent};
use crate::models::error::CaptureError;
use crate::models::filter::ContentFilter;
use crate::models::recording::RecordingOutput;
use crate::models::sample::OutputType;
use crate::session::sink::StreamOutputSink;

/// Entry point into the OS screen/media capture subsystem.
///
/// Implemented by:
/// - `ScreenCaptureKitBackend` (macOS)
/// - `FakeBackend` (tests, `test-utils` feature)
#[async_trait]
pub trait CaptureBackend: Send + Sync + 'static {
    /// Enumerate the displays, applications and windows that may be captured.
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError>;

    /// Identifier of the capturing application within `content`.
    ///
    /// Defaults to the application whose pid matches this process.
    fn current_application_id(&self, content: &ShareableContent) -> Option<ApplicationId> {
        content
            .application_for_process(std::process::id())
            .map(|app| app.id.clone())
    }

    /// Construct (but do not start) an OS stream. `sink` is the stream's
    /// delegate: it receives abrupt-stop errors as soon as the stream exists.
    fn open_stream(
        &self,
        configuration: &CaptureConfiguration,
        filter: &ContentFilter,
        sink: StreamOutputSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// A live OS capture stream.
///
/// Owned exclusively by the `CaptureEngine`; buffers for every registered
/// output type are delivered to the sink the stream was opened with, on the
/// OS's own worker context.
#[async_trait]
pub trait CaptureStream: Send {
    /// Register the sink as the receiver for `output_type` buffers.
    fn add_output(&mut self, output_type: OutputType) -> Result<(), CaptureError>;

    async fn start(&mut self) -> Result<(), CaptureError>;

    async fn stop(&mut self) -> Result<(), CaptureError>;

    async fn update_configuration(
        &mut self,
        configuration: &CaptureConfiguration,
    ) -> Result<(), CaptureError>;

    async fn update_content_filter(&mut self, filter: &ContentFilter) -> Result<(), CaptureError>;

    fn add_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError>;

    fn remove_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError>;
}
