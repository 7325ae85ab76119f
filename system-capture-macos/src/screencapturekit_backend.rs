//! ScreenCaptureKit capture backend.
//!
//! Enumeration and filter resolution go through `SCShareableContent`; each
//! opened stream wraps one `SCStream` whose output handlers and delegate
//! forward into the engine's `StreamOutputSink`. ScreenCaptureKit calls the
//! handlers on its own dispatch queue.
//!
//! Every framework call that waits on a completion handler runs on tokio's
//! blocking pool, so async callers suspend instead of stalling a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use screencapturekit::cm::CMSampleBuffer;
use screencapturekit::error::SCError;
use screencapturekit::shareable_content::SCShareableContent;
use screencapturekit::stream::configuration::SCStreamConfiguration;
use screencapturekit::stream::content_filter::SCContentFilter;
use screencapturekit::stream::delegate_trait::SCStreamDelegateTrait;
use screencapturekit::stream::output_trait::SCStreamOutputTrait;
use screencapturekit::stream::output_type::SCStreamOutputType;
use screencapturekit::stream::SCStream;

use system_capture_core::models::config::CaptureConfiguration;
use system_capture_core::models::content::{ShareableContent, WindowId};
use system_capture_core::models::error::CaptureError;
use system_capture_core::models::filter::ContentFilter;
use system_capture_core::models::recording::RecordingOutput;
use system_capture_core::models::sample::OutputType;
use system_capture_core::session::sink::StreamOutputSink;
use system_capture_core::traits::capture_backend::{CaptureBackend, CaptureStream};

use crate::conversion;

/// `CaptureBackend` backed by ScreenCaptureKit.
///
/// Keeps the most recent enumeration so `open_stream` resolves its filter
/// against the same content the caller just inspected.
#[derive(Default)]
pub struct ScreenCaptureKitBackend {
    last_content: Mutex<Option<SCShareableContent>>,
}

impl ScreenCaptureKitBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Run a completion-handler-bound framework call on the blocking pool.
async fn blocking<T, F>(call: F) -> Result<T, CaptureError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| CaptureError::Unknown(format!("capture worker failed: {}", e)))
}

fn fetch_content() -> Result<SCShareableContent, CaptureError> {
    SCShareableContent::get().map_err(|e| {
        let error = conversion::map_sc_error(&format!("{:?}", e));
        log::error!("failed to enumerate shareable content: {}", error);
        error
    })
}

fn stream_configuration(
    configuration: &CaptureConfiguration,
) -> Result<SCStreamConfiguration, CaptureError> {
    configuration
        .validate()
        .map_err(CaptureError::ConfigurationFailed)?;

    let interval = configuration.frame_interval;
    let mut config = SCStreamConfiguration::new();
    config
        .set_captures_audio(configuration.captures_audio)
        .set_queue_depth(configuration.queue_depth)
        .set_minimum_frame_interval(&conversion::frame_interval(
            interval.numerator,
            interval.denominator,
        ));
    Ok(config)
}

/// Resolve core identifiers against enumerated content into an `SCContentFilter`.
///
/// Excluded applications that are no longer running are skipped.
fn content_filter(
    content: &SCShareableContent,
    filter: &ContentFilter,
) -> Result<SCContentFilter, CaptureError> {
    let displays = content.displays();
    let display = displays
        .iter()
        .find(|d| d.display_id() == filter.display().0)
        .ok_or(CaptureError::NoDisplay)?;

    let applications = content.applications();
    let excluded: Vec<_> = applications
        .iter()
        .filter(|app| {
            filter.excludes(&conversion::application_id(
                app.bundle_identifier(),
                app.process_id(),
            ))
        })
        .collect();

    let windows = content.windows();
    let excepted: Vec<_> = windows
        .iter()
        .filter(|w| filter.excepted_windows().contains(&WindowId(w.window_id())))
        .collect();

    log::debug!(
        "content filter: display {}, excluding {} of {} requested applications",
        display.display_id(),
        excluded.len(),
        filter.excluded_applications().len()
    );

    Ok(SCContentFilter::builder()
        .display(display)
        .exclude_applications(&excluded, &excepted)
        .build())
}

#[async_trait]
impl CaptureBackend for ScreenCaptureKitBackend {
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        let content = blocking(fetch_content).await??;
        let snapshot = conversion::shareable_content(&content);
        *self.last_content.lock() = Some(content);
        Ok(snapshot)
    }

    fn open_stream(
        &self,
        configuration: &CaptureConfiguration,
        filter: &ContentFilter,
        sink: StreamOutputSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let content = match self.last_content.lock().take() {
            Some(content) => content,
            None => {
                log::debug!("no enumerated content cached, enumerating for the filter");
                fetch_content()?
            }
        };
        let sc_filter = content_filter(&content, filter)?;
        let sc_config = stream_configuration(configuration)?;

        let stopped_by_os = Arc::new(AtomicBool::new(false));
        let delegate = StreamDelegate {
            sink: sink.clone(),
            stopped_by_os: Arc::clone(&stopped_by_os),
        };
        let stream = SCStream::new_with_delegate(&sc_filter, &sc_config, delegate);

        Ok(Box::new(ScreenCaptureKitStream {
            stream: Arc::new(stream),
            sink,
            stopped_by_os,
            outputs: Vec::new(),
            recordings: Vec::new(),
            capturing: false,
        }))
    }
}

/// Output handler registered once per output type.
struct SinkOutputHandler {
    sink: StreamOutputSink,
}

impl SCStreamOutputTrait for SinkOutputHandler {
    fn did_output_sample_buffer(&self, sample_buffer: CMSampleBuffer, of_type: SCStreamOutputType) {
        let Some(output_type) = conversion::output_type(of_type) else {
            return;
        };
        if !self.sink.is_open() {
            return;
        }
        let buffer = conversion::sample_buffer(&sample_buffer, output_type);
        self.sink.did_output_sample_buffer(buffer, output_type);
    }
}

struct StreamDelegate {
    sink: StreamOutputSink,
    stopped_by_os: Arc<AtomicBool>,
}

impl SCStreamDelegateTrait for StreamDelegate {
    fn did_stop_with_error(&self, error: SCError) {
        self.stopped_by_os.store(true, Ordering::SeqCst);
        self.sink
            .did_stop_with_error(CaptureError::StreamStopped(format!("{:?}", error)));
    }
}

#[cfg(feature = "macos_15_0")]
type PlatformRecording = screencapturekit::recording_output::SCRecordingOutput;
#[cfg(not(feature = "macos_15_0"))]
type PlatformRecording = ();

struct ScreenCaptureKitStream {
    stream: Arc<SCStream>,
    sink: StreamOutputSink,
    stopped_by_os: Arc<AtomicBool>,
    outputs: Vec<OutputType>,
    recordings: Vec<(RecordingOutput, PlatformRecording)>,
    capturing: bool,
}

#[async_trait]
impl CaptureStream for ScreenCaptureKitStream {
    fn add_output(&mut self, output_type: OutputType) -> Result<(), CaptureError> {
        if self.outputs.contains(&output_type) {
            return Ok(());
        }

        let stream = Arc::get_mut(&mut self.stream).ok_or_else(|| {
            CaptureError::ConfigurationFailed("outputs must be added before the stream starts".into())
        })?;
        let handler = SinkOutputHandler {
            sink: self.sink.clone(),
        };
        stream
            .add_output_handler(handler, conversion::output_kind(output_type))
            .ok_or_else(|| {
                CaptureError::ConfigurationFailed(format!(
                    "failed to register {:?} output",
                    output_type
                ))
            })?;
        self.outputs.push(output_type);
        Ok(())
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        let stream = Arc::clone(&self.stream);
        blocking(move || stream.start_capture())
            .await?
            .map_err(|e| {
                let description = format!("{:?}", e);
                match conversion::map_sc_error(&description) {
                    CaptureError::PermissionDenied => CaptureError::PermissionDenied,
                    _ => CaptureError::StreamStartFailed(description),
                }
            })?;
        self.capturing = true;
        log::info!("ScreenCaptureKit stream started ({:?})", self.outputs);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing = false;
        let stream = Arc::clone(&self.stream);
        blocking(move || stream.stop_capture())
            .await?
            .map_err(|e| CaptureError::StopFailed(format!("{:?}", e)))?;
        log::info!("ScreenCaptureKit stream stopped");
        Ok(())
    }

    async fn update_configuration(
        &mut self,
        configuration: &CaptureConfiguration,
    ) -> Result<(), CaptureError> {
        let config = stream_configuration(configuration)?;
        let stream = Arc::clone(&self.stream);
        blocking(move || stream.update_configuration(&config))
            .await?
            .map_err(|e| CaptureError::UpdateFailed(format!("{:?}", e)))
    }

    async fn update_content_filter(&mut self, filter: &ContentFilter) -> Result<(), CaptureError> {
        let filter = filter.clone();
        let stream = Arc::clone(&self.stream);
        blocking(move || {
            let content = fetch_content()?;
            let sc_filter = content_filter(&content, &filter)?;
            stream
                .update_content_filter(&sc_filter)
                .map_err(|e| CaptureError::UpdateFailed(format!("{:?}", e)))
        })
        .await?
        .map_err(|e| match e {
            CaptureError::UpdateFailed(_) => e,
            other => CaptureError::UpdateFailed(other.to_string()),
        })
    }

    #[cfg(feature = "macos_15_0")]
    fn add_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError> {
        let recording = crate::recording::recording_output(output)?;
        self.stream
            .add_recording_output(&recording)
            .map_err(|e| CaptureError::RecordingOutputFailed(format!("{:?}", e)))?;
        self.recordings.push((output.clone(), recording));
        Ok(())
    }

    #[cfg(feature = "macos_15_0")]
    fn remove_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError> {
        let index = self
            .recordings
            .iter()
            .position(|(attached, _)| attached.id == output.id)
            .ok_or_else(|| {
                CaptureError::RecordingOutputFailed(format!(
                    "no recording output {} attached",
                    output.id
                ))
            })?;
        self.stream
            .remove_recording_output(&self.recordings[index].1)
            .map_err(|e| CaptureError::RecordingOutputFailed(format!("{:?}", e)))?;
        self.recordings.remove(index);
        Ok(())
    }

    #[cfg(not(feature = "macos_15_0"))]
    fn add_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError> {
        Err(CaptureError::RecordingOutputFailed(format!(
            "recording to {} needs the macos_15_0 feature",
            output.config.output_path.display()
        )))
    }

    #[cfg(not(feature = "macos_15_0"))]
    fn remove_recording_output(&mut self, output: &RecordingOutput) -> Result<(), CaptureError> {
        debug_assert!(self.recordings.is_empty());
        Err(CaptureError::RecordingOutputFailed(format!(
            "no recording output {} attached",
            output.id
        )))
    }
}

/// The OS already tore down a stream whose delegate reported an error.
fn needs_stop_on_drop(capturing: bool, stopped_by_os: &AtomicBool) -> bool {
    capturing && !stopped_by_os.load(Ordering::SeqCst)
}

impl Drop for ScreenCaptureKitStream {
    fn drop(&mut self) {
        if needs_stop_on_drop(self.capturing, &self.stopped_by_os) {
            if let Err(e) = self.stream.stop_capture() {
                log::warn!("failed to stop ScreenCaptureKit stream on drop: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn drop_skips_streams_the_os_stopped() {
        let stopped = AtomicBool::new(false);
        assert!(needs_stop_on_drop(true, &stopped));
        assert!(!needs_stop_on_drop(false, &stopped));

        stopped.store(true, Ordering::SeqCst);
        assert!(!needs_stop_on_drop(true, &stopped));
    }

    #[tokio::test]
    async fn blocking_calls_leave_the_runtime_free() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let slow = blocking(move || {
            rx.blocking_recv().ok();
            7
        });
        let other = async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            tx.send(()).ok();
        };

        let (result, ()) = tokio::join!(slow, other);
        assert_eq!(result, Ok(7));
    }
}
