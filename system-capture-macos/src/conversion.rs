//! Translation between ScreenCaptureKit values and core models.

use std::time::Duration;

use screencapturekit::cm::{CMSampleBuffer, CMTime};
use screencapturekit::shareable_content::SCShareableContent;
use screencapturekit::stream::output_type::SCStreamOutputType;

use system_capture_core::models::content::{
    ApplicationId, Display, DisplayId, RunningApplication, ShareableContent, Window, WindowId,
};
use system_capture_core::models::error::CaptureError;
use system_capture_core::models::sample::{OutputType, SampleBuffer};

/// Bundle identifier, or `pid:N` for processes without one.
pub(crate) fn application_id(bundle_identifier: String, process_id: i32) -> ApplicationId {
    if bundle_identifier.is_empty() {
        ApplicationId::for_process(process_id.max(0) as u32)
    } else {
        ApplicationId::new(bundle_identifier)
    }
}

pub(crate) fn shareable_content(content: &SCShareableContent) -> ShareableContent {
    let displays = content
        .displays()
        .iter()
        .map(|d| Display {
            id: DisplayId(d.display_id()),
            width: d.width(),
            height: d.height(),
        })
        .collect();

    let applications = content
        .applications()
        .iter()
        .map(|app| RunningApplication {
            id: application_id(app.bundle_identifier(), app.process_id()),
            name: app.application_name(),
            process_id: app.process_id().max(0) as u32,
        })
        .collect();

    let windows = content
        .windows()
        .iter()
        .map(|w| Window {
            id: WindowId(w.window_id()),
            title: w.title(),
            owning_application: w
                .owning_application()
                .map(|app| application_id(app.bundle_identifier(), app.process_id())),
        })
        .collect();

    ShareableContent {
        displays,
        applications,
        windows,
    }
}

pub(crate) fn output_type(of_type: SCStreamOutputType) -> Option<OutputType> {
    match of_type {
        SCStreamOutputType::Audio => Some(OutputType::Audio),
        SCStreamOutputType::Screen => Some(OutputType::Screen),
        _ => None,
    }
}

pub(crate) fn output_kind(output_type: OutputType) -> SCStreamOutputType {
    match output_type {
        OutputType::Audio => SCStreamOutputType::Audio,
        OutputType::Screen => SCStreamOutputType::Screen,
    }
}

/// `numerator/denominator` seconds as a CMTime.
pub(crate) fn frame_interval(numerator: u32, denominator: u32) -> CMTime {
    CMTime::new(numerator as i64, denominator as i32)
}

fn presentation_time(time: CMTime) -> Duration {
    if time.timescale <= 0 || time.value < 0 {
        return Duration::ZERO;
    }
    let nanos = time.value as i128 * 1_000_000_000 / time.timescale as i128;
    Duration::from_nanos(nanos.min(u64::MAX as i128) as u64)
}

/// Copy the payload out of an OS sample buffer.
///
/// Audio planes are concatenated channel after channel. Screen buffers carry
/// the locked pixel data. Anything unreadable comes back invalid and is
/// dropped by the sink.
pub(crate) fn sample_buffer(sample: &CMSampleBuffer, output_type: OutputType) -> SampleBuffer {
    let time = presentation_time(sample.presentation_timestamp());
    if !sample.is_valid() {
        return SampleBuffer::invalid(time);
    }

    match output_type {
        OutputType::Audio => {
            let Some(list) = sample.audio_buffer_list() else {
                return SampleBuffer::invalid(time);
            };
            let mut data = Vec::new();
            for buffer in list.iter() {
                data.extend_from_slice(buffer.data());
            }
            SampleBuffer::new(data, time, sample.num_samples())
        }
        OutputType::Screen => {
            let Some(pixels) = sample.image_buffer() else {
                return SampleBuffer::invalid(time);
            };
            match pixels.lock_base_address(true) {
                Ok(guard) => SampleBuffer::new(guard.as_slice().to_vec(), time, 1),
                Err(_) => SampleBuffer::invalid(time),
            }
        }
    }
}

/// Classify a ScreenCaptureKit failure description.
///
/// The framework reports a missing TCC grant as "user declined"; every other
/// enumeration failure is treated as content being unavailable.
pub(crate) fn map_sc_error(description: &str) -> CaptureError {
    let lower = description.to_ascii_lowercase();
    if lower.contains("declined") || lower.contains("permission") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied
    } else {
        CaptureError::ContentUnavailable(description.to_string())
    }
}
