//! File recording through `SCRecordingOutput`.

use screencapturekit::recording_output::{
    SCRecordingOutput, SCRecordingOutputConfiguration, SCRecordingOutputFileType,
};

use system_capture_core::models::error::CaptureError;
use system_capture_core::models::recording::{RecordingFileType, RecordingOutput};

pub(crate) fn recording_output(output: &RecordingOutput) -> Result<SCRecordingOutput, CaptureError> {
    let file_type = match output.config.file_type {
        RecordingFileType::Mp4 => SCRecordingOutputFileType::MP4,
        RecordingFileType::Mov => SCRecordingOutputFileType::MOV,
    };

    let config = SCRecordingOutputConfiguration::new()
        .with_output_url(&output.config.output_path)
        .with_output_file_type(file_type);

    SCRecordingOutput::new(&config).ok_or_else(|| {
        CaptureError::RecordingOutputFailed(format!(
            "failed to create recording output for {}",
            output.config.output_path.display()
        ))
    })
}
