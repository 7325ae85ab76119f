use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Container written by a recording output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingFileType {
    Mp4,
    Mov,
}

impl RecordingFileType {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
        }
    }
}

/// Where and how a secondary recording output persists the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingOutputConfig {
    pub output_path: PathBuf,
    pub file_type: RecordingFileType,
}

impl RecordingOutputConfig {
    pub fn new(output_path: impl Into<PathBuf>, file_type: RecordingFileType) -> Self {
        Self {
            output_path: output_path.into(),
            file_type,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.output_path.as_os_str().is_empty() {
            return Err("recording output path is empty".into());
        }
        match self.output_path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case(self.file_type.extension()) => Ok(()),
            Some(ext) => Err(format!(
                "extension .{} does not match {:?} output",
                ext, self.file_type
            )),
            None => Ok(()),
        }
    }
}

/// A recording output attached to a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingOutput {
    pub id: Uuid,
    pub config: RecordingOutputConfig,
    pub attached_at: DateTime<Utc>,
}

impl RecordingOutput {
    pub fn new(config: RecordingOutputConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            attached_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_extension_against_file_type() {
        assert!(RecordingOutputConfig::new("/tmp/out.mp4", RecordingFileType::Mp4)
            .validate()
            .is_ok());
        assert!(RecordingOutputConfig::new("/tmp/out", RecordingFileType::Mov)
            .validate()
            .is_ok());
        assert!(RecordingOutputConfig::new("/tmp/out.mov", RecordingFileType::Mp4)
            .validate()
            .is_err());
        assert!(RecordingOutputConfig::new("", RecordingFileType::Mp4)
            .validate()
            .is_err());
    }

    #[test]
    fn serializes_for_the_shell() {
        let output = RecordingOutput::new(RecordingOutputConfig::new(
            "/tmp/session.mov",
            RecordingFileType::Mov,
        ));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["config"]["file_type"], "mov");
        assert_eq!(json["id"], output.id.to_string());
    }
}
