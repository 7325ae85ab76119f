use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Default capture cadence in frames per second.
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Default number of buffered frames the OS may hold for the stream.
///
/// Higher values keep the frame rate up under load at the cost of the
/// window server's memory footprint.
pub const DEFAULT_QUEUE_DEPTH: u32 = 5;

/// Largest queue depth ScreenCaptureKit accepts.
pub const MAX_QUEUE_DEPTH: u32 = 8;

/// Minimum interval between delivered frames, as a rational number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInterval {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameInterval {
    /// Interval for a cadence of `fps` frames per second.
    pub fn per_second(fps: u32) -> Self {
        Self {
            numerator: 1,
            denominator: fps,
        }
    }

    pub fn as_duration(&self) -> Duration {
        if self.denominator == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.numerator as f64 / self.denominator as f64)
    }
}

impl Default for FrameInterval {
    fn default() -> Self {
        Self::per_second(DEFAULT_FRAME_RATE)
    }
}

/// Configuration handed to the OS capture stream.
///
/// Immutable for the lifetime of a session once passed to the engine;
/// changes go through `CaptureEngine::update_configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Capture system audio alongside the screen (default: true).
    pub captures_audio: bool,

    /// Target sample/frame cadence (default: 1/60 s).
    pub frame_interval: FrameInterval,

    /// Buffered-frame budget (default: 5).
    pub queue_depth: u32,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_interval.numerator == 0 || self.frame_interval.denominator == 0 {
            return Err(format!(
                "invalid frame interval: {}/{}",
                self.frame_interval.numerator, self.frame_interval.denominator
            ));
        }
        if !(1..=MAX_QUEUE_DEPTH).contains(&self.queue_depth) {
            return Err(format!("unsupported queue depth: {}", self.queue_depth));
        }
        Ok(())
    }

    pub fn validated(self) -> Result<Self, CaptureError> {
        self.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(self)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            captures_audio: true,
            frame_interval: FrameInterval::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Construction-time parameters for a [`Capturer`](crate::Capturer).
///
/// Read once; the core never writes them back anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturerSettings {
    pub configuration: CaptureConfiguration,

    /// Identifier of the capturing application. When unset it is looked up
    /// in the shareable content by this process's pid.
    pub application_id: Option<String>,

    /// Sample channel capacity; `None` keeps every buffer until consumed.
    pub channel_capacity: Option<usize>,

    /// Forward screen buffers as video events (default: false).
    pub forward_video: bool,
}

impl CapturerSettings {
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        self.configuration
            .validate()
            .map_err(CaptureError::ConfigurationFailed)?;
        if self.channel_capacity == Some(0) {
            return Err(CaptureError::ConfigurationFailed(
                "channel capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CapturerSettings {
    fn default() -> Self {
        Self {
            configuration: CaptureConfiguration::default(),
            application_id: None,
            channel_capacity: None,
            forward_video: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_constants() {
        let config = CaptureConfiguration::default();
        assert!(config.captures_audio);
        assert_eq!(config.frame_interval, FrameInterval { numerator: 1, denominator: 60 });
        assert_eq!(config.queue_depth, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_interval_and_bad_queue_depth() {
        let mut config = CaptureConfiguration::default();
        config.frame_interval.denominator = 0;
        assert!(config.validate().is_err());

        let config = CaptureConfiguration {
            queue_depth: 9,
            ..Default::default()
        };
        assert!(matches!(
            config.validated(),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn frame_interval_duration() {
        let interval = FrameInterval::per_second(50);
        assert_eq!(interval.as_duration(), Duration::from_millis(20));
    }

    #[test]
    fn settings_from_partial_json() {
        let settings = CapturerSettings::from_json(
            r#"{ "configuration": { "queue_depth": 3 }, "forward_video": true }"#,
        )
        .unwrap();

        assert_eq!(settings.configuration.queue_depth, 3);
        assert!(settings.configuration.captures_audio);
        assert_eq!(settings.configuration.frame_interval.denominator, 60);
        assert!(settings.forward_video);
        assert_eq!(settings.channel_capacity, None);
    }

    #[test]
    fn settings_reject_zero_capacity() {
        let err = CapturerSettings::from_json(r#"{ "channel_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }
}
