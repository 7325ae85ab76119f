use std::fmt;

use serde::{Deserialize, Serialize};

/// OS identifier of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayId(pub u32);

/// OS identifier of an on-screen window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

/// Identifier of a running application (its bundle identifier on macOS).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fallback identifier for a process that has no bundle identifier.
    pub fn for_process(pid: u32) -> Self {
        Self(format!("pid:{}", pid))
    }

    /// The pid encoded by [`ApplicationId::for_process`], if any.
    pub fn process_id(&self) -> Option<u32> {
        self.0.strip_prefix("pid:")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pub id: DisplayId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApplication {
    pub id: ApplicationId,
    pub name: String,
    pub process_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: WindowId,
    pub title: Option<String>,
    pub owning_application: Option<ApplicationId>,
}

/// Snapshot of what the OS currently allows to be captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareableContent {
    pub displays: Vec<Display>,
    pub applications: Vec<RunningApplication>,
    pub windows: Vec<Window>,
}

impl ShareableContent {
    pub fn primary_display(&self) -> Option<&Display> {
        self.displays.first()
    }

    pub fn application_for_process(&self, pid: u32) -> Option<&RunningApplication> {
        self.applications.iter().find(|app| app.process_id == pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_fallback_id_round_trips_pid() {
        let id = ApplicationId::for_process(4242);
        assert_eq!(id.as_str(), "pid:4242");
        assert_eq!(id.process_id(), Some(4242));
        assert_eq!(ApplicationId::new("com.example.cap").process_id(), None);
    }

    #[test]
    fn primary_display_is_first_enumerated() {
        let content = ShareableContent {
            displays: vec![
                Display { id: DisplayId(7), width: 1920, height: 1080 },
                Display { id: DisplayId(3), width: 1280, height: 800 },
            ],
            ..Default::default()
        };
        assert_eq!(content.primary_display().map(|d| d.id), Some(DisplayId(7)));
        assert!(ShareableContent::default().primary_display().is_none());
    }
}
