use crate::models::error::CaptureError;

/// Notifications for the presentation shell.
///
/// Called from whichever task drives `start`/`stop`, never from the OS
/// callback context. Implementations should marshal to the UI thread if needed.
pub trait CaptureObserver: Send + Sync {
    /// Called after the published running flag changes.
    fn on_running_changed(&self, is_running: bool);

    /// Called once per setup or runtime failure.
    fn on_error(&self, error: &CaptureError);
}
