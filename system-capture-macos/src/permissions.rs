//! Screen Recording permission check.
//!
//! ScreenCaptureKit has no direct query for the TCC state. Enumerating
//! shareable content succeeds only once the user has granted Screen
//! Recording to the host application, and the first attempt triggers the
//! system prompt.

use screencapturekit::shareable_content::SCShareableContent;

use system_capture_core::models::error::CaptureError;

/// Whether Screen Recording permission is granted.
pub fn check_screen_capture_permission() -> bool {
    SCShareableContent::get().is_ok()
}

/// Probe permission, surfacing a denial as `CaptureError::PermissionDenied`.
pub fn require_screen_capture_permission() -> Result<(), CaptureError> {
    SCShareableContent::get()
        .map(|_| ())
        .map_err(|e| crate::conversion::map_sc_error(&format!("{:?}", e)))
}
