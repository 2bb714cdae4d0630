//! Desktop collaborators
//!
//! Window-title and screen-capture lookups are best-effort I/O behind
//! narrow traits. The shipped implementations are null probes: title
//! falls back to the `"Unknown"` sentinel and capture yields nothing,
//! which makes the screenshot task skip its upload cycle. Platform
//! integrations implement these traits without touching the core.

/// Sentinel reported when the active window cannot be determined.
pub const UNKNOWN_WINDOW: &str = "Unknown";

/// Resolves the title of the currently focused window.
pub trait WindowInspector: Send + Sync {
    /// Best effort; implementations fall back to [`UNKNOWN_WINDOW`]
    /// instead of failing.
    fn active_window_title(&self) -> String;
}

/// Captures the screen as an encoded image.
pub trait ScreenGrabber: Send + Sync {
    /// `quality` is an encoder hint (1-100). `None` means capture is
    /// unavailable and the cycle is skipped.
    fn capture(&self, quality: u8) -> Option<Vec<u8>>;

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }
}

/// Window probe for platforms without an integration.
pub struct NullWindowInspector;

impl WindowInspector for NullWindowInspector {
    fn active_window_title(&self) -> String {
        UNKNOWN_WINDOW.to_string()
    }
}

/// Screen probe for platforms without an integration.
pub struct NullScreenGrabber;

impl ScreenGrabber for NullScreenGrabber {
    fn capture(&self, _quality: u8) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_probes_fall_back() {
        assert_eq!(NullWindowInspector.active_window_title(), UNKNOWN_WINDOW);
        assert!(NullScreenGrabber.capture(60).is_none());
        assert_eq!(NullScreenGrabber.mime_type(), "image/jpeg");
    }
}
