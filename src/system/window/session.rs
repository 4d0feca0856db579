//! Display protocol detection.

/// Windowing protocol of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayProtocol {
    /// Applications cannot read or set their absolute window position.
    Wayland,
    X11,
}

impl DisplayProtocol {
    pub fn detect() -> Self {
        Self::from_env(
            std::env::var("XDG_SESSION_TYPE").ok().as_deref(),
            std::env::var("WAYLAND_DISPLAY").ok().as_deref(),
        )
    }

    pub fn from_env(session_type: Option<&str>, wayland_display: Option<&str>) -> Self {
        if session_type == Some("wayland") || wayland_display.is_some_and(|d| !d.is_empty()) {
            DisplayProtocol::Wayland
        } else {
            DisplayProtocol::X11
        }
    }

    /// Whether the toolkit's own position reporting and moves are unusable.
    pub fn is_restricted(self) -> bool {
        self == DisplayProtocol::Wayland
    }
}
