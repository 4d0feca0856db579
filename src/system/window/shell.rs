//! Shell window registry interface
//!
//! The GNOME Shell "window-calls" extension lists windows system-wide, returns
//! per-window details and moves windows by handle. Replies are JSON strings.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::shared::types::{Geometry, WindowHandle};

/// One entry of the extension's `List` reply. `List` may omit the title.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WindowInfo {
    pub id: u32,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub wm_class: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl WindowInfo {
    pub fn handle(&self) -> Option<WindowHandle> {
        WindowHandle::new(self.id)
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.x, self.y, self.width, self.height)
    }
}

/// The extension's `Details` reply for one window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WindowDetails {
    pub id: u32,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub wm_class: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub maximized: i32,
    #[serde(default)]
    pub focus: bool,
}

impl WindowDetails {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// Service or method unknown on the bus: the extension is not installed
    /// or not enabled. Permanent for the process lifetime.
    #[error("window registry unavailable: {0}")]
    ServiceUnavailable(String),

    /// The extension failed for this specific window (closed, not yet
    /// registered). Means "no data", not a fault.
    #[error("no data for window {0}")]
    WindowGone(u32),

    #[error("window registry call failed: {0}")]
    Call(String),

    #[error("malformed window registry reply: {0}")]
    Parse(String),
}

impl ShellError {
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, ShellError::ServiceUnavailable(_))
    }
}

/// Request/reply access to the shell's window registry.
#[async_trait]
pub trait WindowRegistry: Send + Sync {
    /// Every window the shell knows about, across all processes.
    async fn list_windows(&self) -> Result<Vec<WindowInfo>, ShellError>;

    async fn window_details(&self, handle: WindowHandle) -> Result<WindowDetails, ShellError>;

    async fn move_window(&self, handle: WindowHandle, x: i32, y: i32) -> Result<(), ShellError>;
}

/// Longest reply excerpt quoted in a parse error.
const EXCERPT_LEN: usize = 100;

fn excerpt(raw: &str) -> &str {
    match raw.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

pub fn parse_window_list(raw: &str) -> Result<Vec<WindowInfo>, ShellError> {
    serde_json::from_str(raw)
        .map_err(|e| ShellError::Parse(format!("window list: {} (reply: {})", e, excerpt(raw))))
}

pub fn parse_window_details(raw: &str) -> Result<WindowDetails, ShellError> {
    serde_json::from_str(raw)
        .map_err(|e| ShellError::Parse(format!("window details: {} (reply: {})", e, excerpt(raw))))
}

/// Whether a `List` reply looks like the extension answered.
pub fn looks_like_reply(raw: &str) -> bool {
    matches!(raw.trim_start().chars().next(), Some('[') | Some('{'))
}
