//! Core value types shared by the reconciliation layer.
//!
//! `NoteId` is the stable identity of a note, `WindowHandle` the opaque id the
//! shell extension gives a window, and `Geometry` a position/size snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use uuid::Uuid;

/// Stable, never reused identity of a note (a UUID string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Number of leading characters embedded in the window title.
    pub const SHORT_LEN: usize = 8;

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, as used in window titles and log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(Self::SHORT_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Window id assigned by the shell extension.
///
/// The extension reserves `0` as "no window"; that sentinel is represented as
/// `Option::<WindowHandle>::None` everywhere in this crate, so a constructed
/// handle is always a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(NonZeroU32);

impl WindowHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_origin(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    pub fn within(&self, other: Position, tolerance: i32) -> bool {
        let limit = tolerance.unsigned_abs();
        self.x.abs_diff(other.x) < limit && self.y.abs_diff(other.y) < limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// The shell's `List` reply leaves geometry out as `0x0`.
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// A toolkit reports 1x1 (or less) before a window is realized.
    pub fn is_realized(&self) -> bool {
        self.width > 1 && self.height > 1
    }

    pub fn within(&self, other: Size, tolerance: i32) -> bool {
        let limit = tolerance.unsigned_abs();
        self.width.abs_diff(other.width) < limit && self.height.abs_diff(other.height) < limit
    }
}

/// Position and size of a window at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub position: Position,
    pub size: Size,
}

impl Geometry {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            position: Position::new(x, y),
            size: Size::new(width, height),
        }
    }
}

/// Which source produced a geometry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryOrigin {
    /// The toolkit's self-report; the position is `(0,0)` under Wayland.
    Toolkit,
    /// The shell extension's report for an assigned handle.
    Shell,
}
