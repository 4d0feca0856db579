//! Windowing toolkit interface
//!
//! The GUI layer creates one native window per note and exposes it here keyed
//! by note id. All calls are synchronous and cheap; under Wayland `move_window`
//! is a no-op and `position` reports `(0,0)`.

use crate::shared::types::{NoteId, Position, Size};

pub trait WindowToolkit: Send + Sync {
    fn create_window(&self, note: &NoteId, title: &str, size: Size);

    fn show_window(&self, note: &NoteId);

    fn hide_window(&self, note: &NoteId);

    fn destroy_window(&self, note: &NoteId);

    fn move_window(&self, note: &NoteId, position: Position);

    fn resize_window(&self, note: &NoteId, size: Size);

    /// `None` once the window no longer exists.
    fn position(&self, note: &NoteId) -> Option<Position>;

    fn size(&self, note: &NoteId) -> Option<Size>;

    /// `0.0` hides the window contents while it is being placed.
    fn set_opacity(&self, note: &NoteId, opacity: f64);

    fn has_window(&self, note: &NoteId) -> bool;
}
