//! Note window configuration
//!
//! Centralized defaults for note windows so dimensions and the title format
//! are not hardcoded across the reconciliation code.

use crate::shared::types::{NoteId, Position, Size};

/// Prefix shared by every note window title.
pub const TITLE_PREFIX: &str = "Sticky Notes";

/// Window defaults for notes without saved geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteWindowConfig {
    pub default_size: Size,
    pub default_position: Position,
    /// Vertical gap between a note and one created from it.
    pub stack_gap: i32,
}

impl Default for NoteWindowConfig {
    fn default() -> Self {
        Self {
            default_size: Size::new(200, 150),
            default_position: Position::new(10, 10),
            stack_gap: 10,
        }
    }
}

impl NoteWindowConfig {
    /// Position for a note created from `anchor`: directly below it.
    pub fn stacked_below(&self, anchor: Position, anchor_size: Size) -> Position {
        Position::new(anchor.x, anchor.y + anchor_size.height + self.stack_gap)
    }
}

/// Title the toolkit gives the window of `note`; the shell reports it back,
/// which is what makes title matching possible.
pub fn window_title(note: &NoteId) -> String {
    format!("{} - {}", TITLE_PREFIX, note.short())
}
