//! Per-note window state and the handle claim rule.
//!
//! A handle is held by at most one note at a time. Claims go through
//! `NoteSet::try_claim`, which scans and assigns under one `&mut` borrow, so
//! callers holding the note set lock cannot interleave two claims.

use thiserror::Error;
use tokio::task::JoinHandle;

use super::notes::NoteSet;
use crate::shared::types::{NoteId, WindowHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Hidden,
    /// Shown at zero opacity, waiting for the placement pass.
    Showing,
    /// Visible but no handle claimed yet.
    AwaitingHandle,
    Positioned,
}

/// GUI-side state of one note's window.
#[derive(Debug)]
pub struct NoteWindow {
    pub phase: WindowPhase,
    pub handle: Option<WindowHandle>,
    /// Bumped on every show/hide/destroy; delayed tasks carry the value they
    /// were scheduled with and do nothing once it moved on.
    pub generation: u64,
    timers: Vec<JoinHandle<()>>,
}

impl NoteWindow {
    pub fn new() -> Self {
        Self {
            phase: WindowPhase::Hidden,
            handle: None,
            generation: 0,
            timers: Vec::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.phase != WindowPhase::Hidden
    }

    /// Start a new show cycle. Returns the generation delayed work must carry.
    pub fn begin_show(&mut self) -> u64 {
        self.cancel_timers();
        self.handle = None;
        self.generation += 1;
        self.phase = WindowPhase::Showing;
        self.generation
    }

    /// Hide or destroy: the shell unregisters hidden windows, so the handle
    /// goes too.
    pub fn reset(&mut self) {
        self.cancel_timers();
        self.handle = None;
        self.generation += 1;
        self.phase = WindowPhase::Hidden;
    }

    pub fn track(&mut self, timer: JoinHandle<()>) {
        self.timers.retain(|t| !t.is_finished());
        self.timers.push(timer);
    }

    pub fn cancel_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_finished()).count()
    }
}

impl Default for NoteWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NoteWindow {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("handle {handle} already held by note {holder}")]
    Conflict { handle: WindowHandle, holder: NoteId },

    #[error("note {0} has no live window")]
    NoWindow(NoteId),
}

impl NoteSet {
    /// The note currently holding `handle`, if any.
    pub fn holder_of(&self, handle: WindowHandle) -> Option<&NoteId> {
        self.iter()
            .find(|n| n.window.as_ref().and_then(|w| w.handle) == Some(handle))
            .map(|n| &n.id)
    }

    /// Every handle currently held by some note.
    pub fn held_handles(&self) -> Vec<WindowHandle> {
        self.iter()
            .filter_map(|n| n.window.as_ref().and_then(|w| w.handle))
            .collect()
    }

    pub fn handle_of(&self, note: &NoteId) -> Option<WindowHandle> {
        self.get(note)?.window.as_ref()?.handle
    }

    pub fn is_claimed_by_other(&self, handle: WindowHandle, note: &NoteId) -> bool {
        self.holder_of(handle).is_some_and(|holder| holder != note)
    }

    /// Assign `handle` to `note` unless another note holds it.
    pub fn try_claim(&mut self, note: &NoteId, handle: WindowHandle) -> Result<(), ClaimError> {
        if let Some(holder) = self.holder_of(handle).filter(|h| *h != note) {
            return Err(ClaimError::Conflict {
                handle,
                holder: holder.clone(),
            });
        }

        let window = self
            .get_mut(note)
            .and_then(|n| n.window.as_mut())
            .filter(|w| w.is_live())
            .ok_or_else(|| ClaimError::NoWindow(note.clone()))?;

        window.handle = Some(handle);
        Ok(())
    }

    /// Live windows that have not been matched to a shell window yet.
    pub fn unassigned(&self) -> Vec<NoteId> {
        self.iter()
            .filter(|n| {
                n.window
                    .as_ref()
                    .is_some_and(|w| w.is_live() && w.handle.is_none())
            })
            .map(|n| n.id.clone())
            .collect()
    }
}
