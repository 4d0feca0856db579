//! Identity matcher
//!
//! Decides which shell window belongs to which note. Title match first
//! (`"Sticky Notes - " + id[0:8]`), then a size/position proximity score for
//! windows the shell listed without a title.

use super::integration::ShellIntegration;
use super::notes::NoteSet;
use crate::config::window_title;
use crate::shared::types::{NoteId, Position, Size, WindowHandle};
use crate::system::window::WindowInfo;

/// Both dimensions must differ by less than this.
pub const SIZE_TOLERANCE: i32 = 10;
/// Position bonus applies below this distance on both axes.
pub const POSITION_TOLERANCE: i32 = 50;
pub const SIZE_SCORE: u32 = 10;
pub const POSITION_SCORE: u32 = 5;

/// A shell window that may belong to a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub handle: WindowHandle,
    pub position: Position,
    pub size: Size,
    pub title: Option<String>,
}

impl Candidate {
    /// `None` for the shell's zero id.
    pub fn from_info(info: &WindowInfo) -> Option<Self> {
        let geometry = info.geometry();
        Some(Self {
            handle: info.handle()?,
            position: geometry.position,
            size: geometry.size,
            title: info.title.clone(),
        })
    }

    fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
    }
}

pub fn candidates(windows: &[WindowInfo]) -> Vec<Candidate> {
    windows.iter().filter_map(Candidate::from_info).collect()
}

/// Fill in what the shell's `List` reply left out.
///
/// `List` often reports untitled windows as `0x0` at the origin; those get
/// their geometry (and title, if any) from `Details`. A window whose details
/// cannot be fetched is dropped. Handles in `held` are passed through as is.
pub async fn complete_geometry(
    integration: &ShellIntegration,
    candidates: Vec<Candidate>,
    held: &[WindowHandle],
) -> Vec<Candidate> {
    let mut complete = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        if candidate.has_title() || !candidate.size.is_empty() || held.contains(&candidate.handle) {
            complete.push(candidate);
            continue;
        }

        match integration.window_details(candidate.handle).await {
            Some(details) => {
                let geometry = details.geometry();
                candidate.position = geometry.position;
                candidate.size = geometry.size;
                candidate.title = details.title;
                complete.push(candidate);
            }
            None => tracing::debug!(handle = %candidate.handle, "No details for listed window"),
        }
    }
    complete
}

/// What the note's window is expected to look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchTarget {
    /// Toolkit-reported size of the note's window.
    pub size: Option<Size>,
    /// Where the window should be; `(0,0)` counts as unknown.
    pub expected_position: Option<Position>,
}

/// Score of a title-less candidate against `target`. Size alone can win;
/// position only adds to a size match or breaks ties.
fn proximity_score(candidate: &Candidate, target: &MatchTarget) -> u32 {
    let mut score = 0;
    if let Some(size) = target.size {
        if candidate.size.within(size, SIZE_TOLERANCE) {
            score += SIZE_SCORE;
        }
    }
    if let Some(expected) = target.expected_position.filter(|p| !p.is_origin()) {
        if candidate.position.within(expected, POSITION_TOLERANCE) {
            score += POSITION_SCORE;
        }
    }
    score
}

/// Find and claim a handle for `note`.
///
/// Takes the note set by `&mut` so the conflict scan and the claim happen
/// without the set changing in between. Returns `None` when nothing
/// matched; the caller retries later.
pub fn find_handle_for_note(
    notes: &mut NoteSet,
    note: &NoteId,
    target: &MatchTarget,
    candidates: &[Candidate],
) -> Option<WindowHandle> {
    if candidates.is_empty() {
        return None;
    }

    let title = window_title(note);
    let by_title = candidates
        .iter()
        .filter(|c| c.title.as_deref() == Some(title.as_str()))
        .find(|c| !notes.is_claimed_by_other(c.handle, note))
        .map(|c| c.handle);

    if let Some(handle) = by_title {
        if notes.try_claim(note, handle).is_ok() {
            tracing::debug!(note = %note.short(), %handle, "Matched window by title");
            return Some(handle);
        }
    }

    // Ascending handle order makes equal scores resolve to the lowest handle.
    let mut untitled: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| !c.has_title())
        .filter(|c| !notes.is_claimed_by_other(c.handle, note))
        .collect();
    untitled.sort_by_key(|c| c.handle);

    let mut best: Option<(u32, WindowHandle)> = None;
    for candidate in untitled {
        let score = proximity_score(candidate, target);
        if score > 0 && best.map_or(true, |(top, _)| score > top) {
            best = Some((score, candidate.handle));
        }
    }

    let (score, handle) = best?;
    match notes.try_claim(note, handle) {
        Ok(()) => {
            tracing::debug!(note = %note.short(), %handle, score, "Matched window by size");
            Some(handle)
        }
        Err(e) => {
            tracing::debug!(note = %note.short(), error = %e, "Claim rejected");
            None
        }
    }
}
