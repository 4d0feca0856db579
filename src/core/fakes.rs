//! In-memory collaborators for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::lock_recover;
use crate::shared::types::{Geometry, NoteId, Position, Size, WindowHandle};
use crate::system::window::{ShellError, WindowDetails, WindowInfo, WindowRegistry, WindowToolkit};

// ============================================================================
// Shell
// ============================================================================

#[derive(Default)]
struct ShellState {
    windows: Vec<WindowInfo>,
    failure: Option<ShellError>,
    bare_list: bool,
    moves: Vec<(u32, i32, i32)>,
}

/// Window registry backed by a list the test controls.
pub struct FakeShell {
    pid: u32,
    state: Mutex<ShellState>,
    calls: AtomicUsize,
}

impl FakeShell {
    pub fn new(pid: u32) -> Arc<Self> {
        Arc::new(Self {
            pid,
            state: Mutex::new(ShellState::default()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn add_window(&self, id: u32, pid: u32, geometry: Geometry, title: Option<&str>) {
        lock_recover(&self.state).windows.push(WindowInfo {
            id,
            pid,
            x: geometry.position.x,
            y: geometry.position.y,
            width: geometry.size.width,
            height: geometry.size.height,
            wm_class: "indicator-stickynotes".to_string(),
            title: title.map(str::to_string),
        });
    }

    /// Register a window for this fake's own pid.
    pub fn add_own_window(&self, id: u32, geometry: Geometry, title: Option<&str>) {
        self.add_window(id, self.pid, geometry, title);
    }

    pub fn remove_window(&self, id: u32) {
        lock_recover(&self.state).windows.retain(|w| w.id != id);
    }

    /// Make `List` report ids and pids only, like the extension often does.
    /// `Details` still answers with the full geometry.
    pub fn list_without_geometry(&self) {
        lock_recover(&self.state).bare_list = true;
    }

    pub fn fail_with(&self, err: ShellError) {
        lock_recover(&self.state).failure = Some(err);
    }

    pub fn clear_failure(&self) {
        lock_recover(&self.state).failure = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn moves(&self) -> Vec<(u32, i32, i32)> {
        lock_recover(&self.state).moves.clone()
    }

    fn enter(&self) -> Result<(), ShellError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &lock_recover(&self.state).failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WindowRegistry for FakeShell {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>, ShellError> {
        self.enter()?;
        let state = lock_recover(&self.state);
        if !state.bare_list {
            return Ok(state.windows.clone());
        }
        Ok(state
            .windows
            .iter()
            .map(|w| WindowInfo {
                id: w.id,
                pid: w.pid,
                x: 0,
                y: 0,
                width: 0,
                height: 0,
                wm_class: w.wm_class.clone(),
                title: None,
            })
            .collect())
    }

    async fn window_details(&self, handle: WindowHandle) -> Result<WindowDetails, ShellError> {
        self.enter()?;
        let state = lock_recover(&self.state);
        let w = state
            .windows
            .iter()
            .find(|w| w.id == handle.get())
            .ok_or(ShellError::WindowGone(handle.get()))?;
        Ok(WindowDetails {
            id: w.id,
            pid: w.pid,
            x: w.x,
            y: w.y,
            width: w.width,
            height: w.height,
            wm_class: w.wm_class.clone(),
            title: w.title.clone(),
            maximized: 0,
            focus: false,
        })
    }

    async fn move_window(&self, handle: WindowHandle, x: i32, y: i32) -> Result<(), ShellError> {
        self.enter()?;
        let mut state = lock_recover(&self.state);
        let w = state
            .windows
            .iter_mut()
            .find(|w| w.id == handle.get())
            .ok_or(ShellError::WindowGone(handle.get()))?;
        w.x = x;
        w.y = y;
        state.moves.push((handle.get(), x, y));
        Ok(())
    }
}

// ============================================================================
// Toolkit
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub title: String,
    pub position: Position,
    pub size: Size,
    pub visible: bool,
    pub opacity: f64,
    pub local_moves: usize,
}

/// Toolkit keeping windows in a map. In Wayland mode positions always read
/// `(0,0)` and local moves have no effect.
pub struct FakeToolkit {
    wayland: bool,
    windows: Mutex<HashMap<NoteId, FakeWindow>>,
}

impl FakeToolkit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            wayland: false,
            windows: Mutex::new(HashMap::new()),
        })
    }

    pub fn wayland() -> Arc<Self> {
        Arc::new(Self {
            wayland: true,
            windows: Mutex::new(HashMap::new()),
        })
    }

    pub fn window(&self, note: &NoteId) -> Option<FakeWindow> {
        lock_recover(&self.windows).get(note).cloned()
    }

    pub fn set_geometry(&self, note: &NoteId, position: Position, size: Size) {
        if let Some(w) = lock_recover(&self.windows).get_mut(note) {
            w.position = position;
            w.size = size;
        }
    }

    pub fn window_count(&self) -> usize {
        lock_recover(&self.windows).len()
    }
}

impl WindowToolkit for FakeToolkit {
    fn create_window(&self, note: &NoteId, title: &str, size: Size) {
        lock_recover(&self.windows).insert(
            note.clone(),
            FakeWindow {
                title: title.to_string(),
                position: Position::default(),
                size,
                visible: false,
                opacity: 1.0,
                local_moves: 0,
            },
        );
    }

    fn show_window(&self, note: &NoteId) {
        if let Some(w) = lock_recover(&self.windows).get_mut(note) {
            w.visible = true;
        }
    }

    fn hide_window(&self, note: &NoteId) {
        if let Some(w) = lock_recover(&self.windows).get_mut(note) {
            w.visible = false;
        }
    }

    fn destroy_window(&self, note: &NoteId) {
        lock_recover(&self.windows).remove(note);
    }

    fn move_window(&self, note: &NoteId, position: Position) {
        if let Some(w) = lock_recover(&self.windows).get_mut(note) {
            w.local_moves += 1;
            if !self.wayland {
                w.position = position;
            }
        }
    }

    fn resize_window(&self, note: &NoteId, size: Size) {
        if let Some(w) = lock_recover(&self.windows).get_mut(note) {
            w.size = size;
        }
    }

    fn position(&self, note: &NoteId) -> Option<Position> {
        let windows = lock_recover(&self.windows);
        let w = windows.get(note)?;
        Some(if self.wayland {
            Position::default()
        } else {
            w.position
        })
    }

    fn size(&self, note: &NoteId) -> Option<Size> {
        lock_recover(&self.windows).get(note).map(|w| w.size)
    }

    fn set_opacity(&self, note: &NoteId, opacity: f64) {
        if let Some(w) = lock_recover(&self.windows).get_mut(note) {
            w.opacity = opacity;
        }
    }

    fn has_window(&self, note: &NoteId) -> bool {
        lock_recover(&self.windows).contains_key(note)
    }
}
