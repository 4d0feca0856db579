//! Reconciliation scheduler
//!
//! A note window is shown invisible, matched to a shell window after a short
//! delay, moved to its saved position, then made visible. Further delayed
//! attempts pick up windows the shell registered late. Every delayed task
//! carries the window generation it was scheduled for and does nothing once
//! the window was hidden, re-shown or destroyed.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::geometry::{GeometryResolver, ResolvedGeometry};
use super::integration::ShellIntegration;
use super::lock_recover;
use super::matcher::{self, MatchTarget};
use super::notes::NoteSet;
use super::registry::{NoteWindow, WindowPhase};
use crate::config::{window_title, NoteWindowConfig};
use crate::shared::settings::ReconcileTiming;
use crate::shared::types::{GeometryOrigin, NoteId, Position, WindowHandle};
use crate::system::window::WindowToolkit;

#[derive(Clone)]
pub struct Reconciler {
    pub(super) notes: Arc<Mutex<NoteSet>>,
    pub(super) integration: Arc<ShellIntegration>,
    pub(super) toolkit: Arc<dyn WindowToolkit>,
    pub(super) resolver: Arc<GeometryResolver>,
    window_config: NoteWindowConfig,
    timing: Arc<ReconcileTiming>,
}

impl Reconciler {
    pub fn new(
        notes: Arc<Mutex<NoteSet>>,
        integration: Arc<ShellIntegration>,
        toolkit: Arc<dyn WindowToolkit>,
        window_config: NoteWindowConfig,
        timing: ReconcileTiming,
    ) -> Self {
        let resolver = Arc::new(GeometryResolver::new(integration.clone(), toolkit.clone()));
        Self {
            notes,
            integration,
            toolkit,
            resolver,
            window_config,
            timing: Arc::new(timing),
        }
    }

    pub fn integration(&self) -> &ShellIntegration {
        &self.integration
    }

    pub fn window_config(&self) -> &NoteWindowConfig {
        &self.window_config
    }

    /// Show a note's window and schedule its placement. Returns `false` for
    /// an unknown note.
    pub fn show(&self, note: &NoteId) -> bool {
        let mut notes = lock_recover(&self.notes);
        let Some(entry) = notes.get_mut(note) else {
            return false;
        };

        // Already up: raise it and keep the claimed handle.
        if let Some(window) = entry.window.as_mut().filter(|w| w.is_live()) {
            self.toolkit.show_window(note);
            if window.handle.is_none() && self.integration.is_available() {
                let generation = window.generation;
                let delay = self.timing.handle_retry_delays().next();
                if let Some(delay) = delay {
                    let this = self.clone();
                    let id = note.clone();
                    window.track(self.after(delay, async move {
                        this.retry_assign(&id, generation).await;
                    }));
                }
            }
            return true;
        }

        let target = *entry
            .position
            .get_or_insert(self.window_config.default_position);
        let size = entry
            .size
            .filter(|s| s.is_realized())
            .unwrap_or(self.window_config.default_size);

        if !self.toolkit.has_window(note) {
            self.toolkit.create_window(note, &window_title(note), size);
        }
        self.toolkit.set_opacity(note, 0.0);
        self.toolkit.show_window(note);

        let window = entry.window.get_or_insert_with(NoteWindow::new);
        let generation = window.begin_show();

        let this = self.clone();
        let id = note.clone();
        window.track(self.after(self.timing.show_match_delay(), async move {
            this.place(&id, generation, target).await;
        }));

        for delay in self.timing.handle_retry_delays() {
            let this = self.clone();
            let id = note.clone();
            window.track(self.after(delay, async move {
                this.retry_assign(&id, generation).await;
            }));
        }

        tracing::debug!(note = %note.short(), generation, x = target.x, y = target.y, "Showing note");
        true
    }

    pub fn hide(&self, note: &NoteId) {
        let mut notes = lock_recover(&self.notes);
        if let Some(window) = notes.get_mut(note).and_then(|n| n.window.as_mut()) {
            window.reset();
        }
        self.toolkit.hide_window(note);
    }

    pub fn destroy(&self, note: &NoteId) {
        let mut notes = lock_recover(&self.notes);
        if let Some(entry) = notes.get_mut(note) {
            // dropping the window aborts its timers
            entry.window = None;
        }
        self.toolkit.destroy_window(note);
    }

    fn after<F>(&self, delay: Duration, work: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        })
    }

    /// Whether `note`'s window is still in the show cycle `generation`.
    fn is_current(&self, note: &NoteId, generation: u64) -> bool {
        let notes = lock_recover(&self.notes);
        notes
            .get(note)
            .and_then(|n| n.window.as_ref())
            .is_some_and(|w| w.is_live() && w.generation == generation)
    }

    /// One matching pass for `note` against the shell's current windows.
    ///
    /// With `generation` set, the pass is abandoned if the window moved on
    /// while the list was being fetched.
    pub async fn assign_handle(&self, note: &NoteId, generation: Option<u64>) -> Option<WindowHandle> {
        let existing = lock_recover(&self.notes).handle_of(note);
        if existing.is_some() {
            return existing;
        }
        if !self.integration.is_available() {
            return None;
        }

        let windows = self.integration.process_windows().await;
        let held = lock_recover(&self.notes).held_handles();
        let candidates =
            matcher::complete_geometry(&self.integration, matcher::candidates(&windows), &held)
                .await;

        let mut notes = lock_recover(&self.notes);
        let window = notes.get(note).and_then(|n| n.window.as_ref())?;
        if !window.is_live() || generation.is_some_and(|g| g != window.generation) {
            return None;
        }
        if window.handle.is_some() {
            return window.handle;
        }

        let target = MatchTarget {
            size: self.toolkit.size(note),
            expected_position: notes.get(note).and_then(|n| n.position),
        };
        let handle = matcher::find_handle_for_note(&mut notes, note, &target, &candidates);
        match handle {
            Some(h) => tracing::info!(note = %note.short(), handle = %h, "Window handle claimed"),
            None => tracing::debug!(
                note = %note.short(),
                candidates = candidates.len(),
                "No window matched yet"
            ),
        }
        handle
    }

    async fn place(&self, note: &NoteId, generation: u64, target: Position) {
        if !self.is_current(note, generation) {
            return;
        }

        let handle = self.assign_handle(note, Some(generation)).await;
        let moved_by_shell = match handle {
            Some(h) => self.integration.move_window(h, target).await.is_ok(),
            None => false,
        };

        if !self.is_current(note, generation) {
            return;
        }
        if !moved_by_shell {
            self.toolkit.move_window(note, target);
        }
        self.toolkit.set_opacity(note, 1.0);

        if moved_by_shell {
            if let Some(resolved) = self.resolver.resolve(note, handle).await {
                self.record_geometry(note, resolved);
            }
        }

        let mut notes = lock_recover(&self.notes);
        if let Some(window) = notes.get_mut(note).and_then(|n| n.window.as_mut()) {
            if window.generation == generation {
                window.phase = if window.handle.is_some() {
                    WindowPhase::Positioned
                } else {
                    WindowPhase::AwaitingHandle
                };
            }
        }
    }

    async fn retry_assign(&self, note: &NoteId, generation: u64) {
        if !self.is_current(note, generation) {
            return;
        }
        if self.assign_handle(note, Some(generation)).await.is_none() {
            return;
        }

        let mut notes = lock_recover(&self.notes);
        if let Some(window) = notes.get_mut(note).and_then(|n| n.window.as_mut()) {
            if window.generation == generation && window.phase == WindowPhase::AwaitingHandle {
                window.phase = WindowPhase::Positioned;
            }
        }
    }

    /// Match every live, unassigned window against one snapshot of the
    /// shell's list. Returns how many handles were claimed.
    pub async fn assign_all(&self) -> usize {
        if !self.integration.is_available() {
            return 0;
        }
        if lock_recover(&self.notes).unassigned().is_empty() {
            return 0;
        }

        let windows = self.integration.process_windows().await;
        let held = lock_recover(&self.notes).held_handles();
        let candidates =
            matcher::complete_geometry(&self.integration, matcher::candidates(&windows), &held)
                .await;

        let mut notes = lock_recover(&self.notes);
        let mut claimed = 0;
        for id in notes.unassigned() {
            let target = MatchTarget {
                size: self.toolkit.size(&id),
                expected_position: notes.get(&id).and_then(|n| n.position),
            };
            if matcher::find_handle_for_note(&mut notes, &id, &target, &candidates).is_some() {
                claimed += 1;
                if let Some(window) = notes.get_mut(&id).and_then(|n| n.window.as_mut()) {
                    if window.phase == WindowPhase::AwaitingHandle {
                        window.phase = WindowPhase::Positioned;
                    }
                }
            }
        }
        tracing::info!(claimed, "Batch window assignment finished");
        claimed
    }

    /// Run `assign_all` once the startup delay has passed.
    pub fn schedule_assign_all(&self) -> JoinHandle<()> {
        let this = self.clone();
        self.after(self.timing.startup_assign_delay(), async move {
            this.assign_all().await;
        })
    }

    /// Store a resolved geometry as the note's last known one. Toolkit
    /// reports of `(0,0)` or an unrealized size are not trusted.
    pub fn record_geometry(&self, note: &NoteId, resolved: ResolvedGeometry) {
        let mut notes = lock_recover(&self.notes);
        let Some(entry) = notes.get_mut(note) else {
            return;
        };

        let ResolvedGeometry { geometry, origin } = resolved;
        match origin {
            GeometryOrigin::Shell => {
                entry.position = Some(geometry.position);
                entry.size = Some(geometry.size);
            }
            GeometryOrigin::Toolkit => {
                if !geometry.position.is_origin() {
                    entry.position = Some(geometry.position);
                }
                if geometry.size.is_realized() {
                    entry.size = Some(geometry.size);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fakes::{FakeShell, FakeToolkit};
    use crate::core::notes::Note;
    use crate::shared::types::{Geometry, Size};
    use crate::system::window::ShellError;

    const PID: u32 = 4242;

    struct Harness {
        notes: Arc<Mutex<NoteSet>>,
        shell: Arc<FakeShell>,
        toolkit: Arc<FakeToolkit>,
        reconciler: Reconciler,
    }

    fn harness(available: bool) -> Harness {
        let shell = FakeShell::new(PID);
        let integration = if available {
            ShellIntegration::with_registry(shell.clone(), PID)
        } else {
            ShellIntegration::disabled()
        };
        let toolkit = FakeToolkit::wayland();
        let notes = Arc::new(Mutex::new(NoteSet::new()));
        let reconciler = Reconciler::new(
            notes.clone(),
            Arc::new(integration),
            toolkit.clone(),
            NoteWindowConfig::default(),
            ReconcileTiming::default(),
        );
        Harness {
            notes,
            shell,
            toolkit,
            reconciler,
        }
    }

    impl Harness {
        fn add_note(&self, uuid: &str, position: Option<Position>) -> NoteId {
            let mut note = Note::new("");
            note.id = NoteId::from(uuid);
            note.position = position;
            lock_recover(&self.notes).insert(note)
        }

        fn handle(&self, note: &NoteId) -> Option<u32> {
            lock_recover(&self.notes).handle_of(note).map(WindowHandle::get)
        }

        fn phase(&self, note: &NoteId) -> Option<WindowPhase> {
            lock_recover(&self.notes)
                .get(note)
                .and_then(|n| n.window.as_ref())
                .map(|w| w.phase)
        }
    }

    async fn advance_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    const A: &str = "aaaaaaaa-1111-4111-8111-111111111111";
    const B: &str = "bbbbbbbb-2222-4222-8222-222222222222";

    #[tokio::test(start_paused = true)]
    async fn test_show_places_via_shell_then_reveals() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.shell.add_own_window(101, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));

        assert!(h.reconciler.show(&a));
        let fresh = h.toolkit.window(&a).unwrap();
        assert_eq!(fresh.opacity, 0.0);
        assert!(fresh.visible);
        assert_eq!(h.handle(&a), None);

        advance_ms(350).await;
        assert_eq!(h.handle(&a), Some(101));
        assert_eq!(h.shell.moves(), vec![(101, 10, 10)]);
        assert_eq!(h.toolkit.window(&a).unwrap().opacity, 1.0);
        assert_eq!(h.phase(&a), Some(WindowPhase::Positioned));

        let position = lock_recover(&h.notes).get(&a).unwrap().position;
        assert_eq!(position, Some(Position::new(10, 10)));

        h.reconciler.hide(&a);
        assert_eq!(h.handle(&a), None);
        assert_eq!(h.phase(&a), Some(WindowPhase::Hidden));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bare_list_entries_are_matched_on_details_geometry() {
        let h = harness(true);
        let a = h.add_note(A, Some(Position::new(500, 300)));
        h.shell.add_own_window(55, Geometry::new(40, 60, 200, 150), None);
        h.shell.list_without_geometry();

        h.reconciler.show(&a);
        advance_ms(350).await;

        assert_eq!(h.handle(&a), Some(55));
        assert_eq!(h.shell.moves(), vec![(55, 500, 300)]);
        assert_eq!(h.toolkit.window(&a).unwrap().local_moves, 0);
        assert_eq!(h.phase(&a), Some(WindowPhase::Positioned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bare_list_entry_with_other_size_is_not_claimed() {
        let h = harness(true);
        let a = h.add_note(A, Some(Position::new(500, 300)));
        h.shell.add_own_window(56, Geometry::new(900, 700, 640, 480), None);
        h.shell.list_without_geometry();

        h.reconciler.show(&a);
        advance_ms(2000).await;

        assert_eq!(h.handle(&a), None);
        assert!(h.shell.moves().is_empty());
        assert_eq!(h.toolkit.window(&a).unwrap().opacity, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_on_visible_note_keeps_handle() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.shell.add_own_window(101, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));
        h.reconciler.show(&a);
        advance_ms(350).await;
        assert_eq!(h.handle(&a), Some(101));

        assert!(h.reconciler.show(&a));
        assert_eq!(h.handle(&a), Some(101));
        assert_eq!(h.toolkit.window(&a).unwrap().opacity, 1.0);
        assert_eq!(h.phase(&a), Some(WindowPhase::Positioned));

        advance_ms(2000).await;
        assert_eq!(h.handle(&a), Some(101));
        assert_eq!(h.shell.moves().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_on_visible_unassigned_note_retries_matching() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.reconciler.show(&a);
        advance_ms(2000).await;
        assert_eq!(h.handle(&a), None);

        h.shell.add_own_window(102, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));
        h.reconciler.show(&a);
        advance_ms(600).await;

        assert_eq!(h.handle(&a), Some(102));
        assert_eq!(h.phase(&a), Some(WindowPhase::Positioned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_handle_falls_back_to_local_move_and_still_reveals() {
        let h = harness(true);
        let a = h.add_note(A, Some(Position::new(500, 300)));

        h.reconciler.show(&a);
        advance_ms(350).await;

        let window = h.toolkit.window(&a).unwrap();
        assert_eq!(window.opacity, 1.0);
        assert_eq!(window.local_moves, 1);
        assert_eq!(h.phase(&a), Some(WindowPhase::AwaitingHandle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_integration_reveals_without_bus_calls() {
        let h = harness(false);
        let a = h.add_note(A, None);
        h.shell.add_own_window(101, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));

        h.reconciler.show(&a);
        advance_ms(2000).await;

        assert_eq!(h.toolkit.window(&a).unwrap().opacity, 1.0);
        assert_eq!(h.handle(&a), None);
        assert_eq!(h.shell.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_registration_picked_up_by_retry() {
        let h = harness(true);
        let a = h.add_note(A, None);

        h.reconciler.show(&a);
        advance_ms(350).await;
        assert_eq!(h.handle(&a), None);

        h.shell.add_own_window(102, Geometry::new(10, 10, 200, 150), None);
        advance_ms(200).await;
        assert_eq!(h.handle(&a), Some(102));
        assert_eq!(h.phase(&a), Some(WindowPhase::Positioned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_cancels_pending_placement() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.shell.add_own_window(101, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));

        h.reconciler.show(&a);
        advance_ms(100).await;
        h.reconciler.hide(&a);
        let pending = lock_recover(&h.notes)
            .get(&a)
            .and_then(|n| n.window.as_ref())
            .map(NoteWindow::pending_timers);
        assert_eq!(pending, Some(0));
        advance_ms(2000).await;

        assert_eq!(h.handle(&a), None);
        assert_eq!(h.shell.calls(), 0);
        assert!(h.shell.moves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_window_timers_are_noops() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.reconciler.show(&a);
        h.reconciler.destroy(&a);
        advance_ms(2000).await;

        assert!(!h.toolkit.has_window(&a));
        assert_eq!(h.shell.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_shows_get_their_own_handles() {
        let h = harness(true);
        let a = h.add_note(A, Some(Position::new(100, 100)));
        let b = h.add_note(B, Some(Position::new(400, 100)));

        h.reconciler.show(&a);
        advance_ms(100).await;
        h.reconciler.show(&b);

        // both windows registered before either placement runs; listed in
        // the order that would swap them if titles were ignored
        h.shell.add_own_window(201, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - bbbbbbbb"));
        h.shell.add_own_window(202, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));

        advance_ms(2000).await;
        assert_eq!(h.handle(&a), Some(202));
        assert_eq!(h.handle(&b), Some(201));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reshow_requires_fresh_handle() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.shell.add_own_window(101, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));

        h.reconciler.show(&a);
        advance_ms(350).await;
        h.reconciler.hide(&a);
        h.shell.remove_window(101);

        h.reconciler.show(&a);
        assert_eq!(h.handle(&a), None);
        h.shell.add_own_window(150, Geometry::new(0, 0, 200, 150), Some("Sticky Notes - aaaaaaaa"));
        advance_ms(350).await;
        assert_eq!(h.handle(&a), Some(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_assign_all_claims_each_once() {
        let h = harness(true);
        let a = h.add_note(A, Some(Position::new(100, 100)));
        let b = h.add_note(B, Some(Position::new(600, 100)));
        h.reconciler.show(&a);
        h.reconciler.show(&b);
        // Placement already ran; nothing listed yet
        advance_ms(1600).await;

        h.shell.add_own_window(301, Geometry::new(600, 100, 200, 150), None);
        h.shell.add_own_window(302, Geometry::new(100, 100, 200, 150), None);

        assert_eq!(h.reconciler.assign_all().await, 2);
        assert_eq!(h.handle(&a), Some(302));
        assert_eq!(h.handle(&b), Some(301));
        assert_eq!(h.reconciler.assign_all().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_loss_mid_session_stops_bus_calls() {
        let h = harness(true);
        let a = h.add_note(A, None);
        h.shell.fail_with(ShellError::ServiceUnavailable("ServiceUnknown".to_string()));

        h.reconciler.show(&a);
        advance_ms(2000).await;
        let calls = h.shell.calls();

        assert!(!h.reconciler.integration().is_available());
        assert_eq!(calls, 1);
        assert_eq!(h.toolkit.window(&a).unwrap().opacity, 1.0);
    }

    #[test]
    fn test_toolkit_zero_position_is_not_recorded() {
        let h = harness(false);
        let a = h.add_note(A, Some(Position::new(50, 60)));

        h.reconciler.record_geometry(
            &a,
            ResolvedGeometry {
                geometry: Geometry::new(0, 0, 1, 1),
                origin: GeometryOrigin::Toolkit,
            },
        );
        let notes = lock_recover(&h.notes);
        let note = notes.get(&a).unwrap();
        assert_eq!(note.position, Some(Position::new(50, 60)));
        assert_eq!(note.size, None);
        drop(notes);

        h.reconciler.record_geometry(
            &a,
            ResolvedGeometry {
                geometry: Geometry::new(0, 0, 220, 180),
                origin: GeometryOrigin::Toolkit,
            },
        );
        assert_eq!(
            lock_recover(&h.notes).get(&a).unwrap().size,
            Some(Size::new(220, 180))
        );
    }
}
