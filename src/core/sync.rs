//! Geometry sync and debounced persistence.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::geometry::ResolvedGeometry;
use super::lock_recover;
use super::notes::NoteSet;
use super::scheduler::Reconciler;
use super::store::NoteStore;
use crate::shared::error::AppResult;
use crate::shared::types::NoteId;

impl Reconciler {
    /// Refresh a visible note's last known geometry after a move or resize.
    ///
    /// Unassigned windows get one matching pass first. When no source
    /// answers, the previous values stay.
    pub async fn sync_geometry(&self, note: &NoteId) -> Option<ResolvedGeometry> {
        let live = lock_recover(&self.notes)
            .get(note)
            .is_some_and(|n| n.is_visible());
        if !live {
            return None;
        }

        let handle = self.assign_handle(note, None).await;
        let resolved = self.resolver.resolve(note, handle).await;
        match resolved {
            Some(resolved) => self.record_geometry(note, resolved),
            None => tracing::debug!(note = %note.short(), "No geometry source answered"),
        }
        resolved
    }

    /// `sync_geometry` for every visible note.
    pub async fn sync_all(&self) {
        let visible: Vec<NoteId> = lock_recover(&self.notes)
            .iter()
            .filter(|n| n.is_visible())
            .map(|n| n.id.clone())
            .collect();
        for id in visible {
            self.sync_geometry(&id).await;
        }
    }
}

/// Serializes the note set and hands it to the store.
#[derive(Clone)]
pub struct Persister {
    notes: Arc<Mutex<NoteSet>>,
    store: Arc<dyn NoteStore>,
}

impl Persister {
    pub fn new(notes: Arc<Mutex<NoteSet>>, store: Arc<dyn NoteStore>) -> Self {
        Self { notes, store }
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    pub async fn save_now(&self) -> AppResult<()> {
        let data = lock_recover(&self.notes).dumps()?;
        self.store.save(&data).await
    }
}

/// Coalesces bursts of save requests: each request cancels the pending one
/// and restarts the quiet period.
pub struct SaveDebouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn schedule<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        if let Some(previous) = lock_recover(&self.pending).replace(task) {
            previous.abort();
        }
    }

    /// Debounced `Persister::save_now`.
    pub fn schedule_save(&self, persister: &Persister) {
        let persister = persister.clone();
        self.schedule(async move {
            if let Err(e) = persister.save_now().await {
                tracing::error!(error = %e, "Failed to save notes");
            }
        });
    }

    /// Drop the pending write, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock_recover(&self.pending).take() {
            Some(task) => {
                let was_pending = !task.is_finished();
                task.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock_recover(&self.pending)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SaveDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
