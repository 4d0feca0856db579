//! Application root
//!
//! Owns the note set and wires the reconciler, the store and the save
//! debouncer together. The toolkit and tray glue feed it `AppCommand`s over
//! a channel; `run_event_loop` handles them one at a time.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::integration::ShellIntegration;
use super::lock_recover;
use super::notes::{Note, NoteDocument, NoteSet};
use super::scheduler::Reconciler;
use super::store::NoteStore;
use super::sync::{Persister, SaveDebouncer};
use crate::config::NoteWindowConfig;
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::ReconcileTiming;
use crate::shared::types::NoteId;
use crate::system::window::WindowToolkit;

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// New note, stacked below `anchor` when given.
    NewNote { anchor: Option<NoteId> },
    ShowAll,
    HideAll,
    LockAll,
    UnlockAll,
    SetLocked { note: NoteId, locked: bool },
    SetCategory { note: NoteId, category: String },
    Delete(NoteId),
    /// The toolkit reported a move or resize.
    Configure(NoteId),
    /// Focus left the note; carries the current text.
    FocusLost { note: NoteId, body: String },
    /// The window manager asked to close the window.
    CloseRequested(NoteId),
    Import(PathBuf),
    Export(PathBuf),
    Quit,
}

pub struct StickyNotes {
    notes: Arc<Mutex<NoteSet>>,
    reconciler: Reconciler,
    persister: Persister,
    debouncer: SaveDebouncer,
    batch_assign: Option<JoinHandle<()>>,
}

impl StickyNotes {
    /// Load the note set from `store`. A document that cannot be parsed is
    /// set aside and replaced by a fresh set with one note.
    pub async fn open(
        store: Arc<dyn NoteStore>,
        integration: Arc<ShellIntegration>,
        toolkit: Arc<dyn WindowToolkit>,
        window_config: NoteWindowConfig,
        timing: ReconcileTiming,
    ) -> AppResult<Self> {
        let set = match store.load().await? {
            Some(raw) => match NoteSet::loads(&raw) {
                Ok(set) => {
                    tracing::info!(notes = set.len(), "Notes loaded");
                    set
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Notes file unreadable, starting fresh");
                    store.set_aside().await?;
                    Self::fresh()
                }
            },
            None => {
                tracing::info!("No notes file yet, starting fresh");
                Self::fresh()
            }
        };

        let debounce = timing.save_debounce();
        let notes = Arc::new(Mutex::new(set));
        let reconciler = Reconciler::new(notes.clone(), integration, toolkit, window_config, timing);
        let persister = Persister::new(notes.clone(), store);

        Ok(Self {
            notes,
            reconciler,
            persister,
            debouncer: SaveDebouncer::new(debounce),
            batch_assign: None,
        })
    }

    fn fresh() -> NoteSet {
        let mut set = NoteSet::new();
        set.create();
        set.set_all_visible(true);
        set
    }

    pub fn notes(&self) -> &Arc<Mutex<NoteSet>> {
        &self.notes
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Show the notes again if they were visible when the app last saved.
    pub fn restore(&mut self) {
        if lock_recover(&self.notes).all_visible() {
            self.show_all();
        }
    }

    pub fn new_note(&mut self, anchor: Option<&NoteId>) -> NoteId {
        let id = {
            let mut notes = lock_recover(&self.notes);
            let mut note = Note::new(notes.default_category().unwrap_or_default());

            if let Some(anchor) = anchor.and_then(|a| notes.get(a)) {
                note.category = anchor.category.clone();
                let config = self.reconciler.window_config();
                let position = anchor.position.unwrap_or(config.default_position);
                let size = anchor.size.unwrap_or(config.default_size);
                note.position = Some(config.stacked_below(position, size));
            }
            notes.insert(note)
        };

        self.reconciler.show(&id);
        self.debouncer.schedule_save(&self.persister);
        tracing::info!(note = %id.short(), "Note created");
        id
    }

    pub fn show_all(&mut self) {
        let ids = {
            let mut notes = lock_recover(&self.notes);
            notes.set_all_visible(true);
            notes.ids()
        };
        for id in &ids {
            self.reconciler.show(id);
        }

        if let Some(previous) = self.batch_assign.take() {
            previous.abort();
        }
        if self.reconciler.integration().is_available() {
            self.batch_assign = Some(self.reconciler.schedule_assign_all());
        }
    }

    pub async fn hide_all(&mut self) -> AppResult<()> {
        if let Some(pending) = self.batch_assign.take() {
            pending.abort();
        }
        self.reconciler.sync_all().await;

        let ids = {
            let mut notes = lock_recover(&self.notes);
            notes.set_all_visible(false);
            notes.ids()
        };
        for id in &ids {
            self.reconciler.hide(id);
        }
        self.save_now().await
    }

    pub async fn set_locked(&mut self, note: Option<&NoteId>, locked: bool) -> AppResult<()> {
        {
            let mut notes = lock_recover(&self.notes);
            match note {
                Some(id) => {
                    let entry = notes
                        .get_mut(id)
                        .ok_or_else(|| AppError::NoteNotFound(id.to_string()))?;
                    entry.locked = locked;
                }
                None => notes.iter_mut().for_each(|n| n.locked = locked),
            }
        }
        self.save_now().await
    }

    pub async fn set_category(&mut self, note: &NoteId, category: String) -> AppResult<()> {
        {
            let mut notes = lock_recover(&self.notes);
            let entry = notes
                .get_mut(note)
                .ok_or_else(|| AppError::NoteNotFound(note.to_string()))?;
            entry.category = category;
        }
        self.save_now().await
    }

    pub async fn delete(&mut self, note: &NoteId) -> AppResult<()> {
        self.reconciler.destroy(note);
        if lock_recover(&self.notes).remove(note).is_none() {
            return Err(AppError::NoteNotFound(note.to_string()));
        }
        tracing::info!(note = %note.short(), "Note deleted");
        self.save_now().await
    }

    pub async fn configure(&mut self, note: &NoteId) {
        self.reconciler.sync_geometry(note).await;
        self.debouncer.schedule_save(&self.persister);
    }

    pub async fn focus_lost(&mut self, note: &NoteId, body: String) -> AppResult<()> {
        {
            let mut notes = lock_recover(&self.notes);
            let entry = notes
                .get_mut(note)
                .ok_or_else(|| AppError::NoteNotFound(note.to_string()))?;
            if entry.body != body {
                entry.update_body(body);
            }
        }
        self.reconciler.sync_geometry(note).await;
        self.save_now().await
    }

    pub async fn close_requested(&mut self, note: &NoteId) {
        self.reconciler.sync_geometry(note).await;
        self.reconciler.hide(note);
        self.debouncer.schedule_save(&self.persister);
    }

    /// Merge notes from `path`, then show everything again.
    pub async fn import(&mut self, path: PathBuf) -> AppResult<()> {
        let raw = tokio::fs::read_to_string(&path).await?;
        let doc: NoteDocument = serde_json::from_str(&raw)?;

        self.hide_all().await?;
        let added = lock_recover(&self.notes).merge_document(doc);
        tracing::info!(added, path = %path.display(), "Notes imported");
        self.show_all();
        self.save_now().await
    }

    pub async fn export(&mut self, path: PathBuf) -> AppResult<()> {
        self.save_now().await?;
        self.persister.store().export_to(&path).await?;
        tracing::info!(path = %path.display(), "Notes exported");
        Ok(())
    }

    /// Cancel pending work and write the final state.
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.debouncer.cancel();
        if let Some(pending) = self.batch_assign.take() {
            pending.abort();
        }
        self.reconciler.sync_all().await;
        self.save_now().await
    }

    async fn save_now(&self) -> AppResult<()> {
        self.debouncer.cancel();
        self.persister.save_now().await
    }

    /// Apply one command. Returns `false` once the app should stop.
    pub async fn handle(&mut self, command: AppCommand) -> AppResult<bool> {
        match command {
            AppCommand::NewNote { anchor } => {
                self.new_note(anchor.as_ref());
            }
            AppCommand::ShowAll => self.show_all(),
            AppCommand::HideAll => self.hide_all().await?,
            AppCommand::LockAll => self.set_locked(None, true).await?,
            AppCommand::UnlockAll => self.set_locked(None, false).await?,
            AppCommand::SetLocked { note, locked } => self.set_locked(Some(&note), locked).await?,
            AppCommand::SetCategory { note, category } => self.set_category(&note, category).await?,
            AppCommand::Delete(note) => self.delete(&note).await?,
            AppCommand::Configure(note) => self.configure(&note).await,
            AppCommand::FocusLost { note, body } => self.focus_lost(&note, body).await?,
            AppCommand::CloseRequested(note) => self.close_requested(&note).await,
            AppCommand::Import(path) => self.import(path).await?,
            AppCommand::Export(path) => self.export(path).await?,
            AppCommand::Quit => {
                self.shutdown().await?;
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Handle commands until `Quit` or until every sender is gone.
pub async fn run_event_loop(
    mut app: StickyNotes,
    mut commands: mpsc::Receiver<AppCommand>,
) -> AppResult<()> {
    while let Some(command) = commands.recv().await {
        tracing::debug!(?command, "Handling command");
        match app.handle(command).await {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => tracing::error!(error = %e, "Command failed"),
        }
    }

    tracing::info!("Command channel closed, shutting down");
    app.shutdown().await
}
