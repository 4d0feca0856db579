//! Note window reconciliation core
//!
//! - `integration`: shell extension availability and access
//! - `geometry`: toolkit and shell geometry sources
//! - `registry` / `matcher`: handle claims and window identity matching
//! - `scheduler` / `sync`: delayed placement, geometry sync, debounced saves
//! - `notes` / `store`: the note model and its persistence
//! - `app`: the application root and its command loop

pub mod app;
pub mod geometry;
pub mod integration;
pub mod matcher;
pub mod notes;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod fakes;

use std::sync::{Mutex, MutexGuard};

pub use app::{run_event_loop, AppCommand, StickyNotes};
pub use integration::ShellIntegration;
pub use notes::{Note, NoteSet};
pub use scheduler::Reconciler;
pub use store::{JsonFileStore, MemoryStore, NoteStore};

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
