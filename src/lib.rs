// Module declarations
pub mod config;
pub mod core;
pub mod logging;
pub mod shared;
pub mod system;

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::NoteWindowConfig;
use crate::core::{run_event_loop, AppCommand, JsonFileStore, MemoryStore, NoteStore, ShellIntegration, StickyNotes};
use crate::shared::settings::AppSettings;
use crate::shared::AppResult;
use crate::system::window::{DisplayProtocol, WindowToolkit};

/// Run the applet on top of a GUI toolkit until `Quit` arrives or the
/// command channel closes.
pub async fn run(
    toolkit: Arc<dyn WindowToolkit>,
    commands: mpsc::Receiver<AppCommand>,
    settings: AppSettings,
    dev: bool,
) -> AppResult<()> {
    let protocol = DisplayProtocol::detect();
    tracing::info!(?protocol, "Display protocol detected");
    let integration = Arc::new(ShellIntegration::detect(protocol).await);

    let store: Arc<dyn NoteStore> = match settings.data_file_path(dev) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Using notes file");
            Arc::new(JsonFileStore::new(path))
        }
        Err(e) => {
            tracing::warn!(error = %e, "No notes file location, keeping notes in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let mut app = StickyNotes::open(
        store,
        integration,
        toolkit,
        NoteWindowConfig::default(),
        settings.timing,
    )
    .await?;
    app.restore();

    run_event_loop(app, commands).await
}
