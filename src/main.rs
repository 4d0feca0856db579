use clap::{Parser, Subcommand};
use std::process::ExitCode;

use stickynotes_lib::core::notes::NoteSet;
use stickynotes_lib::core::{JsonFileStore, NoteStore, ShellIntegration};
use stickynotes_lib::logging;
use stickynotes_lib::shared::settings::AppSettings;
use stickynotes_lib::shared::AppResult;
use stickynotes_lib::system::window::DisplayProtocol;

#[derive(Parser, Debug)]
#[command(
    name = "indicator-stickynotes",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sticky notes window reconciliation diagnostics"
)]
struct Cli {
    /// Use the development data file (~/.stickynotes) and debug logging.
    #[arg(short = 'd', long = "dev")]
    dev: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Report the display protocol and whether the shell extension answers.
    #[default]
    Status,
    /// List the windows the shell extension reports.
    Windows,
    /// Summarize the stored notes.
    Notes,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.dev);

    let settings = match AppSettings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings, using defaults");
            AppSettings::default()
        }
    };

    let result = match cli.command.unwrap_or_default() {
        Command::Status => status().await,
        Command::Windows => windows().await,
        Command::Notes => notes(&settings, cli.dev).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn status() -> AppResult<()> {
    let protocol = DisplayProtocol::detect();
    let integration = ShellIntegration::detect(protocol).await;

    println!("display protocol: {:?}", protocol);
    println!(
        "window-calls extension: {}",
        if integration.is_available() {
            "available"
        } else if protocol.is_restricted() {
            "unavailable (saved positions will not be restored)"
        } else {
            "not needed"
        }
    );
    Ok(())
}

async fn windows() -> AppResult<()> {
    let integration = ShellIntegration::detect(DisplayProtocol::Wayland).await;
    let windows = integration.all_windows().await?;

    println!("{:>12} {:>8} {:>6} {:>6} {:>6} {:>6}  title", "id", "pid", "x", "y", "w", "h");
    for w in windows {
        println!(
            "{:>12} {:>8} {:>6} {:>6} {:>6} {:>6}  {}",
            w.id,
            w.pid,
            w.x,
            w.y,
            w.width,
            w.height,
            w.title.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn notes(settings: &AppSettings, dev: bool) -> AppResult<()> {
    let store = JsonFileStore::new(settings.data_file_path(dev)?);
    println!("data file: {}", store.path().display());

    let Some(raw) = store.load().await? else {
        println!("no notes saved yet");
        return Ok(());
    };
    let set = NoteSet::loads(&raw)?;

    println!("notes: {} (all visible: {})", set.len(), set.all_visible());
    for note in set.iter() {
        let position = note
            .position
            .map(|p| format!("{},{}", p.x, p.y))
            .unwrap_or_else(|| "-".to_string());
        let first_line = note.body.lines().next().unwrap_or("");
        println!(
            "  {}  {:>10}  {}{}",
            note.id.short(),
            position,
            first_line.chars().take(40).collect::<String>(),
            if note.locked { "  [locked]" } else { "" }
        );
    }
    Ok(())
}
