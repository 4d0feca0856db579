//! Collaborators around note windows: the GUI toolkit, the shell's window
//! registry and its D-Bus client, and display protocol detection.

pub mod dbus;
pub mod session;
pub mod shell;
pub mod toolkit;

pub use dbus::DbusWindowRegistry;
pub use session::DisplayProtocol;
pub use shell::{ShellError, WindowDetails, WindowInfo, WindowRegistry};
pub use toolkit::WindowToolkit;
