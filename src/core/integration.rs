//! Shell integration context
//!
//! Created once at startup and shared by every component that talks to the
//! shell extension. Availability only ever goes from `true` to `false`: once
//! the service is found missing, no further bus calls are made.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::shared::types::{Position, WindowHandle};
use crate::system::window::{
    DbusWindowRegistry, DisplayProtocol, ShellError, WindowDetails, WindowInfo, WindowRegistry,
};

pub struct ShellIntegration {
    registry: Option<Arc<dyn WindowRegistry>>,
    available: AtomicBool,
    pid: u32,
}

impl ShellIntegration {
    /// Connect to the extension when running under a restricted protocol.
    pub async fn detect(protocol: DisplayProtocol) -> Self {
        if !protocol.is_restricted() {
            tracing::info!("Not running under Wayland, using toolkit window positions");
            return Self::disabled();
        }

        let registry = match DbusWindowRegistry::connect().await {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(error = %e, "Window-calls extension unreachable");
                return Self::disabled();
            }
        };

        match registry.probe().await {
            Ok(()) => {
                tracing::info!("Window-calls extension is available and enabled");
                Self::with_registry(Arc::new(registry), std::process::id())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Window-calls extension check failed");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            registry: None,
            available: AtomicBool::new(false),
            pid: std::process::id(),
        }
    }

    /// Integration over an already-verified registry; `pid` selects which
    /// windows count as ours.
    pub fn with_registry(registry: Arc<dyn WindowRegistry>, pid: u32) -> Self {
        Self {
            registry: Some(registry),
            available: AtomicBool::new(true),
            pid,
        }
    }

    pub fn is_available(&self) -> bool {
        self.registry.is_some() && self.available.load(Ordering::SeqCst)
    }

    pub fn mark_unavailable(&self) {
        if self.available.swap(false, Ordering::SeqCst) {
            tracing::warn!("Window-calls service or method not found, disabling integration");
        }
    }

    fn registry(&self) -> Option<&Arc<dyn WindowRegistry>> {
        if self.is_available() {
            self.registry.as_ref()
        } else {
            None
        }
    }

    /// Apply the error policy: a missing service disables the integration,
    /// anything else is "no data this time".
    fn absorb(&self, err: &ShellError) {
        match err {
            ShellError::ServiceUnavailable(_) => self.mark_unavailable(),
            ShellError::WindowGone(handle) => {
                tracing::debug!(handle, "Shell has no data for window");
            }
            other => tracing::warn!(error = %other, "Window registry call failed"),
        }
    }

    /// Every window the shell reports for this process. Empty when the
    /// integration is unavailable or the call failed.
    pub async fn process_windows(&self) -> Vec<WindowInfo> {
        let Some(registry) = self.registry() else {
            return Vec::new();
        };

        match registry.list_windows().await {
            Ok(windows) => windows.into_iter().filter(|w| w.pid == self.pid).collect(),
            Err(e) => {
                self.absorb(&e);
                Vec::new()
            }
        }
    }

    /// Raw list for diagnostics, without the process filter.
    pub async fn all_windows(&self) -> Result<Vec<WindowInfo>, ShellError> {
        let registry = self
            .registry()
            .ok_or_else(|| ShellError::ServiceUnavailable("integration disabled".to_string()))?;
        registry.list_windows().await.inspect_err(|e| self.absorb(e))
    }

    pub async fn window_details(&self, handle: WindowHandle) -> Option<WindowDetails> {
        let registry = self.registry()?;
        match registry.window_details(handle).await {
            Ok(details) => Some(details),
            Err(e) => {
                self.absorb(&e);
                None
            }
        }
    }

    pub async fn move_window(&self, handle: WindowHandle, to: Position) -> Result<(), ShellError> {
        let registry = self
            .registry()
            .ok_or_else(|| ShellError::ServiceUnavailable("integration disabled".to_string()))?;
        registry
            .move_window(handle, to.x, to.y)
            .await
            .inspect_err(|e| self.absorb(e))
    }
}
