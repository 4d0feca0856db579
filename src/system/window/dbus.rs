//! Session bus client for the window-calls GNOME Shell extension.

use async_trait::async_trait;
use zbus::{proxy, Connection};

use super::shell::{
    looks_like_reply, parse_window_details, parse_window_list, ShellError, WindowDetails,
    WindowInfo, WindowRegistry,
};
use crate::shared::types::WindowHandle;

const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
const GJS_ERROR: &str = "org.gnome.gjs.JSError.Error";

#[proxy(
    interface = "org.gnome.Shell.Extensions.Windows",
    default_service = "org.gnome.Shell",
    default_path = "/org/gnome/Shell/Extensions/Windows",
    gen_blocking = false
)]
trait ShellWindows {
    fn list(&self) -> zbus::Result<String>;

    fn details(&self, winid: u32) -> zbus::Result<String>;

    #[zbus(name = "Move")]
    fn move_to(&self, winid: u32, x: i32, y: i32) -> zbus::Result<()>;
}

/// `WindowRegistry` backed by the extension's D-Bus interface.
pub struct DbusWindowRegistry {
    proxy: ShellWindowsProxy<'static>,
}

impl DbusWindowRegistry {
    pub async fn connect() -> Result<Self, ShellError> {
        let conn = Connection::session()
            .await
            .map_err(|e| ShellError::ServiceUnavailable(format!("session bus: {}", e)))?;
        let proxy = ShellWindowsProxy::new(&conn)
            .await
            .map_err(|e| classify(e, None))?;
        Ok(Self { proxy })
    }

    /// Call `List` once and check that the reply is JSON.
    pub async fn probe(&self) -> Result<(), ShellError> {
        let raw = self.proxy.list().await.map_err(|e| classify(e, None))?;
        if looks_like_reply(&raw) {
            Ok(())
        } else {
            Err(ShellError::ServiceUnavailable(format!(
                "unexpected List reply: {:?}",
                raw.chars().take(40).collect::<String>()
            )))
        }
    }
}

#[async_trait]
impl WindowRegistry for DbusWindowRegistry {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>, ShellError> {
        let raw = self.proxy.list().await.map_err(|e| classify(e, None))?;
        parse_window_list(&raw)
    }

    async fn window_details(&self, handle: WindowHandle) -> Result<WindowDetails, ShellError> {
        let raw = self
            .proxy
            .details(handle.get())
            .await
            .map_err(|e| classify(e, Some(handle)))?;
        parse_window_details(&raw)
    }

    async fn move_window(&self, handle: WindowHandle, x: i32, y: i32) -> Result<(), ShellError> {
        self.proxy
            .move_to(handle.get(), x, y)
            .await
            .map_err(|e| classify(e, Some(handle)))
    }
}

/// Map a bus error onto the registry's error taxonomy.
fn classify(err: zbus::Error, handle: Option<WindowHandle>) -> ShellError {
    match &err {
        zbus::Error::MethodError(name, detail, _) => {
            classify_name(name.as_str(), detail.as_deref(), handle)
        }
        zbus::Error::FDO(fdo) => match fdo.as_ref() {
            zbus::fdo::Error::ServiceUnknown(msg) | zbus::fdo::Error::UnknownMethod(msg) => {
                ShellError::ServiceUnavailable(msg.clone())
            }
            other => ShellError::Call(other.to_string()),
        },
        _ => ShellError::Call(err.to_string()),
    }
}

fn classify_name(name: &str, detail: Option<&str>, handle: Option<WindowHandle>) -> ShellError {
    let detail = detail.unwrap_or(name).to_string();
    match (name, handle) {
        (SERVICE_UNKNOWN, _) | (UNKNOWN_METHOD, _) => ShellError::ServiceUnavailable(detail),
        (GJS_ERROR, Some(handle)) => ShellError::WindowGone(handle.get()),
        _ => ShellError::Call(format!("{}: {}", name, detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service_or_method_is_unavailable() {
        assert!(classify_name(SERVICE_UNKNOWN, None, None).is_service_unavailable());
        assert!(classify_name(UNKNOWN_METHOD, Some("no List"), None).is_service_unavailable());
    }

    #[test]
    fn test_script_error_for_handle_is_window_gone() {
        let handle = WindowHandle::new(77);
        assert_eq!(
            classify_name(GJS_ERROR, Some("TypeError"), handle),
            ShellError::WindowGone(77)
        );
    }

    #[test]
    fn test_script_error_without_handle_is_call_failure() {
        assert!(matches!(
            classify_name(GJS_ERROR, None, None),
            ShellError::Call(_)
        ));
    }

    #[test]
    fn test_other_errors_are_call_failures() {
        let err = classify_name("org.freedesktop.DBus.Error.NoReply", None, WindowHandle::new(1));
        assert!(matches!(err, ShellError::Call(ref msg) if msg.contains("NoReply")));
    }
}
