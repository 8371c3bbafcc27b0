use crate::{GuiElement, ScriptingError};
use std::fmt::Debug;
use std::path::Path;

pub mod memory;
#[cfg(target_os = "windows")]
pub mod windows;

/// Entry point of the negotiation chain: launches the logon pad and hands out
/// the scripting engine.
///
/// Each stage below returns the next capability only when the remote object
/// has the expected type; anything else is a [`ScriptingError::ConnectionError`].
pub trait ScriptingBackend {
    /// Start the logon executable. Returns once the process is spawned.
    fn launch(&self, executable: &Path) -> Result<(), ScriptingError>;

    /// Acquire the scripting engine (`GetObject("SAPGUI").GetScriptingEngine`).
    fn scripting_engine(&self) -> Result<Box<dyn GuiApplication>, ScriptingError>;
}

/// The scripting engine singleton.
pub trait GuiApplication: Debug {
    fn open_connection(
        &self,
        target: &str,
        synchronous: bool,
    ) -> Result<Box<dyn GuiConnection>, ScriptingError>;
}

/// One open connection to a system.
pub trait GuiConnection: Debug {
    /// Session window at `index` among the connection's children.
    fn session(&self, index: usize) -> Result<Box<dyn GuiSessionHandle>, ScriptingError>;

    fn close_session(&self, session_id: &str) -> Result<(), ScriptingError>;
}

/// Root of the element namespace for one session.
pub trait GuiSessionHandle: Debug {
    fn id(&self) -> String;

    fn find_by_id(&self, path: &str) -> Result<GuiElement, ScriptingError>;

    /// Name of the active window slot, e.g. `wnd[0]` or `wnd[1]`.
    fn active_window_name(&self) -> Result<String, ScriptingError>;
}

/// Create the scripting backend for the current platform
pub fn create_backend() -> Result<Box<dyn ScriptingBackend>, ScriptingError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::ComBackend::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(ScriptingError::UnsupportedPlatform(
            "SAP GUI scripting is only available on Windows".to_string(),
        ))
    }
}
