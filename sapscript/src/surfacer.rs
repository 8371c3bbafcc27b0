//! Native window handling for dialogs outside the scripting tree.
//!
//! Save-as and open dialogs spawned by SAP GUI are plain OS windows: they
//! have no element id and can only be found by title.

use crate::clock::Clock;
use crate::errors::ScriptingError;
use tracing::{debug, info, instrument};

pub const DEFAULT_DIALOG_ATTEMPTS: u32 = 10;

/// OS windowing capability.
pub trait WindowSurfacer {
    /// Whether a visible top-level window has a title containing `title`.
    fn window_exists(&self, title: &str) -> Result<bool, ScriptingError>;

    /// Restore, show and raise the first window whose title contains `title`.
    /// Returns `Ok(false)` when no window matches.
    fn bring_to_front(&self, title: &str) -> Result<bool, ScriptingError>;
}

/// Check once per pause for a window titled `title`, up to `max_attempts` times.
#[instrument(skip(surfacer, clock))]
pub fn wait_for_dialog(
    surfacer: &dyn WindowSurfacer,
    clock: &dyn Clock,
    title: &str,
    max_attempts: u32,
) -> bool {
    let pause = std::time::Duration::from_secs(1);
    for attempt in 1..=max_attempts {
        match surfacer.window_exists(title) {
            Ok(true) => {
                info!(attempt, "Dialog '{title}' is open");
                return true;
            }
            Ok(false) => debug!(attempt, "Dialog '{title}' not open yet"),
            Err(e) => debug!(attempt, "Window lookup failed: {e}"),
        }
        if attempt < max_attempts {
            clock.sleep(pause);
        }
    }
    false
}

/// Case-insensitive title match used by every surfacer.
pub fn title_matches(window_title: &str, wanted: &str) -> bool {
    window_title.to_lowercase().contains(&wanted.to_lowercase())
}

/// Create the windowing capability for the current platform
pub fn create_surfacer() -> Result<Box<dyn WindowSurfacer>, ScriptingError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(crate::platforms::windows::DesktopSurfacer::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(ScriptingError::UnsupportedPlatform(
            "Window surfacing is only implemented for Windows".to_string(),
        ))
    }
}
