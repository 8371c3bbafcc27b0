use super::initialize_com;
use crate::surfacer::{title_matches, WindowSurfacer};
use crate::ScriptingError;
use tracing::debug;
use uiautomation::controls::ControlType;
use uiautomation::filters::NameFilter;
use uiautomation::UIAutomation;

/// Finds top-level windows through UI Automation and raises them with Win32.
pub struct DesktopSurfacer {
    automation: UIAutomation,
}

impl DesktopSurfacer {
    pub fn new() -> Result<Self, ScriptingError> {
        initialize_com()?;
        let automation = UIAutomation::new_direct()
            .map_err(|e| ScriptingError::PlatformError(e.to_string()))?;
        Ok(Self { automation })
    }

    fn find_window(&self, title: &str) -> Option<uiautomation::UIElement> {
        let root = self.automation.get_root_element().ok()?;
        let found = self
            .automation
            .create_matcher()
            .from_ref(&root)
            .control_type(ControlType::Window)
            .filter(Box::new(NameFilter {
                value: title.to_string(),
                casesensitive: false,
                partial: true,
            }))
            .depth(1)
            .timeout(250)
            .find_first()
            .ok()?;
        let name = found.get_name().unwrap_or_default();
        title_matches(&name, title).then_some(found)
    }
}

impl WindowSurfacer for DesktopSurfacer {
    fn window_exists(&self, title: &str) -> Result<bool, ScriptingError> {
        Ok(self.find_window(title).is_some())
    }

    fn bring_to_front(&self, title: &str) -> Result<bool, ScriptingError> {
        use windows::Win32::UI::WindowsAndMessaging::{
            BringWindowToTop, IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
            SW_SHOWNORMAL,
        };

        let Some(window) = self.find_window(title) else {
            debug!("No window titled '{title}'");
            return Ok(false);
        };

        let hwnd = window.get_native_window_handle().map_err(|e| {
            ScriptingError::PlatformError(format!("No native handle for '{title}': {e}"))
        })?;

        unsafe {
            let hwnd_param: windows::Win32::Foundation::HWND = hwnd.into();

            if IsIconic(hwnd_param).as_bool() {
                debug!("Window is minimized, restoring it");
                let _ = ShowWindow(hwnd_param, SW_RESTORE);
            }
            let _ = ShowWindow(hwnd_param, SW_SHOWNORMAL);
            let _ = BringWindowToTop(hwnd_param);

            if !SetForegroundWindow(hwnd_param).as_bool() {
                debug!("SetForegroundWindow failed, but continuing");
            }
        }

        debug!("Window '{title}' brought to front");
        Ok(true)
    }
}
