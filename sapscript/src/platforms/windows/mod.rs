//! Windows platform implementation
//!
//! SAP GUI exposes its scripting API as late-bound COM automation objects.
//! This module drives them through `IDispatch` with the `windows` crate, and
//! uses UI Automation for the native dialogs that live outside that tree.

pub mod backend;
pub mod dispatch;
pub mod surfacer;

pub use backend::ComBackend;
pub use surfacer::DesktopSurfacer;

use crate::ScriptingError;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

/// RPC_E_CHANGED_MODE: COM is already initialized on this thread with another model.
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

/// Initialize COM for the calling thread.
pub(crate) fn initialize_com() -> Result<(), ScriptingError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(ScriptingError::PlatformError(format!(
                "Failed to initialize COM: {hr}"
            )));
        }
    }
    Ok(())
}
