//! Scripted automation of SAP GUI desktop sessions
//!
//! This crate drives a running SAP GUI client through its scripting API:
//! negotiating a session, walking the logon dialogs, waiting for screens to
//! render, filling table controls and raising native dialogs. The remote
//! surface is reached through the capability traits in [`platforms`], so the
//! same flows run against the COM backend on Windows and the in-memory
//! backend in tests.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod element;
pub mod errors;
pub mod ids;
pub mod login;
pub mod platforms;
pub mod poller;
pub mod session;
pub mod surfacer;
pub mod table;
#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Credentials, FileConfig, PromptMarkers, SessionConfig, Timings};
pub use element::{GuiElement, GuiElementImpl};
pub use errors::ScriptingError;
pub use login::{LoginOutcome, LoginState};
pub use poller::ElementPoller;
pub use session::{ElementSource, Session};
pub use surfacer::WindowSurfacer;
pub use table::TableWriter;
