use crate::errors::ScriptingError;
use std::fmt::{self, Debug};
use tracing::{debug, instrument};

/// Virtual key code for Enter, the default confirm key of every SAP window.
pub const VKEY_ENTER: u32 = 0;

/// Represents one scriptable element on the remote surface.
///
/// Elements are addressed by their hierarchical id (for example
/// `wnd[0]/usr/txtRSYST-BNAME`). A `GuiElement` is only valid for the screen
/// it was resolved on; callers resolve again after every state change.
pub struct GuiElement {
    inner: Box<dyn GuiElementImpl>,
}

/// Interface for platform-specific element implementations
pub trait GuiElementImpl: Debug {
    /// Full id path of this element.
    fn id(&self) -> String;
    fn text(&self) -> Result<String, ScriptingError>;
    fn set_text(&self, text: &str) -> Result<(), ScriptingError>;
    fn press(&self) -> Result<(), ScriptingError>;
    fn set_focus(&self) -> Result<(), ScriptingError>;
    fn send_vkey(&self, code: u32) -> Result<(), ScriptingError>;
    fn select(&self) -> Result<(), ScriptingError>;
    fn set_caret_position(&self, position: usize) -> Result<(), ScriptingError>;
    fn vertical_scroll_position(&self) -> Result<i64, ScriptingError>;
    fn set_vertical_scroll_position(&self, position: i64) -> Result<(), ScriptingError>;
    fn resize_working_pane(&self, width: u32, height: u32) -> Result<(), ScriptingError>;
    /// Resolve a descendant by a path relative to this element.
    fn find_by_id(&self, relative: &str) -> Result<GuiElement, ScriptingError>;
    fn as_any(&self) -> &dyn std::any::Any;
}

impl GuiElement {
    pub fn new(inner: Box<dyn GuiElementImpl>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> String {
        self.inner.id()
    }

    pub fn text(&self) -> Result<String, ScriptingError> {
        self.inner.text()
    }

    #[instrument(level = "debug", skip(self, text), fields(id = %self.inner.id()))]
    pub fn set_text(&self, text: &str) -> Result<(), ScriptingError> {
        self.inner.set_text(text)
    }

    #[instrument(level = "debug", skip(self), fields(id = %self.inner.id()))]
    pub fn press(&self) -> Result<(), ScriptingError> {
        self.inner.press()
    }

    pub fn set_focus(&self) -> Result<(), ScriptingError> {
        self.inner.set_focus()
    }

    #[instrument(level = "debug", skip(self), fields(id = %self.inner.id()))]
    pub fn send_vkey(&self, code: u32) -> Result<(), ScriptingError> {
        self.inner.send_vkey(code)
    }

    /// Press Enter on this element.
    pub fn confirm(&self) -> Result<(), ScriptingError> {
        self.send_vkey(VKEY_ENTER)
    }

    #[instrument(level = "debug", skip(self), fields(id = %self.inner.id()))]
    pub fn select(&self) -> Result<(), ScriptingError> {
        self.inner.select()
    }

    pub fn set_caret_position(&self, position: usize) -> Result<(), ScriptingError> {
        self.inner.set_caret_position(position)
    }

    pub fn vertical_scroll_position(&self) -> Result<i64, ScriptingError> {
        self.inner.vertical_scroll_position()
    }

    pub fn set_vertical_scroll_position(&self, position: i64) -> Result<(), ScriptingError> {
        self.inner.set_vertical_scroll_position(position)
    }

    /// Move the vertical scrollbar by `delta` rows.
    pub fn scroll_by(&self, delta: i64) -> Result<(), ScriptingError> {
        let current = self.vertical_scroll_position()?;
        debug!(id = %self.id(), current, delta, "scrolling container");
        self.set_vertical_scroll_position(current + delta)
    }

    pub fn resize_working_pane(&self, width: u32, height: u32) -> Result<(), ScriptingError> {
        self.inner.resize_working_pane(width, height)
    }

    pub fn find_by_id(&self, relative: &str) -> Result<GuiElement, ScriptingError> {
        self.inner.find_by_id(relative)
    }

    pub fn as_any(&self) -> &dyn std::any::Any {
        self.inner.as_any()
    }
}

impl Debug for GuiElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuiElement")
            .field("id", &self.inner.id())
            .finish()
    }
}
