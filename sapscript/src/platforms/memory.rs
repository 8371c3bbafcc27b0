//! Scripted in-memory element tree.
//!
//! `MemoryBackend` implements the whole negotiation chain against a flat map
//! of element paths. Screens change through reactions registered on presses,
//! virtual keys and selections, which is enough to replay logon flows,
//! popups and table controls without a desktop.

use super::{GuiApplication, GuiConnection, GuiSessionHandle, ScriptingBackend};
use crate::element::{GuiElement, GuiElementImpl};
use crate::errors::ScriptingError;
use crate::session::ElementSource;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Stage of session negotiation, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStage {
    Launch,
    ScriptingEngine,
    OpenConnection,
    FirstSession,
}

/// Every interaction performed against the tree, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetText { path: String, text: String },
    Press(String),
    Focus(String),
    VKey { path: String, code: u32 },
    Select(String),
    Caret { path: String, position: usize },
    Scroll { path: String, position: i64 },
    Resize { path: String, width: u32, height: u32 },
}

impl Action {
    pub fn path(&self) -> &str {
        match self {
            Action::SetText { path, .. }
            | Action::VKey { path, .. }
            | Action::Caret { path, .. }
            | Action::Scroll { path, .. }
            | Action::Resize { path, .. } => path,
            Action::Press(path) | Action::Focus(path) | Action::Select(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Press(String),
    VKey(String, u32),
    Select(String),
}

impl Trigger {
    fn matches(&self, action: &Action) -> bool {
        match (self, action) {
            (Trigger::Press(p), Action::Press(a)) => p == a,
            (Trigger::Select(p), Action::Select(a)) => p == a,
            (Trigger::VKey(p, c), Action::VKey { path, code }) => p == path && c == code,
            _ => false,
        }
    }
}

type ReactionFn = Box<dyn FnMut(&mut MemoryScreen) + Send>;

struct Reaction {
    trigger: Trigger,
    apply: ReactionFn,
}

#[derive(Debug, Clone, Default)]
struct MemoryNode {
    text: String,
    /// Lookups that still fail before the element becomes resolvable.
    misses_remaining: usize,
    scroll: i64,
}

/// Mutable state behind a [`MemoryBackend`]; reactions receive it directly.
pub struct MemoryScreen {
    nodes: BTreeMap<String, MemoryNode>,
    active_window: String,
    actions: Vec<Action>,
    reactions: Vec<Reaction>,
    failing_stage: Option<NegotiationStage>,
    fail_close: bool,
    launched: Vec<PathBuf>,
    opened: Vec<String>,
    closed_sessions: Vec<String>,
}

impl fmt::Debug for MemoryScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScreen")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("active_window", &self.active_window)
            .field("reactions", &self.reactions.len())
            .finish()
    }
}

impl Default for MemoryScreen {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            active_window: "wnd[0]".to_string(),
            actions: Vec::new(),
            reactions: Vec::new(),
            failing_stage: None,
            fail_close: false,
            launched: Vec::new(),
            opened: Vec::new(),
            closed_sessions: Vec::new(),
        }
    }
}

impl MemoryScreen {
    pub fn add_element(&mut self, path: &str, text: &str) {
        self.nodes.insert(
            path.to_string(),
            MemoryNode {
                text: text.to_string(),
                ..MemoryNode::default()
            },
        );
    }

    /// Remove `path` and everything below it.
    pub fn remove_element(&mut self, path: &str) {
        let prefix = format!("{path}/");
        self.nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    pub fn set_active_window(&mut self, name: &str) {
        self.active_window = name.to_string();
    }

    pub fn text_of(&self, path: &str) -> Option<String> {
        self.nodes.get(path).map(|node| node.text.clone())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn lookup(&mut self, path: &str) -> Result<(), ScriptingError> {
        match self.nodes.get_mut(path) {
            Some(node) if node.misses_remaining > 0 => {
                node.misses_remaining -= 1;
                Err(not_found(path))
            }
            Some(_) => Ok(()),
            None => Err(not_found(path)),
        }
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut MemoryNode, ScriptingError> {
        self.nodes.get_mut(path).ok_or_else(|| not_found(path))
    }

    fn apply(&mut self, action: &Action) -> Result<(), ScriptingError> {
        match action {
            Action::SetText { path, text } => self.node_mut(path)?.text = text.clone(),
            Action::Scroll { path, position } => self.node_mut(path)?.scroll = *position,
            other => {
                self.node_mut(other.path())?;
            }
        }
        Ok(())
    }

    fn check_stage(&self, stage: NegotiationStage) -> Result<(), ScriptingError> {
        if self.failing_stage == Some(stage) {
            return Err(ScriptingError::ConnectionError(format!(
                "{stage:?} did not return the expected object"
            )));
        }
        Ok(())
    }
}

fn not_found(path: &str) -> ScriptingError {
    ScriptingError::ElementNotFound(format!("The control could not be found by id: {path}"))
}

/// In-memory [`ScriptingBackend`]. Clones share the same screen.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    screen: Arc<Mutex<MemoryScreen>>,
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryBackend").field(&*self.lock()).finish()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Main window with the four logon fields and the OK-code field.
    pub fn logon_screen() -> Self {
        let backend = Self::new();
        for path in [
            "wnd[0]",
            "wnd[0]/usr/txtRSYST-MANDT",
            "wnd[0]/usr/txtRSYST-BNAME",
            "wnd[0]/usr/pwdRSYST-BCODE",
            "wnd[0]/usr/txtRSYST-LANGU",
            "wnd[0]/tbar[0]/okcd",
        ] {
            backend.add_element(path, "");
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, MemoryScreen> {
        self.screen.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_element(self, path: &str, text: &str) -> Self {
        self.add_element(path, text);
        self
    }

    pub fn add_element(&self, path: &str, text: &str) {
        self.lock().add_element(path, text);
    }

    /// Element that fails the first `misses` lookups before resolving.
    pub fn add_late_element(&self, path: &str, text: &str, misses: usize) {
        let mut screen = self.lock();
        screen.add_element(path, text);
        if let Some(node) = screen.nodes.get_mut(path) {
            node.misses_remaining = misses;
        }
    }

    pub fn remove_element(&self, path: &str) {
        self.lock().remove_element(path);
    }

    pub fn set_active_window(&self, name: &str) {
        self.lock().set_active_window(name);
    }

    pub fn fail_stage(&self, stage: NegotiationStage) {
        self.lock().failing_stage = Some(stage);
    }

    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }

    pub fn on_press<F>(&self, path: &str, apply: F)
    where
        F: FnMut(&mut MemoryScreen) + Send + 'static,
    {
        self.push_reaction(Trigger::Press(path.to_string()), Box::new(apply));
    }

    pub fn on_vkey<F>(&self, path: &str, code: u32, apply: F)
    where
        F: FnMut(&mut MemoryScreen) + Send + 'static,
    {
        self.push_reaction(Trigger::VKey(path.to_string(), code), Box::new(apply));
    }

    pub fn on_select<F>(&self, path: &str, apply: F)
    where
        F: FnMut(&mut MemoryScreen) + Send + 'static,
    {
        self.push_reaction(Trigger::Select(path.to_string()), Box::new(apply));
    }

    fn push_reaction(&self, trigger: Trigger, apply: ReactionFn) {
        self.lock().reactions.push(Reaction { trigger, apply });
    }

    pub fn text_of(&self, path: &str) -> Option<String> {
        self.lock().text_of(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains(path)
    }

    pub fn scroll_of(&self, path: &str) -> Option<i64> {
        self.lock().nodes.get(path).map(|node| node.scroll)
    }

    pub fn actions(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    pub fn launched(&self) -> Vec<PathBuf> {
        self.lock().launched.clone()
    }

    pub fn opened_connections(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    pub fn closed_sessions(&self) -> Vec<String> {
        self.lock().closed_sessions.clone()
    }

    fn perform(&self, action: Action) -> Result<(), ScriptingError> {
        let mut screen = self.lock();
        screen.apply(&action)?;
        debug!(path = action.path(), "memory action");
        screen.actions.push(action.clone());

        let mut reactions = std::mem::take(&mut screen.reactions);
        for reaction in reactions.iter_mut() {
            if reaction.trigger.matches(&action) {
                (reaction.apply)(&mut *screen);
            }
        }
        // Reactions may register further reactions; keep both.
        reactions.append(&mut screen.reactions);
        screen.reactions = reactions;
        Ok(())
    }

    /// Resolve `path` directly, without going through the negotiation chain.
    pub fn find_by_id(&self, path: &str) -> Result<GuiElement, ScriptingError> {
        self.lock().lookup(path)?;
        Ok(GuiElement::new(Box::new(MemoryElement {
            path: path.to_string(),
            backend: self.clone(),
        })))
    }
}

impl ElementSource for MemoryBackend {
    fn resolve(&self, path: &str) -> Result<GuiElement, ScriptingError> {
        self.find_by_id(path)
    }
}

impl ScriptingBackend for MemoryBackend {
    fn launch(&self, executable: &Path) -> Result<(), ScriptingError> {
        let mut screen = self.lock();
        screen.check_stage(NegotiationStage::Launch)?;
        screen.launched.push(executable.to_path_buf());
        Ok(())
    }

    fn scripting_engine(&self) -> Result<Box<dyn GuiApplication>, ScriptingError> {
        self.lock().check_stage(NegotiationStage::ScriptingEngine)?;
        Ok(Box::new(MemoryApplication {
            backend: self.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemoryApplication {
    backend: MemoryBackend,
}

impl GuiApplication for MemoryApplication {
    fn open_connection(
        &self,
        target: &str,
        _synchronous: bool,
    ) -> Result<Box<dyn GuiConnection>, ScriptingError> {
        let mut screen = self.backend.lock();
        screen.check_stage(NegotiationStage::OpenConnection)?;
        screen.opened.push(target.to_string());
        Ok(Box::new(MemoryConnection {
            backend: self.backend.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemoryConnection {
    backend: MemoryBackend,
}

impl GuiConnection for MemoryConnection {
    fn session(&self, index: usize) -> Result<Box<dyn GuiSessionHandle>, ScriptingError> {
        self.backend
            .lock()
            .check_stage(NegotiationStage::FirstSession)?;
        if index != 0 {
            return Err(ScriptingError::ConnectionError(format!(
                "No session at index {index}"
            )));
        }
        Ok(Box::new(MemorySession {
            backend: self.backend.clone(),
        }))
    }

    fn close_session(&self, session_id: &str) -> Result<(), ScriptingError> {
        let mut screen = self.backend.lock();
        screen.closed_sessions.push(session_id.to_string());
        if screen.fail_close {
            return Err(ScriptingError::PlatformError(
                "CloseSession raised an error".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MemorySession {
    backend: MemoryBackend,
}

impl GuiSessionHandle for MemorySession {
    fn id(&self) -> String {
        "/app/con[0]/ses[0]".to_string()
    }

    fn find_by_id(&self, path: &str) -> Result<GuiElement, ScriptingError> {
        self.backend.find_by_id(path)
    }

    fn active_window_name(&self) -> Result<String, ScriptingError> {
        Ok(self.backend.lock().active_window.clone())
    }
}

struct MemoryElement {
    path: String,
    backend: MemoryBackend,
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("path", &self.path)
            .finish()
    }
}

impl GuiElementImpl for MemoryElement {
    fn id(&self) -> String {
        self.path.clone()
    }

    fn text(&self) -> Result<String, ScriptingError> {
        self.backend
            .text_of(&self.path)
            .ok_or_else(|| not_found(&self.path))
    }

    fn set_text(&self, text: &str) -> Result<(), ScriptingError> {
        self.backend.perform(Action::SetText {
            path: self.path.clone(),
            text: text.to_string(),
        })
    }

    fn press(&self) -> Result<(), ScriptingError> {
        self.backend.perform(Action::Press(self.path.clone()))
    }

    fn set_focus(&self) -> Result<(), ScriptingError> {
        self.backend.perform(Action::Focus(self.path.clone()))
    }

    fn send_vkey(&self, code: u32) -> Result<(), ScriptingError> {
        self.backend.perform(Action::VKey {
            path: self.path.clone(),
            code,
        })
    }

    fn select(&self) -> Result<(), ScriptingError> {
        self.backend.perform(Action::Select(self.path.clone()))
    }

    fn set_caret_position(&self, position: usize) -> Result<(), ScriptingError> {
        self.backend.perform(Action::Caret {
            path: self.path.clone(),
            position,
        })
    }

    fn vertical_scroll_position(&self) -> Result<i64, ScriptingError> {
        self.backend
            .scroll_of(&self.path)
            .ok_or_else(|| not_found(&self.path))
    }

    fn set_vertical_scroll_position(&self, position: i64) -> Result<(), ScriptingError> {
        self.backend.perform(Action::Scroll {
            path: self.path.clone(),
            position,
        })
    }

    fn resize_working_pane(&self, width: u32, height: u32) -> Result<(), ScriptingError> {
        self.backend.perform(Action::Resize {
            path: self.path.clone(),
            width,
            height,
        })
    }

    fn find_by_id(&self, relative: &str) -> Result<GuiElement, ScriptingError> {
        self.backend.find_by_id(&format!("{}/{}", self.path, relative))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
