use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::element::GuiElement;
use crate::errors::ScriptingError;
use crate::ids::{LOGOFF_COMMAND, MAIN_WINDOW, OK_CODE_FIELD, WORKING_PANE_SIZE};
use crate::platforms::{GuiApplication, GuiConnection, GuiSessionHandle, ScriptingBackend};
use crate::poller::ElementPoller;
use crate::table::TableWriter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Anything that can resolve element ids on the current screen.
pub trait ElementSource {
    fn resolve(&self, path: &str) -> Result<GuiElement, ScriptingError>;

    /// Existence check that never fails.
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }
}

/// One negotiated connection to the remote surface.
///
/// Holds the scripting engine, the connection and the session window. The
/// three are acquired together in [`Session::try_connect`] and released
/// together in [`Session::close`]; there is never a session root without its
/// connection.
pub struct Session {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    engine: Option<Box<dyn GuiApplication>>,
    connection: Option<Box<dyn GuiConnection>>,
    root: Option<Box<dyn GuiSessionHandle>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.config.target)
            .field("credentials", &self.config.credentials)
            .field("open", &self.is_open())
            .finish()
    }
}

fn stage_failed(stage: &str, e: ScriptingError) -> ScriptingError {
    match e {
        ScriptingError::ConnectionError(msg) => {
            ScriptingError::ConnectionError(format!("{stage}: {msg}"))
        }
        other => ScriptingError::ConnectionError(format!("{stage}: {other}")),
    }
}

impl Session {
    /// Launch the logon pad and negotiate engine, connection and session.
    ///
    /// If any stage fails, everything acquired before it is dropped and a
    /// [`ScriptingError::ConnectionError`] names the stage.
    #[instrument(skip(backend, config, clock), fields(target = %config.target))]
    pub fn try_connect(
        backend: &dyn ScriptingBackend,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScriptingError> {
        let timings = config.timings.clone();

        info!("Opening {}", config.executable.display());
        backend
            .launch(&config.executable)
            .map_err(|e| stage_failed("process launch", e))?;
        clock.sleep(timings.launch_delay);

        let engine = backend
            .scripting_engine()
            .map_err(|e| stage_failed("scripting engine", e))?;

        let connection = engine
            .open_connection(&config.target, true)
            .map_err(|e| stage_failed("open connection", e))?;
        clock.sleep(timings.connect_delay);

        let root = connection
            .session(0)
            .map_err(|e| stage_failed("first session", e))?;
        debug!(session = %root.id(), "session acquired");

        let session = Session {
            config,
            clock,
            engine: Some(engine),
            connection: Some(connection),
            root: Some(root),
        };
        session.resize_working_pane();
        Ok(session)
    }

    /// Like [`Session::try_connect`], but logs the failure and returns `None`.
    pub fn connect(
        backend: &dyn ScriptingBackend,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Option<Self> {
        match Self::try_connect(backend, config, clock) {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Failed to connect to SAP: {e}");
                None
            }
        }
    }

    fn resize_working_pane(&self) {
        let (width, height) = WORKING_PANE_SIZE;
        if let Err(e) = self
            .resolve(MAIN_WINDOW)
            .and_then(|window| window.resize_working_pane(width, height))
        {
            warn!("Could not resize the main window: {e}");
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some() && self.root.is_some()
    }

    fn root(&self) -> Result<&dyn GuiSessionHandle, ScriptingError> {
        self.root
            .as_deref()
            .ok_or_else(|| ScriptingError::ConnectionError("Session is closed".to_string()))
    }

    /// Name of the active window slot.
    pub fn active_window_name(&self) -> Result<String, ScriptingError> {
        self.root()?.active_window_name()
    }

    /// Text of the element at `path`, or `None` when it cannot be read.
    pub fn text(&self, path: &str) -> Option<String> {
        match self.resolve(path).and_then(|element| element.text()) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("Could not read text of {path}: {e}");
                None
            }
        }
    }

    pub fn poller(&self) -> ElementPoller {
        ElementPoller::new(self.clock.clone()).with_interval(self.config.timings.poll_interval)
    }

    /// Wait up to `timeout` for `path` to appear.
    pub fn wait_for(&self, path: &str, timeout: Duration) -> bool {
        self.poller().wait_for(self, path, timeout)
    }

    /// Wait for `path` using the configured default timeout.
    pub fn wait_for_element(&self, path: &str) -> bool {
        self.wait_for(path, self.config.timings.wait_timeout)
    }

    pub fn table_writer(&self) -> TableWriter<'_> {
        TableWriter::new(self).with_scan_limit(self.config.timings.table_scan_limit)
    }

    /// Fill the first empty row of a table column; see [`TableWriter`].
    pub fn write_first_empty(&self, column_template: &str, value: &str) -> Result<usize, ScriptingError> {
        self.table_writer().write_first_empty(column_template, value)
    }

    /// Enter `command` in the OK-code field and wait for `wait_for` to render.
    #[instrument(skip(self))]
    pub fn perform_operation(
        &self,
        command: &str,
        wait_for: &str,
        timeout: Option<Duration>,
    ) -> Result<bool, ScriptingError> {
        self.submit_command(command)?;
        let timeout = timeout.unwrap_or(self.config.timings.wait_timeout);
        let found = self.wait_for(wait_for, timeout);
        if found {
            info!("Element {wait_for} found.");
        } else {
            error!("Element {wait_for} not found.");
        }
        Ok(found)
    }

    fn submit_command(&self, command: &str) -> Result<(), ScriptingError> {
        self.resolve(OK_CODE_FIELD)?.set_text(command)?;
        self.resolve(MAIN_WINDOW)?.confirm()
    }

    /// End the session from inside SAP with `/nex`.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), ScriptingError> {
        match self.submit_command(LOGOFF_COMMAND) {
            Ok(()) => {
                info!("Successfully logged out of SAP.");
                Ok(())
            }
            Err(e) => {
                error!("Error during SAP logout: {e}");
                Err(e)
            }
        }
    }

    /// Focus `path`; if it is not rendered, scroll its container down one row.
    pub fn scroll_to_field(&self, path: &str) -> Result<(), ScriptingError> {
        match self.resolve(path) {
            Ok(field) => field.set_focus(),
            Err(e) if e.is_not_found() => {
                let (container, _) = path.rsplit_once('/').ok_or(e)?;
                debug!("{path} not rendered, scrolling {container}");
                self.resolve(container)?.scroll_by(1)
            }
            Err(e) => Err(e),
        }
    }

    /// Close the connection and drop every handle.
    ///
    /// Never fails: errors from the remote side are logged and the session
    /// ends up closed regardless. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub fn close(&mut self) {
        let root = self.root.take();
        let engine = self.engine.take();
        let Some(connection) = self.connection.take() else {
            debug!("Session already closed");
            return;
        };

        let session_id = root
            .as_ref()
            .map(|root| root.id())
            .unwrap_or_else(|| "ses[0]".to_string());
        match connection.close_session(&session_id) {
            Ok(()) => info!("SAP connection closed."),
            Err(e) => error!("Error closing SAP connection: {e}"),
        }

        drop(root);
        drop(connection);
        drop(engine);
        info!("SAP connection closed safely.");
    }
}

impl ElementSource for Session {
    fn resolve(&self, path: &str) -> Result<GuiElement, ScriptingError> {
        self.root()?.find_by_id(path)
    }
}
