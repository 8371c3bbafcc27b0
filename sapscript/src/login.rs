//! Logon state machine.
//!
//! SAP GUI gives no "logged in" event. Every step writes into the screen,
//! pauses, and then probes which elements and popups are present:
//!
//! ```text
//! Connecting -> CredentialsSubmitted -> LoggedIn | Rejected
//!                        |
//!                        +-> AwaitingPrompt -> PasswordRotation    -> LoggedIn | Rejected
//!                                          -> MultiSessionWarning -> LoggedIn | Rejected
//! ```
//!
//! Popups are classified by their title and label text before anything is
//! written into them. A popup that matches no known prompt aborts the logon.

use crate::calendar::{locale_for_language, rotation_password};
use crate::element::GuiElement;
use crate::errors::ScriptingError;
use crate::ids::{
    CLIENT_FIELD, CONFIRM_PASSWORD_FIELD, LANGUAGE_FIELD, LOGGED_IN_MARKER, MAIN_WINDOW,
    MULTI_LOGON_CONFIRM, MULTI_LOGON_TERMINATE_OTHERS, NEW_PASSWORD_FIELD, NEW_PASSWORD_LABEL,
    PASSWORD_FIELD, POPUP_CONFIRM_BUTTON, POPUP_WINDOW, USER_FIELD,
};
use crate::session::{ElementSource, Session};
use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Connecting,
    CredentialsSubmitted,
    AwaitingPrompt,
    PasswordRotation,
    MultiSessionWarning,
    LoggedIn,
    Rejected,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Final result of a well-formed logon attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    Rejected,
}

impl LoginOutcome {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, LoginOutcome::LoggedIn)
    }

    /// Treat `Rejected` as an error.
    pub fn into_result(self) -> Result<(), ScriptingError> {
        match self {
            LoginOutcome::LoggedIn => Ok(()),
            LoginOutcome::Rejected => Err(ScriptingError::Rejected(
                "Logged-in marker did not appear".to_string(),
            )),
        }
    }
}

/// Recognized secondary-window variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    PasswordRotation,
    MultiSessionWarning,
}

/// What a finished flow produced.
#[derive(Debug)]
struct FlowResult {
    outcome: LoginOutcome,
    rotated_password: Option<String>,
}

struct LoginFlow<'a> {
    session: &'a Session,
    today: NaiveDate,
    state: LoginState,
    history: Vec<LoginState>,
}

impl<'a> LoginFlow<'a> {
    fn new(session: &'a Session, today: NaiveDate) -> Self {
        Self {
            session,
            today,
            state: LoginState::Connecting,
            history: vec![LoginState::Connecting],
        }
    }

    fn transition(&mut self, next: LoginState) {
        debug!(from = %self.state, to = %next, "login transition");
        self.state = next;
        self.history.push(next);
    }

    fn run(&mut self) -> Result<FlowResult, ScriptingError> {
        self.submit_credentials()?;
        self.transition(LoginState::CredentialsSubmitted);

        let timings = &self.session.config().timings;
        self.session.clock().sleep(timings.prompt_delay);

        if self.session.active_window_name()? != POPUP_WINDOW {
            debug!("No popup after submitting credentials");
            return Ok(self.finish(None));
        }

        self.transition(LoginState::AwaitingPrompt);
        let popup = self.session.resolve(POPUP_WINDOW)?;
        match self.classify(&popup)? {
            PromptKind::PasswordRotation => {
                self.transition(LoginState::PasswordRotation);
                let password = self.rotate_password(&popup)?;
                Ok(self.finish(Some(password)))
            }
            PromptKind::MultiSessionWarning => {
                self.transition(LoginState::MultiSessionWarning);
                self.terminate_other_sessions()?;
                Ok(self.finish(None))
            }
        }
    }

    fn submit_credentials(&self) -> Result<(), ScriptingError> {
        let credentials = &self.session.config().credentials;
        self.session.resolve(CLIENT_FIELD)?.set_text(&credentials.client)?;
        self.session.resolve(USER_FIELD)?.set_text(&credentials.user)?;
        self.session.resolve(PASSWORD_FIELD)?.set_text(&credentials.password)?;
        self.session.resolve(LANGUAGE_FIELD)?.set_text(&credentials.language)?;
        self.session.resolve(MAIN_WINDOW)?.confirm()
    }

    /// Decide which prompt `popup` is. Nothing is written before this passes.
    fn classify(&self, popup: &GuiElement) -> Result<PromptKind, ScriptingError> {
        let markers = &self.session.config().markers;
        let title = popup.text()?;
        let lowered = title.to_lowercase();
        let is_multi_logon = lowered.contains(&markers.multi_logon_title.to_lowercase());

        if !is_multi_logon && !lowered.contains(&markers.credential_title.to_lowercase()) {
            return Err(ScriptingError::UnexpectedPrompt(format!(
                "Popup '{title}' is not a credential prompt"
            )));
        }

        let label = match popup.find_by_id(NEW_PASSWORD_LABEL).and_then(|l| l.text()) {
            Ok(label) => label.to_lowercase(),
            Err(e) if e.is_not_found() => String::new(),
            Err(e) => return Err(e),
        };

        if label.contains(&markers.new_password_label.to_lowercase()) {
            info!("Password change prompt detected.");
            Ok(PromptKind::PasswordRotation)
        } else if is_multi_logon {
            info!("Multiple logins detected. Closing other sessions.");
            Ok(PromptKind::MultiSessionWarning)
        } else {
            Err(ScriptingError::UnexpectedPrompt(format!(
                "Popup '{title}' matches no known prompt"
            )))
        }
    }

    fn rotate_password(&self, popup: &GuiElement) -> Result<String, ScriptingError> {
        let config = self.session.config();
        let locale = locale_for_language(&config.credentials.language)?;
        let password = rotation_password(self.today, locale);
        debug!("Generated replacement password for {}", self.today);

        popup.find_by_id(NEW_PASSWORD_FIELD)?.set_text(&password)?;
        popup.find_by_id(CONFIRM_PASSWORD_FIELD)?.set_text(&password)?;
        popup.find_by_id(POPUP_CONFIRM_BUTTON)?.press()?;

        self.session.clock().sleep(config.timings.rotation_delay);
        Ok(password)
    }

    fn terminate_other_sessions(&self) -> Result<(), ScriptingError> {
        self.session.resolve(MULTI_LOGON_TERMINATE_OTHERS)?.select()?;
        self.session.resolve(MULTI_LOGON_CONFIRM)?.press()
    }

    fn finish(&mut self, rotated_password: Option<String>) -> FlowResult {
        let outcome = if self.session.exists(LOGGED_IN_MARKER) {
            self.transition(LoginState::LoggedIn);
            LoginOutcome::LoggedIn
        } else {
            self.transition(LoginState::Rejected);
            LoginOutcome::Rejected
        };
        FlowResult {
            outcome,
            rotated_password,
        }
    }
}

impl Session {
    /// Log in with the configured credentials, using today's date for a
    /// forced password rotation.
    pub fn login(&mut self) -> Result<LoginOutcome, ScriptingError> {
        self.login_at(chrono::Local::now().date_naive())
    }

    /// Log in, generating any rotated password from `today`.
    ///
    /// Anything other than [`LoginOutcome::LoggedIn`] closes the session
    /// before returning. After a successful rotation the session's
    /// credentials carry the new password.
    #[instrument(skip(self))]
    pub fn login_at(&mut self, today: NaiveDate) -> Result<LoginOutcome, ScriptingError> {
        let mut flow = LoginFlow::new(self, today);
        let result = flow.run();
        let history = std::mem::take(&mut flow.history);
        debug!(?history, "login finished");

        match result {
            Ok(FlowResult {
                outcome: LoginOutcome::LoggedIn,
                rotated_password,
            }) => {
                if let Some(password) = rotated_password {
                    info!("Password changed successfully and user logged in.");
                    self.config_mut().credentials.password = password;
                }
                info!("Successfully connected to SAP.");
                Ok(LoginOutcome::LoggedIn)
            }
            Ok(FlowResult {
                outcome: LoginOutcome::Rejected,
                ..
            }) => {
                error!("Login was not accepted");
                self.close();
                Ok(LoginOutcome::Rejected)
            }
            Err(e) => {
                error!("Error during SAP login: {e}");
                self.close();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{Credentials, SessionConfig};
    use crate::platforms::memory::{Action, MemoryBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn credentials(language: &str) -> Credentials {
        Credentials {
            client: "100".into(),
            user: "jdoe".into(),
            password: "Abril#2024".into(),
            language: language.into(),
        }
    }

    fn may_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
    }

    fn open(backend: &MemoryBackend, language: &str) -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = SessionConfig::new("PRD", credentials(language));
        let session = Session::try_connect(backend, config, clock.clone()).unwrap();
        (session, clock)
    }

    /// Logon screen where Enter opens the given popup.
    fn with_popup(title: &str, label: Option<&str>) -> MemoryBackend {
        let backend = MemoryBackend::logon_screen();
        let title = title.to_string();
        let label = label.map(str::to_string);
        backend.on_vkey(MAIN_WINDOW, 0, move |screen| {
            screen.add_element(POPUP_WINDOW, &title);
            if let Some(label) = &label {
                screen.add_element("wnd[1]/usr/lblRSYST-NCODE_TEXT", label);
                screen.add_element("wnd[1]/usr/pwdRSYST-NCODE", "");
                screen.add_element("wnd[1]/usr/pwdRSYST-NCOD2", "");
            }
            screen.add_element("wnd[1]/tbar[0]/btn[0]", "");
            screen.set_active_window(POPUP_WINDOW);
        });
        backend
    }

    #[test]
    fn state_display_matches_variant() {
        assert_eq!(LoginState::MultiSessionWarning.to_string(), "MultiSessionWarning");
    }

    #[test]
    fn outcome_into_result() {
        assert!(LoginOutcome::LoggedIn.into_result().is_ok());
        assert!(matches!(
            LoginOutcome::Rejected.into_result(),
            Err(ScriptingError::Rejected(_))
        ));
    }

    #[test]
    fn password_rotation_writes_both_fields_and_logs_in() {
        let backend = with_popup("SAP", Some("Nova senha"));
        backend.on_press("wnd[1]/tbar[0]/btn[0]", |screen| {
            let new = screen.text_of("wnd[1]/usr/pwdRSYST-NCODE");
            if new.is_some() && new == screen.text_of("wnd[1]/usr/pwdRSYST-NCOD2") {
                screen.remove_element(POPUP_WINDOW);
                screen.set_active_window(MAIN_WINDOW);
                screen.add_element(LOGGED_IN_MARKER, "");
            }
        });
        let (mut session, clock) = open(&backend, "PT");

        let outcome = session.login_at(may_15()).unwrap();

        assert_eq!(outcome, LoginOutcome::LoggedIn);
        assert_eq!(session.config().credentials.password, "Maio#2024");
        let written: Vec<_> = backend
            .actions()
            .into_iter()
            .filter(|a| matches!(a, Action::SetText { path, .. } if path.starts_with("wnd[1]")))
            .collect();
        assert_eq!(written.len(), 2);
        // launch, connect, prompt, rotation
        assert_eq!(
            clock.sleeps(),
            vec![2, 3, 2, 3].into_iter().map(Duration::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn failed_rotation_is_rejected_and_closes() {
        let backend = with_popup("SAP", Some("Nova senha"));
        let (mut session, _) = open(&backend, "PT");

        let outcome = session.login_at(may_15()).unwrap();

        assert_eq!(outcome, LoginOutcome::Rejected);
        assert!(!session.is_open());
        assert_eq!(backend.closed_sessions().len(), 1);
    }

    #[test]
    fn rotation_without_locale_fails_before_writing() {
        let backend = with_popup("SAP", Some("Nova senha"));
        let (mut session, _) = open(&backend, "XX");

        let err = session.login_at(may_15()).unwrap_err();

        assert!(matches!(err, ScriptingError::LocaleError(_)));
        assert!(!session.is_open());
        assert!(!backend
            .actions()
            .iter()
            .any(|a| a.path().starts_with("wnd[1]")));
    }

    #[test]
    fn popup_with_credential_title_but_unknown_label_is_unexpected() {
        let backend = with_popup("SAP GUI", Some("Licença expira em breve"));
        let (mut session, _) = open(&backend, "PT");

        let err = session.login_at(may_15()).unwrap_err();
        assert!(matches!(err, ScriptingError::UnexpectedPrompt(_)));
        assert!(!session.is_open());
    }
}
