use chrono::NaiveDate;
use proptest::prelude::*;
use sapscript::ids::{
    CLIENT_FIELD, LANGUAGE_FIELD, LOGGED_IN_MARKER, MAIN_WINDOW, MULTI_LOGON_CONFIRM,
    MULTI_LOGON_TERMINATE_OTHERS, PASSWORD_FIELD, POPUP_WINDOW, USER_FIELD,
};
use sapscript::platforms::memory::{Action, MemoryBackend};
use sapscript::{
    Credentials, LoginOutcome, ManualClock, ScriptingError, Session, SessionConfig,
};
use std::sync::Arc;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
}

fn open(backend: &MemoryBackend, credentials: Credentials) -> Session {
    let clock = Arc::new(ManualClock::new());
    Session::try_connect(backend, SessionConfig::new("QAS", credentials), clock).unwrap()
}

fn credentials() -> Credentials {
    Credentials {
        client: "100".into(),
        user: "jdoe".into(),
        password: "secret".into(),
        language: "EN".into(),
    }
}

/// Logon screen where Enter opens a popup with `title`.
fn popup_on_enter(title: &'static str) -> MemoryBackend {
    let backend = MemoryBackend::logon_screen();
    backend.on_vkey(MAIN_WINDOW, 0, move |screen| {
        screen.add_element(POPUP_WINDOW, title);
        screen.add_element(MULTI_LOGON_TERMINATE_OTHERS, "");
        screen.add_element(MULTI_LOGON_CONFIRM, "");
        screen.set_active_window(POPUP_WINDOW);
    });
    backend
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn accepting_surface_logs_in_any_credentials(
        client in "[0-9]{3}",
        user in "[A-Z_]{1,12}",
        password in "[A-Za-z0-9#!]{1,40}",
        language in "[A-Z]{2}",
    ) {
        let backend = MemoryBackend::logon_screen();
        backend.on_vkey(MAIN_WINDOW, 0, |screen| screen.add_element(LOGGED_IN_MARKER, ""));
        let mut session = open(&backend, Credentials {
            client: client.clone(),
            user: user.clone(),
            password: password.clone(),
            language: language.clone(),
        });

        prop_assert_eq!(session.login_at(today()).unwrap(), LoginOutcome::LoggedIn);
        prop_assert!(session.is_open());
        prop_assert_eq!(backend.text_of(CLIENT_FIELD), Some(client));
        prop_assert_eq!(backend.text_of(USER_FIELD), Some(user));
        prop_assert_eq!(backend.text_of(PASSWORD_FIELD), Some(password));
        prop_assert_eq!(backend.text_of(LANGUAGE_FIELD), Some(language));
    }
}

#[test]
fn unrecognized_popup_aborts_and_closes() {
    let backend = popup_on_enter("Information");
    let mut session = open(&backend, credentials());

    let err = session.login_at(today()).unwrap_err();

    assert!(matches!(err, ScriptingError::UnexpectedPrompt(_)));
    assert!(!session.is_open());
    assert!(!backend
        .actions()
        .iter()
        .any(|action| action.path().starts_with(POPUP_WINDOW)));
}

#[test]
fn multi_logon_keeps_this_session_before_checking_marker() {
    let backend = popup_on_enter("Logon múltiplo");
    backend.on_press(MULTI_LOGON_CONFIRM, |screen| {
        screen.remove_element(POPUP_WINDOW);
        screen.set_active_window(MAIN_WINDOW);
        screen.add_element(LOGGED_IN_MARKER, "");
    });
    let mut session = open(&backend, credentials());

    assert_eq!(session.login_at(today()).unwrap(), LoginOutcome::LoggedIn);

    let actions = backend.actions();
    let select = actions
        .iter()
        .position(|a| *a == Action::Select(MULTI_LOGON_TERMINATE_OTHERS.to_string()))
        .expect("option selected");
    let press = actions
        .iter()
        .position(|a| *a == Action::Press(MULTI_LOGON_CONFIRM.to_string()))
        .expect("confirmed");
    assert!(select < press);
}

#[test]
fn missing_marker_is_rejected_and_closes() {
    let backend = MemoryBackend::logon_screen();
    let mut session = open(&backend, credentials());

    assert_eq!(session.login_at(today()).unwrap(), LoginOutcome::Rejected);
    assert!(!session.is_open());
    assert_eq!(backend.closed_sessions().len(), 1);

    // closing again is a no-op
    session.close();
    assert_eq!(backend.closed_sessions().len(), 1);
}

#[test]
fn connection_failure_names_the_stage() {
    use sapscript::platforms::memory::NegotiationStage;

    let backend = MemoryBackend::logon_screen();
    backend.fail_stage(NegotiationStage::OpenConnection);
    let clock = Arc::new(ManualClock::new());

    let err = Session::try_connect(&backend, SessionConfig::new("QAS", credentials()), clock.clone())
        .unwrap_err();
    assert!(matches!(err, ScriptingError::ConnectionError(ref msg) if msg.contains("open connection")));
    assert!(Session::connect(&backend, SessionConfig::new("QAS", credentials()), clock).is_none());
}

#[test]
#[ignore] // Requires SAP Logon with scripting enabled and SAP_* variables set
#[cfg(target_os = "windows")]
fn live_logon() {
    use sapscript::platforms::create_backend;
    use sapscript::SystemClock;

    let backend = create_backend().unwrap();
    let config = SessionConfig::new(
        std::env::var("SAP_TARGET").unwrap(),
        Credentials {
            client: std::env::var("SAP_CLIENT").unwrap(),
            user: std::env::var("SAP_USERNAME").unwrap(),
            password: std::env::var("SAP_PASSWORD").unwrap(),
            language: "PT".into(),
        },
    );
    let mut session = Session::try_connect(backend.as_ref(), config, Arc::new(SystemClock)).unwrap();
    assert!(session.login().unwrap().is_logged_in());
    session.logout().unwrap();
    session.close();
}
