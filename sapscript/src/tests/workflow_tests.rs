//! End-to-end flows against the in-memory backend: connect, log in, run a
//! transaction, fill an item table and leave.

use super::init_tracing;
use crate::clock::ManualClock;
use crate::config::{Credentials, SessionConfig};
use crate::ids::{LOGGED_IN_MARKER, MAIN_WINDOW, OK_CODE_FIELD};
use crate::platforms::memory::{Action, MemoryBackend};
use crate::{LoginOutcome, Session};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

const ORDER_TYPE_FIELD: &str = "wnd[0]/usr/ctxtVBAK-AUART";
const MATERIAL_COLUMN: &str = "wnd[0]/usr/tblSAPMV45ATCTRL_U_ERF_AUFTRAG/ctxtRV45A-MABNR[1,{}]";

fn credentials() -> Credentials {
    Credentials {
        client: "300".into(),
        user: "RPA_USER".into(),
        password: "Outubro#2026".into(),
        language: "PT".into(),
    }
}

/// Logon screen that accepts any credentials and knows one transaction.
fn sales_system() -> MemoryBackend {
    let backend = MemoryBackend::logon_screen();
    backend.on_vkey(MAIN_WINDOW, 0, |screen| {
        screen.add_element(LOGGED_IN_MARKER, "");
        let opening_order = screen.text_of(OK_CODE_FIELD).as_deref() == Some("/nVA01");
        if opening_order && !screen.contains(ORDER_TYPE_FIELD) {
            screen.add_element(ORDER_TYPE_FIELD, "");
            for (row, material) in ["MAT-001", "MAT-002"].into_iter().enumerate() {
                screen.add_element(&MATERIAL_COLUMN.replace("{}", &row.to_string()), material);
            }
            screen.add_element(&MATERIAL_COLUMN.replace("{}", "2"), "");
        }
    });
    backend
}

#[test]
fn order_entry_round_trip() {
    init_tracing();
    let backend = sales_system();
    let clock = Arc::new(ManualClock::new());
    let config = SessionConfig::new("PRD - Produção", credentials());

    let mut session = Session::try_connect(&backend, config, clock.clone()).unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    assert_eq!(session.login_at(today).unwrap(), LoginOutcome::LoggedIn);

    assert!(session
        .perform_operation("/nVA01", ORDER_TYPE_FIELD, Some(Duration::from_secs(5)))
        .unwrap());

    let row = session.write_first_empty(MATERIAL_COLUMN, "MAT-003").unwrap();
    assert_eq!(row, 2);
    assert_eq!(
        backend.text_of(&MATERIAL_COLUMN.replace("{}", "2")).as_deref(),
        Some("MAT-003")
    );

    session.logout().unwrap();
    assert_eq!(backend.text_of(OK_CODE_FIELD).as_deref(), Some("/nex"));

    session.close();
    assert!(!session.is_open());
    assert_eq!(backend.opened_connections(), vec!["PRD - Produção".to_string()]);
    assert_eq!(backend.closed_sessions(), vec!["/app/con[0]/ses[0]".to_string()]);

    // launch, connect and prompt pauses only: nothing had to be polled
    assert_eq!(clock.elapsed(), Duration::from_secs(7));
}

#[test]
fn main_window_is_resized_on_connect() {
    init_tracing();
    let backend = sales_system();
    let clock = Arc::new(ManualClock::new());
    let _session = Session::try_connect(
        &backend,
        SessionConfig::new("PRD", credentials()),
        clock,
    )
    .unwrap();

    assert_eq!(
        backend.actions().first(),
        Some(&Action::Resize {
            path: MAIN_WINDOW.to_string(),
            width: 169,
            height: 30,
        })
    );
}

#[test]
fn unknown_transaction_times_out_without_error() {
    init_tracing();
    let backend = sales_system();
    let clock = Arc::new(ManualClock::new());
    let mut session =
        Session::try_connect(&backend, SessionConfig::new("PRD", credentials()), clock.clone())
            .unwrap();
    let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    session.login_at(today).unwrap();
    let before = clock.elapsed();

    let found = session
        .perform_operation("/nZZ99", ORDER_TYPE_FIELD, Some(Duration::from_secs(3)))
        .unwrap();

    assert!(!found);
    assert_eq!(clock.elapsed() - before, Duration::from_secs(3));
    assert!(session.is_open());
}
