//! sapscript CLI
//!
//! Drives a local SAP GUI client from the command line.
//!
//! Usage:
//!   sapscript --config sap.json login --target "PRD"
//!   sapscript run /nVA01 --wait-for "wnd[0]/usr/ctxtVBAK-AUART" --target "PRD"
//!   sapscript fill-column --template "wnd[0]/usr/tbl.../ctxtRV45A-MABNR[1,{}]" --value MAT-001 --target "PRD"
//!   sapscript surface "Save As" --wait
//!   sapscript password --date 2024-05-15 --language PT
//!   sapscript period

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sapscript::calendar::{locale_for_language, previous_month_range, rotation_password};
use sapscript::config::FileConfig;
use sapscript::platforms::create_backend;
use sapscript::surfacer::{create_surfacer, wait_for_dialog, DEFAULT_DIALOG_ATTEMPTS};
use sapscript::{Session, SystemClock};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LANGUAGE: &str = "PT";

#[derive(Parser)]
#[command(name = "sapscript")]
#[command(about = "Scripted SAP GUI sessions: logon, transactions, table input")]
struct Cli {
    /// JSON config file (falls back to SAPSCRIPT_CONFIG)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Connection and credentials. Not `Debug`: it carries the password.
#[derive(Args)]
struct SessionArgs {
    /// Connection entry as shown in SAP Logon
    #[clap(long, env = "SAP_TARGET")]
    target: String,

    #[clap(long, env = "SAP_USERNAME")]
    user: String,

    #[clap(long, env = "SAP_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, log in and log out again
    Login {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Log in and run a command, waiting for an element of the next screen
    Run {
        /// Transaction or OK-code, e.g. /nVA01
        command: String,
        #[clap(long)]
        wait_for: String,
        /// Seconds to wait (defaults to the configured wait timeout)
        #[clap(long)]
        timeout: Option<u64>,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Log in and write a value into the first empty row of a table column
    FillColumn {
        /// Cell id with {} in place of the row index
        #[clap(long)]
        template: String,
        #[clap(long)]
        value: String,
        /// Command that opens the screen holding the table
        #[clap(long, requires = "wait_for")]
        open: Option<String>,
        #[clap(long)]
        wait_for: Option<String>,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Bring a native window to the front
    Surface {
        title: String,
        /// Wait for the window to open first
        #[clap(long)]
        wait: bool,
    },
    /// Print the password used for a forced rotation
    Password {
        /// Date in YYYY-MM-DD (defaults to today)
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Logon language (defaults to sap_language from the config, then PT)
        #[clap(long)]
        language: Option<String>,
    },
    /// Print the first and last day of the previous month
    Period {
        #[clap(long)]
        today: Option<NaiveDate>,
    },
}

fn init_logging() {
    use tracing_appender::rolling;

    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let log_dir = if let Ok(custom_dir) = env::var("SAPSCRIPT_LOG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(env::temp_dir)
            .join("sapscript")
            .join("logs")
    };
    let create_dir_result = std::fs::create_dir_all(&log_dir);
    let file_appender = rolling::daily(&log_dir, "sapscript.log");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(fmt::layer().with_writer(file_appender).with_ansi(false))
        .init();

    if let Err(e) = create_dir_result {
        warn!("Failed to create log directory {}: {e}", log_dir.display());
    }
}

/// Config for subcommands that work without one.
fn optional_config(explicit: Option<&Path>) -> Option<FileConfig> {
    match FileConfig::discover(explicit) {
        Ok(config) => Some(config),
        Err(e) => {
            debug!("Continuing without config: {e}");
            None
        }
    }
}

/// `--language`, else the configured logon language, else Portuguese.
fn password_language(explicit: Option<String>, config: Option<&FileConfig>) -> String {
    explicit
        .or_else(|| config.map(|config| config.sap_language.clone()))
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

fn open_session(config: Option<&PathBuf>, args: SessionArgs) -> Result<Session> {
    let path = FileConfig::locate(config.map(PathBuf::as_path))?;
    let file_config = FileConfig::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let session_config = file_config.into_session_config(args.target, args.user, args.password);

    let backend = create_backend().context("No SAP GUI scripting backend")?;
    let mut session = Session::try_connect(backend.as_ref(), session_config, Arc::new(SystemClock))
        .context("Failed to connect to SAP")?;
    session
        .login()
        .context("Login failed")?
        .into_result()
        .context("Login was not accepted")?;
    Ok(session)
}

/// Run `work` on a logged-in session, then log out and close it.
fn with_session<T>(
    config: Option<&PathBuf>,
    args: SessionArgs,
    work: impl FnOnce(&Session) -> Result<T>,
) -> Result<T> {
    let mut session = open_session(config, args)?;
    let result = work(&session);
    if let Err(e) = session.logout() {
        warn!("Logout failed: {e}");
    }
    session.close();
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Login { session } => {
            with_session(cli.config.as_ref(), session, |_| Ok(()))?;
            println!("Login succeeded");
        }
        Commands::Run {
            command,
            wait_for,
            timeout,
            session,
        } => {
            let found = with_session(cli.config.as_ref(), session, |session| {
                Ok(session.perform_operation(
                    &command,
                    &wait_for,
                    timeout.map(Duration::from_secs),
                )?)
            })?;
            if !found {
                bail!("{wait_for} did not appear after {command}");
            }
            println!("{command}: {wait_for} is ready");
        }
        Commands::FillColumn {
            template,
            value,
            open,
            wait_for,
            session,
        } => {
            let row = with_session(cli.config.as_ref(), session, |session| {
                if let (Some(open), Some(wait_for)) = (&open, &wait_for) {
                    if !session.perform_operation(open, wait_for, None)? {
                        bail!("{wait_for} did not appear after {open}");
                    }
                }
                Ok(session.write_first_empty(&template, &value)?)
            })?;
            println!("{row}");
        }
        Commands::Surface { title, wait } => {
            let surfacer = create_surfacer().context("No window surfacing on this platform")?;
            let attempts = optional_config(cli.config.as_deref())
                .map(|config| config.timings.dialog_attempts)
                .unwrap_or(DEFAULT_DIALOG_ATTEMPTS);
            if wait && !wait_for_dialog(surfacer.as_ref(), &SystemClock, &title, attempts) {
                bail!("Window '{title}' did not open");
            }
            if !surfacer.bring_to_front(&title)? {
                bail!("No window titled '{title}'");
            }
            info!("Surfaced '{title}'");
        }
        Commands::Password { date, language } => {
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let config = optional_config(cli.config.as_deref());
            let language = password_language(language, config.as_ref());
            let locale = locale_for_language(&language)
                .with_context(|| format!("Cannot build a password for language {language}"))?;
            println!("{}", rotation_password(date, locale));
        }
        Commands::Period { today } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let (start, end) = previous_month_range(today);
            println!("{start} {end}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_language_is_not_fixed_by_the_parser() {
        let cli = Cli::try_parse_from(["sapscript", "password"]).unwrap();
        match cli.command {
            Commands::Password { language, .. } => assert_eq!(language, None),
            _ => panic!("Expected the password subcommand"),
        }
    }

    #[test]
    fn password_language_prefers_flag_then_config() {
        let config =
            FileConfig::from_json(r#"{"sap_client": "100", "sap_language": "EN"}"#).unwrap();

        assert_eq!(password_language(None, Some(&config)), "EN");
        assert_eq!(password_language(Some("DE".into()), Some(&config)), "DE");
        assert_eq!(password_language(None, None), "PT");
    }
}
