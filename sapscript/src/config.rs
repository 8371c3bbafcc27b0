//! Session configuration.
//!
//! Installation-wide settings (client number, logon language, SAP Logon
//! executable) live in a JSON file; the target system and user credentials
//! are supplied per run. Both are folded into a [`SessionConfig`] that is
//! passed explicitly into [`crate::Session`] construction.

use crate::errors::ScriptingError;
use crate::surfacer::DEFAULT_DIALOG_ATTEMPTS;
use crate::table::DEFAULT_SCAN_LIMIT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable consulted when no config path is given.
pub const CONFIG_ENV_VAR: &str = "SAPSCRIPT_CONFIG";

/// Default executable of the SAP Logon pad.
pub const DEFAULT_SAP_PATH: &str =
    r"C:\Program Files (x86)\SAP\FrontEnd\SAPgui\saplogon.exe";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub client: String,
    pub user: String,
    pub password: String,
    pub language: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client", &self.client)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("language", &self.language)
            .finish()
    }
}

/// Case-insensitive substrings used to recognize modal prompts.
///
/// The defaults match a Portuguese logon; other logon languages need their
/// own marker set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptMarkers {
    /// Present in the title of every credential-related popup.
    pub credential_title: String,
    /// Present in the label above the new-password field.
    pub new_password_label: String,
    /// Present in the title of the concurrent-logon warning.
    pub multi_logon_title: String,
}

impl Default for PromptMarkers {
    fn default() -> Self {
        Self {
            credential_title: "sap".to_string(),
            new_password_label: "nova senha".to_string(),
            multi_logon_title: "logon múltiplo".to_string(),
        }
    }
}

/// Fixed pauses and polling limits. Durations are whole seconds in JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    #[serde(with = "seconds")]
    pub launch_delay: Duration,
    #[serde(with = "seconds")]
    pub connect_delay: Duration,
    #[serde(with = "seconds")]
    pub prompt_delay: Duration,
    #[serde(with = "seconds")]
    pub rotation_delay: Duration,
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
    #[serde(with = "seconds")]
    pub wait_timeout: Duration,
    pub dialog_attempts: u32,
    pub table_scan_limit: usize,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            launch_delay: Duration::from_secs(2),
            connect_delay: Duration::from_secs(3),
            prompt_delay: Duration::from_secs(2),
            rotation_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(60),
            dialog_attempts: DEFAULT_DIALOG_ATTEMPTS,
            table_scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Contents of the JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    pub sap_client: String,
    pub sap_language: String,
    #[serde(default = "default_sap_path")]
    pub sap_path: PathBuf,
    #[serde(default)]
    pub markers: PromptMarkers,
    #[serde(default)]
    pub timings: Timings,
}

fn default_sap_path() -> PathBuf {
    PathBuf::from(DEFAULT_SAP_PATH)
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ScriptingError> {
        debug!("Loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScriptingError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ScriptingError> {
        let config: FileConfig = serde_json::from_str(raw)
            .map_err(|e| ScriptingError::Config(format!("Invalid config: {e}")))?;
        if config.sap_client.trim().is_empty() {
            return Err(ScriptingError::Config("sap_client must not be empty".to_string()));
        }
        Ok(config)
    }

    /// Resolve the config path from an explicit argument or [`CONFIG_ENV_VAR`].
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ScriptingError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .ok_or_else(|| {
                ScriptingError::Config(format!("No config path given and {CONFIG_ENV_VAR} is unset"))
            })
    }

    /// [`FileConfig::locate`] followed by [`FileConfig::load`].
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ScriptingError> {
        Self::load(&Self::locate(explicit)?)
    }

    pub fn into_session_config(
        self,
        target: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> SessionConfig {
        SessionConfig {
            target: target.into(),
            credentials: Credentials {
                client: self.sap_client,
                user: user.into(),
                password: password.into(),
                language: self.sap_language,
            },
            executable: self.sap_path,
            markers: self.markers,
            timings: self.timings,
        }
    }
}

/// Everything needed to negotiate and log into one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Connection entry name or system string passed to `OpenConnection`.
    pub target: String,
    pub credentials: Credentials,
    pub executable: PathBuf,
    pub markers: PromptMarkers,
    pub timings: Timings,
}

impl SessionConfig {
    pub fn new(target: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            target: target.into(),
            credentials,
            executable: default_sap_path(),
            markers: PromptMarkers::default(),
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_markers(mut self, markers: PromptMarkers) -> Self {
        self.markers = markers;
        self
    }
}
