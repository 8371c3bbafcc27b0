use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptingError {
    /// A negotiation stage did not yield the expected scripting object.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A secondary window was open but matched none of the known prompts.
    #[error("Unexpected prompt: {0}")]
    UnexpectedPrompt(String),

    #[error("Locale error: {0}")]
    LocaleError(String),

    /// The remote surface did not accept a well-formed login attempt.
    #[error("Login rejected: {0}")]
    Rejected(String),

    #[error("No empty row in {template} within {limit} rows")]
    TableFull { template: String, limit: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScriptingError {
    /// True for lookup failures that existence checks convert to `false`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScriptingError::ElementNotFound(_))
    }
}
