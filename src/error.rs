use thiserror::Error;

/// Type alias for Result with LabelerError
pub type Result<T> = std::result::Result<T, LabelerError>;

/// Error types for the labeling workflow
#[derive(Error, Debug)]
pub enum LabelerError {
    /// Cached token could not be used and interactive authorization failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Listing the account's labels failed
    #[error("Failed to load label directory: {0}")]
    DirectoryLoadError(String),

    /// The generative-text call failed or returned nothing usable
    #[error("Label suggestion failed: {0}")]
    SuggestionError(String),

    /// The provider rejected a label creation
    #[error("Failed to create label '{name}': {message}")]
    LabelCreateError { name: String, message: String },

    /// The provider rejected a message modify call
    #[error("Failed to apply labels to message {message_id}: {message}")]
    LabelApplyError { message_id: String, message: String },

    /// Fetching a single message failed
    #[error("Failed to fetch message {message_id}: {message}")]
    MessageFetchError { message_id: String, message: String },

    /// Listing unread messages failed
    #[error("Failed to list messages: {0}")]
    ListMessagesError(String),

    /// Gmail API returned an error
    #[error("Gmail API error{}: {message}", status_suffix(.status))]
    ApiError { status: Option<u16>, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Anything that escaped the per-message guard
    #[error("Labeling run failed: {0}")]
    UnhandledRunError(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl LabelerError {
    /// Message that is safe to hand to an HTTP caller.
    ///
    /// Provider responses, file paths and token details stay in the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            LabelerError::AuthError(_) => "Authorization with the mail provider failed",
            LabelerError::DirectoryLoadError(_) => "Could not load mailbox labels",
            LabelerError::SuggestionError(_) => "Label suggestion service failed",
            LabelerError::LabelCreateError { .. } => "Could not create a label",
            LabelerError::LabelApplyError { .. } => "Could not apply labels to a message",
            LabelerError::MessageFetchError { .. } => "Could not fetch a message",
            LabelerError::ListMessagesError(_) => "Could not list unread messages",
            LabelerError::ConfigError(_) => "Server is misconfigured",
            LabelerError::ApiError { .. }
            | LabelerError::IoError(_)
            | LabelerError::SerializationError(_)
            | LabelerError::UnhandledRunError(_) => "Email labeling process failed",
        }
    }
}

impl From<google_gmail1::Error> for LabelerError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                LabelerError::ApiError {
                    status: Some(status.as_u16()),
                    message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => LabelerError::ApiError {
                status: Some(400),
                message: err.to_string(),
            },
            google_gmail1::Error::HttpError(ref err) => LabelerError::ApiError {
                status: None,
                message: format!("Connection error: {}", err),
            },
            google_gmail1::Error::MissingToken(ref err) => {
                LabelerError::AuthError(format!("Token unavailable: {}", err))
            }
            _ => LabelerError::ApiError {
                status: None,
                message: error.to_string(),
            },
        }
    }
}
