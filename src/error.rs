//! Error types for client onboarding.
//!
//! Collaborator adapters report their own concern's error (`StoreError`,
//! `AuthFailure`, `UploadFailure`, `ScanError`, `CaptureError`). The workflow
//! classifies each of them into an [`ErrorKind`] at the point it crosses into
//! onboarding, so callers branch on the kind and only display the message.

use serde::{Deserialize, Serialize};

/// The closed set of conditions a caller of the workflow can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmailAlreadyRegistered,
    EmailNotRegistered,
    IdAlreadyRegistered,
    IdNotRegistered,
    ScanAborted,
    ScanParseError,
    PhotoCaptureCancelled,
    UploadError,
    AuthError,
    AuthNullUser,
    ProfileInsertError,
    UnknownError,
    /// One or more form fields failed validation.
    InvalidForm,
    /// Operation called at the wrong checkpoint, or on a locked field.
    OutOfOrder,
}

impl ErrorKind {
    /// Whether the caller may retry the same step without restarting.
    ///
    /// `AuthNullUser` and `ProfileInsertError` are never retryable: a blind
    /// retry could create a second authentication identity.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::AuthNullUser | Self::ProfileInsertError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::EmailNotRegistered => "email_not_registered",
            Self::IdAlreadyRegistered => "id_already_registered",
            Self::IdNotRegistered => "id_not_registered",
            Self::ScanAborted => "scan_aborted",
            Self::ScanParseError => "scan_parse_error",
            Self::PhotoCaptureCancelled => "photo_capture_cancelled",
            Self::UploadError => "upload_error",
            Self::AuthError => "auth_error",
            Self::AuthNullUser => "auth_null_user",
            Self::ProfileInsertError => "profile_insert_error",
            Self::UnknownError => "unknown_error",
            Self::InvalidForm => "invalid_form",
            Self::OutOfOrder => "out_of_order",
        };
        write!(f, "{s}")
    }
}

/// A single failing form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: crate::onboarding::Field,
    pub message: String,
}

/// A classified onboarding failure: a kind for control flow and a message
/// for display.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct OnboardingError {
    kind: ErrorKind,
    message: String,
    field_errors: Vec<FieldError>,
    orphaned_account: Option<String>,
}

impl OnboardingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: Vec::new(),
            orphaned_account: None,
        }
    }

    /// Validation failure listing every offending field.
    pub fn invalid_form(field_errors: Vec<FieldError>) -> Self {
        let fields = field_errors
            .iter()
            .map(|e| e.field.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            kind: ErrorKind::InvalidForm,
            message: format!("Invalid form fields: {fields}"),
            field_errors,
            orphaned_account: None,
        }
    }

    /// Attach the account id of an authentication identity that now exists
    /// without a profile row.
    pub fn with_orphaned_account(mut self, account_id: impl Into<String>) -> Self {
        self.orphaned_account = Some(account_id.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    pub fn orphaned_account(&self) -> Option<&str> {
        self.orphaned_account.as_deref()
    }

    /// Never true while an identity without a profile is attached: the
    /// orphan has to be reconciled before anything is retried.
    pub fn is_recoverable(&self) -> bool {
        self.orphaned_account.is_none() && self.kind.is_recoverable()
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Which unique key a store rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    Email,
    NationalId,
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::NationalId => write!(f, "national_id"),
        }
    }
}

/// Identity store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Duplicate {key}: {message}")]
    Duplicate { key: UniqueKey, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Authentication provider errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    /// The provider refused the credentials (invalid email, weak password).
    #[error("{message}")]
    Rejected { message: String },

    #[error("{message}")]
    EmailTaken { message: String },

    #[error("Authentication provider unreachable: {0}")]
    Transport(String),
}

/// File store errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadFailure {
    #[error("Upload to {path} rejected: {reason}")]
    Rejected { path: String, reason: String },

    #[error("Upload transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document scanner errors.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Scan cancelled")]
    Aborted,

    #[error("Unrecognized document layout: {reason}")]
    Parse { reason: String },

    #[error("Scanner unavailable: {0}")]
    Unavailable(String),
}

/// Photo capture errors (the user cancelling is not an error).
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
