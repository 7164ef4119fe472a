//! Registration attempt state machine. Tracks which checkpoint the attempt
//! is at and the values gathered so far.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, OnboardingError};
use crate::model::Customer;
use crate::scanner::ScannedIdentity;
use crate::store::AccountHandle;

use super::view::ViewState;

/// The checkpoints of a registration attempt.
///
/// Progresses linearly: AwaitingEmailCheck → AwaitingIdCheck →
/// ReadyToSubmit → Submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checkpoint {
    AwaitingEmailCheck,
    AwaitingIdCheck,
    ReadyToSubmit,
    Submitted,
}

impl Checkpoint {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Checkpoint) -> bool {
        use Checkpoint::*;
        matches!(
            (self, target),
            (AwaitingEmailCheck, AwaitingIdCheck)
                | (AwaitingIdCheck, ReadyToSubmit)
                | (ReadyToSubmit, Submitted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted)
    }

    /// Get the next checkpoint, if any.
    pub fn next(&self) -> Option<Checkpoint> {
        use Checkpoint::*;
        match self {
            AwaitingEmailCheck => Some(AwaitingIdCheck),
            AwaitingIdCheck => Some(ReadyToSubmit),
            ReadyToSubmit => Some(Submitted),
            Submitted => None,
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::AwaitingEmailCheck
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingEmailCheck => "awaiting-email-check",
            Self::AwaitingIdCheck => "awaiting-id-check",
            Self::ReadyToSubmit => "ready-to-submit",
            Self::Submitted => "submitted",
        };
        write!(f, "{s}")
    }
}

/// Registration form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Email,
    NationalId,
    GivenName,
    Surname,
    Password,
    PasswordConfirmation,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::NationalId => "national_id",
            Self::GivenName => "given_name",
            Self::Surname => "surname",
            Self::Password => "password",
            Self::PasswordConfirmation => "password_confirmation",
        };
        write!(f, "{s}")
    }
}

/// Non-secret field values held by the attempt (typed or pre-filled).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldValues {
    pub email: String,
    pub national_id: String,
    pub given_name: String,
    pub surname: String,
}

/// The form as submitted.
#[derive(Debug)]
pub struct FormValues {
    pub given_name: String,
    pub surname: String,
    /// As typed; may contain dots, dashes, slashes or spaces.
    pub national_id: String,
    pub email: String,
    pub password: SecretString,
    pub password_confirmation: SecretString,
}

/// A customer whose authentication identity exists but whose profile row
/// could not be inserted.
#[derive(Debug, Clone)]
pub(crate) struct PendingProfile {
    pub customer: Customer,
    pub account: AccountHandle,
}

/// One registration attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct RegistrationAttempt {
    id: Uuid,
    checkpoint: Checkpoint,
    fields: FieldValues,
    verified_email: Option<String>,
    verified_national_id: Option<u64>,
    photo_address: Option<String>,
    pending_profile: Option<PendingProfile>,
}

impl Default for RegistrationAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            checkpoint: Checkpoint::default(),
            fields: FieldValues::default(),
            verified_email: None,
            verified_national_id: None,
            photo_address: None,
            pending_profile: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn fields(&self) -> &FieldValues {
        &self.fields
    }

    pub fn verified_email(&self) -> Option<&str> {
        self.verified_email.as_deref()
    }

    pub fn verified_national_id(&self) -> Option<u64> {
        self.verified_national_id
    }

    pub fn photo_address(&self) -> Option<&str> {
        self.photo_address.as_deref()
    }

    /// Account created without a profile row, awaiting reconciliation.
    pub fn orphaned_account(&self) -> Option<&AccountHandle> {
        self.pending_profile.as_ref().map(|p| &p.account)
    }

    pub fn view(&self) -> ViewState {
        ViewState::for_checkpoint(self.checkpoint)
    }

    /// Record a user edit. Locked fields are rejected.
    ///
    /// Password fields are never held by the attempt; they are only checked
    /// for editability.
    pub fn set_field(&mut self, field: Field, value: &str) -> Result<(), OnboardingError> {
        if !self.view().is_editable(field) {
            return Err(OnboardingError::new(
                ErrorKind::OutOfOrder,
                format!("The {field} field is locked at checkpoint {}", self.checkpoint),
            ));
        }
        let slot = match field {
            Field::Email => &mut self.fields.email,
            Field::NationalId => &mut self.fields.national_id,
            Field::GivenName => &mut self.fields.given_name,
            Field::Surname => &mut self.fields.surname,
            Field::Password | Field::PasswordConfirmation => return Ok(()),
        };
        *slot = value.to_string();
        Ok(())
    }

    /// Advance to the next checkpoint.
    pub(crate) fn advance(&mut self) -> Result<Checkpoint, OnboardingError> {
        let next = self.checkpoint.next().ok_or_else(|| {
            OnboardingError::new(ErrorKind::OutOfOrder, "Registration already submitted")
        })?;
        if !self.checkpoint.can_transition_to(next) {
            return Err(OnboardingError::new(
                ErrorKind::OutOfOrder,
                format!("Cannot transition from {} to {}", self.checkpoint, next),
            ));
        }
        self.checkpoint = next;
        Ok(next)
    }

    pub(crate) fn mark_email_verified(&mut self, email: &str) -> Result<Checkpoint, OnboardingError> {
        self.fields.email = email.to_string();
        self.verified_email = Some(email.to_string());
        self.advance()
    }

    pub(crate) fn mark_national_id_verified(
        &mut self,
        national_id: u64,
    ) -> Result<Checkpoint, OnboardingError> {
        self.fields.national_id = national_id.to_string();
        self.verified_national_id = Some(national_id);
        self.advance()
    }

    /// Pre-fill from a scanned document. Does not verify anything.
    pub(crate) fn prefill(&mut self, scanned: &ScannedIdentity) {
        self.fields.national_id = scanned.national_id.to_string();
        self.fields.given_name = scanned.given_name.clone();
        self.fields.surname = scanned.surname.clone();
    }

    pub(crate) fn set_photo_address(&mut self, address: String) {
        self.photo_address = Some(address);
    }

    pub(crate) fn set_pending_profile(&mut self, pending: PendingProfile) {
        self.pending_profile = Some(pending);
    }

    pub(crate) fn take_pending_profile(&mut self) -> Option<PendingProfile> {
        self.pending_profile.take()
    }

    /// Move to `Submitted` and drop everything the attempt gathered.
    pub(crate) fn finish(&mut self) -> Result<Checkpoint, OnboardingError> {
        let checkpoint = self.advance()?;
        self.fields = FieldValues::default();
        self.verified_email = None;
        self.verified_national_id = None;
        self.photo_address = None;
        self.pending_profile = None;
        Ok(checkpoint)
    }
}
