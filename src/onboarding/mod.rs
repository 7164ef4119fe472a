//! Client onboarding: a staff member registers a new customer.
//!
//! The attempt moves through fixed checkpoints: the email is checked and
//! locked, which opens the national ID and personal data; the national ID is
//! then checked and locked, which enables submission. Submission captures a
//! photo, uploads it, creates the authentication identity and inserts the
//! customer profile.

pub mod state;
pub mod view;
pub mod workflow;

pub use state::{Checkpoint, Field, FieldValues, FormValues, RegistrationAttempt};
pub use view::ViewState;
pub use workflow::{OnboardingDeps, OnboardingWorkflow, Registration};
