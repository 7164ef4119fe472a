//! Checkpoint → view-state projection.
//!
//! The presentation layer derives which inputs are enabled and which buttons
//! are shown from the checkpoint alone.

use serde::Serialize;

use super::state::{Checkpoint, Field};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub email_enabled: bool,
    pub check_email_visible: bool,
    pub national_id_enabled: bool,
    pub check_id_visible: bool,
    pub scan_enabled: bool,
    /// Given name, surname and the password pair.
    pub personal_data_enabled: bool,
    pub submit_enabled: bool,
}

impl ViewState {
    pub const fn for_checkpoint(checkpoint: Checkpoint) -> Self {
        match checkpoint {
            Checkpoint::AwaitingEmailCheck => Self {
                email_enabled: true,
                check_email_visible: true,
                national_id_enabled: false,
                check_id_visible: false,
                scan_enabled: false,
                personal_data_enabled: false,
                submit_enabled: false,
            },
            Checkpoint::AwaitingIdCheck => Self {
                email_enabled: false,
                check_email_visible: false,
                national_id_enabled: true,
                check_id_visible: true,
                scan_enabled: true,
                personal_data_enabled: true,
                submit_enabled: false,
            },
            Checkpoint::ReadyToSubmit => Self {
                email_enabled: false,
                check_email_visible: false,
                national_id_enabled: false,
                check_id_visible: false,
                scan_enabled: false,
                personal_data_enabled: true,
                submit_enabled: true,
            },
            Checkpoint::Submitted => Self {
                email_enabled: false,
                check_email_visible: false,
                national_id_enabled: false,
                check_id_visible: false,
                scan_enabled: false,
                personal_data_enabled: false,
                submit_enabled: false,
            },
        }
    }

    pub fn is_editable(&self, field: Field) -> bool {
        match field {
            Field::Email => self.email_enabled,
            Field::NationalId => self.national_id_enabled,
            Field::GivenName | Field::Surname | Field::Password | Field::PasswordConfirmation => {
                self.personal_data_enabled
            }
        }
    }
}
