//! OnboardingWorkflow: drives a registration attempt through its
//! checkpoints and runs the submission pipeline.
//!
//! Submission order is fixed: capture photo, upload it, build the customer,
//! create the authentication identity, insert the profile. A failure at any
//! step stops the pipeline; nothing that already happened is rolled back.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capture::PhotoCapture;
use crate::config::OnboardingConfig;
use crate::error::{AuthFailure, ErrorKind, FieldError, OnboardingError, ScanError, StoreError, UniqueKey};
use crate::model::{Customer, Person};
use crate::scanner::{DocumentScanner, ScannedIdentity, SymbolFormat, parse_payload};
use crate::store::{AccountHandle, AuthProvider, FileStore, IdentityStore, Lookup};
use crate::validation::{is_valid_email, validate_form};

use super::state::{Checkpoint, Field, FormValues, PendingProfile, RegistrationAttempt};
use super::view::ViewState;

/// External collaborators the workflow calls into.
#[derive(Clone)]
pub struct OnboardingDeps {
    pub identities: Arc<dyn IdentityStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub files: Arc<dyn FileStore>,
    pub scanner: Arc<dyn DocumentScanner>,
    pub camera: Arc<dyn PhotoCapture>,
}

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub customer: Customer,
    pub account: AccountHandle,
}

pub struct OnboardingWorkflow {
    deps: OnboardingDeps,
    config: OnboardingConfig,
    attempt: RegistrationAttempt,
}

fn out_of_order(message: impl Into<String>) -> OnboardingError {
    OnboardingError::new(ErrorKind::OutOfOrder, message)
}

impl OnboardingWorkflow {
    pub fn new(deps: OnboardingDeps, config: OnboardingConfig) -> Self {
        Self {
            deps,
            config,
            attempt: RegistrationAttempt::new(),
        }
    }

    pub fn attempt(&self) -> &RegistrationAttempt {
        &self.attempt
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.attempt.checkpoint()
    }

    pub fn view(&self) -> ViewState {
        self.attempt.view()
    }

    pub fn set_field(&mut self, field: Field, value: &str) -> Result<(), OnboardingError> {
        self.attempt.set_field(field, value)
    }

    /// Abandon the current attempt and start a fresh one.
    pub fn reset(&mut self) {
        if let Some(account) = self.attempt.orphaned_account() {
            warn!(
                attempt = %self.attempt.id(),
                account_id = %account.id,
                "Discarding attempt with an identity that has no profile"
            );
        }
        self.attempt = RegistrationAttempt::new();
        debug!(attempt = %self.attempt.id(), "New registration attempt");
    }

    /// Verify `email` is not registered yet. On success the email is locked
    /// and the attempt moves to `AwaitingIdCheck`.
    ///
    /// Repeating the check for the already verified email is a no-op.
    pub async fn check_email_available(&mut self, email: &str) -> Result<Checkpoint, OnboardingError> {
        let email = email.trim();
        if email.is_empty() || !is_valid_email(email) {
            return Err(OnboardingError::invalid_form(vec![FieldError {
                field: Field::Email,
                message: "Enter a valid email address".to_string(),
            }]));
        }

        match self.attempt.checkpoint() {
            Checkpoint::AwaitingEmailCheck => {}
            Checkpoint::Submitted => {
                return Err(out_of_order("Registration already submitted"));
            }
            checkpoint => {
                return match self.attempt.verified_email() {
                    Some(verified) if verified.eq_ignore_ascii_case(email) => Ok(checkpoint),
                    _ => Err(out_of_order("The email is locked once verified")),
                };
            }
        }

        match self.deps.identities.find_by_email(email).await {
            Lookup::Found(_) => {
                info!(attempt = %self.attempt.id(), "Email already registered");
                Err(OnboardingError::new(
                    ErrorKind::EmailAlreadyRegistered,
                    "This email is already registered",
                ))
            }
            Lookup::NotFound => {
                let checkpoint = self.attempt.mark_email_verified(email)?;
                info!(attempt = %self.attempt.id(), %checkpoint, "Email verified");
                Ok(checkpoint)
            }
            Lookup::Failed(e) => {
                warn!(attempt = %self.attempt.id(), error = %e, "Email lookup failed");
                Err(OnboardingError::new(ErrorKind::UnknownError, e.to_string()))
            }
        }
    }

    /// Verify `national_id` is not registered yet. On success the ID is locked
    /// and the attempt moves to `ReadyToSubmit`.
    pub async fn check_id_available(&mut self, national_id: u64) -> Result<Checkpoint, OnboardingError> {
        if national_id == 0 {
            return Err(OnboardingError::invalid_form(vec![FieldError {
                field: Field::NationalId,
                message: "National ID must be positive".to_string(),
            }]));
        }

        match self.attempt.checkpoint() {
            Checkpoint::AwaitingIdCheck => {}
            Checkpoint::AwaitingEmailCheck => {
                return Err(out_of_order("Verify the email before the national ID"));
            }
            Checkpoint::Submitted => {
                return Err(out_of_order("Registration already submitted"));
            }
            checkpoint @ Checkpoint::ReadyToSubmit => {
                return if self.attempt.verified_national_id() == Some(national_id) {
                    Ok(checkpoint)
                } else {
                    Err(out_of_order("The national ID is locked once verified"))
                };
            }
        }

        match self.deps.identities.find_by_national_id(national_id).await {
            Lookup::Found(_) => {
                info!(attempt = %self.attempt.id(), "National ID already registered");
                Err(OnboardingError::new(
                    ErrorKind::IdAlreadyRegistered,
                    "This national ID is already registered",
                ))
            }
            Lookup::NotFound => {
                let checkpoint = self.attempt.mark_national_id_verified(national_id)?;
                info!(attempt = %self.attempt.id(), %checkpoint, "National ID verified");
                Ok(checkpoint)
            }
            Lookup::Failed(e) => {
                warn!(attempt = %self.attempt.id(), error = %e, "National ID lookup failed");
                Err(OnboardingError::new(ErrorKind::UnknownError, e.to_string()))
            }
        }
    }

    /// Scan the identity document and pre-fill the ID and names.
    ///
    /// Only pre-fills; the ID still has to pass `check_id_available`.
    pub async fn scan_document(&mut self) -> Result<ScannedIdentity, OnboardingError> {
        if !self.view().scan_enabled {
            return Err(out_of_order(
                "Document scan is only available while entering the national ID",
            ));
        }

        let raw = match self.deps.scanner.scan(&[SymbolFormat::Pdf417]).await {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) | Err(ScanError::Aborted) => {
                debug!(attempt = %self.attempt.id(), "Scan produced no payload");
                return Err(OnboardingError::new(
                    ErrorKind::ScanAborted,
                    "The scan was cancelled or read nothing",
                ));
            }
            Err(ScanError::Parse { reason }) => {
                return Err(OnboardingError::new(ErrorKind::ScanParseError, reason));
            }
            Err(e @ ScanError::Unavailable(_)) => {
                warn!(attempt = %self.attempt.id(), error = %e, "Scanner unavailable");
                return Err(OnboardingError::new(ErrorKind::UnknownError, e.to_string()));
            }
        };

        let scanned = parse_payload(&raw).map_err(|e| {
            warn!(attempt = %self.attempt.id(), error = %e, "Unreadable document payload");
            OnboardingError::new(ErrorKind::ScanParseError, e.to_string())
        })?;
        self.attempt.prefill(&scanned);
        info!(attempt = %self.attempt.id(), "Document scanned");
        Ok(scanned)
    }

    /// Submit the registration.
    pub async fn submit(&mut self, form: FormValues) -> Result<Registration, OnboardingError> {
        if let Some(account) = self.attempt.orphaned_account() {
            return Err(out_of_order(
                "A profile insert is pending; resume it or start a new attempt",
            )
            .with_orphaned_account(account.id.clone()));
        }
        if self.attempt.checkpoint() != Checkpoint::ReadyToSubmit {
            return Err(out_of_order(format!(
                "Cannot submit at checkpoint {}",
                self.attempt.checkpoint()
            )));
        }

        let form = validate_form(form).map_err(OnboardingError::invalid_form)?;
        let email_matches = self
            .attempt
            .verified_email()
            .is_some_and(|v| v.eq_ignore_ascii_case(&form.email));
        if !email_matches {
            return Err(out_of_order("The email differs from the verified one"));
        }
        if self.attempt.verified_national_id() != Some(form.national_id) {
            return Err(out_of_order("The national ID differs from the verified one"));
        }

        let attempt_id = self.attempt.id();

        // 1. Photo
        let photo = match self.deps.camera.take_photo().await {
            Ok(Some(photo)) => photo,
            Ok(None) => {
                info!(attempt = %attempt_id, "Photo capture cancelled");
                return Err(OnboardingError::new(
                    ErrorKind::PhotoCaptureCancelled,
                    "A photo of the customer is required",
                ));
            }
            Err(e) => {
                warn!(attempt = %attempt_id, error = %e, "Camera failed");
                return Err(OnboardingError::new(ErrorKind::UnknownError, e.to_string()));
            }
        };

        // 2. Upload
        let path = self.config.photo_path(form.national_id);
        let photo_address = self.deps.files.upload(&path, &photo).await.map_err(|e| {
            warn!(attempt = %attempt_id, path = %path, error = %e, "Photo upload failed");
            OnboardingError::new(ErrorKind::UploadError, format!("Could not upload the photo: {e}"))
        })?;
        self.attempt.set_photo_address(photo_address.clone());
        debug!(attempt = %attempt_id, %photo_address, "Photo uploaded");

        // 3. Customer
        let customer = Customer::new(
            form.given_name,
            form.surname,
            form.national_id,
            form.email.clone(),
            photo_address,
            self.config.initial_status,
        );

        // 4. Identity
        let account = match self.deps.auth.create_identity(&form.email, &form.password).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!(attempt = %attempt_id, "Auth provider returned no user");
                return Err(OnboardingError::new(
                    ErrorKind::AuthNullUser,
                    "The account could not be created",
                ));
            }
            Err(AuthFailure::EmailTaken { message }) => {
                return Err(OnboardingError::new(ErrorKind::EmailAlreadyRegistered, message));
            }
            Err(AuthFailure::Rejected { message }) => {
                info!(attempt = %attempt_id, %message, "Auth provider rejected sign-up");
                return Err(OnboardingError::new(ErrorKind::AuthError, message));
            }
            Err(e @ AuthFailure::Transport(_)) => {
                warn!(attempt = %attempt_id, error = %e, "Auth provider unreachable");
                return Err(OnboardingError::new(ErrorKind::AuthError, e.to_string()));
            }
        };
        info!(attempt = %attempt_id, account_id = %account.id, "Identity created");

        // 5. Profile
        self.insert_profile(customer, account).await
    }

    /// Retry the profile insert for an identity created by a failed submit.
    pub async fn resume_profile_insert(&mut self) -> Result<Registration, OnboardingError> {
        let Some(pending) = self.attempt.take_pending_profile() else {
            return Err(out_of_order("No profile insert is pending"));
        };
        info!(
            attempt = %self.attempt.id(),
            account_id = %pending.account.id,
            "Retrying profile insert"
        );
        self.insert_profile(pending.customer, pending.account).await
    }

    async fn insert_profile(
        &mut self,
        mut customer: Customer,
        account: AccountHandle,
    ) -> Result<Registration, OnboardingError> {
        match self.deps.identities.insert_profile(customer.person(), &account).await {
            Ok(id) => {
                customer.assign_id(id);
                self.attempt.finish()?;
                info!(
                    profile_id = %customer.person().id,
                    account_id = %account.id,
                    "Customer registered"
                );
                Ok(Registration { customer, account })
            }
            Err(e) => {
                warn!(
                    attempt = %self.attempt.id(),
                    account_id = %account.id,
                    error = %e,
                    "Identity exists without a profile"
                );
                let kind = match &e {
                    StoreError::Duplicate { key: UniqueKey::Email, .. } => {
                        ErrorKind::EmailAlreadyRegistered
                    }
                    StoreError::Duplicate { key: UniqueKey::NationalId, .. } => {
                        ErrorKind::IdAlreadyRegistered
                    }
                    _ => ErrorKind::ProfileInsertError,
                };
                let err = OnboardingError::new(kind, format!("Could not save the profile: {e}"))
                    .with_orphaned_account(account.id.clone());
                self.attempt.set_pending_profile(PendingProfile { customer, account });
                Err(err)
            }
        }
    }

    /// Look up a registered person by email.
    pub async fn find_registered_by_email(&self, email: &str) -> Result<Person, OnboardingError> {
        match self.deps.identities.find_by_email(email.trim()).await {
            Lookup::Found(person) => Ok(person),
            Lookup::NotFound => Err(OnboardingError::new(
                ErrorKind::EmailNotRegistered,
                "No account is registered with this email",
            )),
            Lookup::Failed(e) => Err(OnboardingError::new(ErrorKind::UnknownError, e.to_string())),
        }
    }

    /// Look up a registered person by national ID.
    pub async fn find_registered_by_national_id(
        &self,
        national_id: u64,
    ) -> Result<Person, OnboardingError> {
        match self.deps.identities.find_by_national_id(national_id).await {
            Lookup::Found(person) => Ok(person),
            Lookup::NotFound => Err(OnboardingError::new(
                ErrorKind::IdNotRegistered,
                "No account is registered with this national ID",
            )),
            Lookup::Failed(e) => Err(OnboardingError::new(ErrorKind::UnknownError, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::*;
    use crate::capture::Photo;
    use crate::error::{CaptureError, UploadFailure};
    use crate::model::{CustomerStatus, ProfileKind};
    use crate::store::{MemoryAuthProvider, MemoryFileStore, MemoryIdentityStore};

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    fn record(calls: &Calls, call: &'static str) {
        calls.lock().unwrap().push(call);
    }

    /// Wraps the in-memory stores and records every collaborator call.
    struct Recording<T> {
        inner: T,
        calls: Calls,
        fail: bool,
    }

    #[async_trait]
    impl IdentityStore for Recording<MemoryIdentityStore> {
        async fn find_by_email(&self, email: &str) -> Lookup<Person> {
            record(&self.calls, "find_by_email");
            self.inner.find_by_email(email).await
        }

        async fn find_by_national_id(&self, national_id: u64) -> Lookup<Person> {
            record(&self.calls, "find_by_national_id");
            self.inner.find_by_national_id(national_id).await
        }

        async fn insert_profile(
            &self,
            profile: &Person,
            account: &AccountHandle,
        ) -> Result<String, StoreError> {
            record(&self.calls, "insert_profile");
            if self.fail {
                return Err(StoreError::Connection("connection reset".into()));
            }
            self.inner.insert_profile(profile, account).await
        }
    }

    #[async_trait]
    impl AuthProvider for Recording<MemoryAuthProvider> {
        async fn create_identity(
            &self,
            email: &str,
            password: &SecretString,
        ) -> Result<Option<AccountHandle>, AuthFailure> {
            record(&self.calls, "create_identity");
            if self.fail {
                return Ok(None);
            }
            self.inner.create_identity(email, password).await
        }
    }

    #[async_trait]
    impl FileStore for Recording<MemoryFileStore> {
        async fn upload(&self, path: &str, photo: &Photo) -> Result<String, UploadFailure> {
            record(&self.calls, "upload");
            if self.fail {
                return Err(UploadFailure::Transport("storage offline".into()));
            }
            self.inner.upload(path, photo).await
        }

        fn public_address(&self, path: &str) -> String {
            self.inner.public_address(path)
        }
    }

    struct FakeCamera {
        calls: Calls,
        photo: Option<Photo>,
    }

    #[async_trait]
    impl PhotoCapture for FakeCamera {
        async fn take_photo(&self) -> Result<Option<Photo>, CaptureError> {
            record(&self.calls, "take_photo");
            Ok(self.photo.clone())
        }
    }

    struct FakeScanner {
        payload: Option<String>,
        formats: Mutex<Vec<SymbolFormat>>,
    }

    #[async_trait]
    impl DocumentScanner for FakeScanner {
        async fn scan(&self, formats: &[SymbolFormat]) -> Result<Option<String>, ScanError> {
            self.formats.lock().unwrap().extend_from_slice(formats);
            Ok(self.payload.clone())
        }
    }

    /// Failure switches for the harness collaborators.
    #[derive(Default)]
    struct Faults {
        no_photo: bool,
        upload: bool,
        null_user: bool,
        insert: bool,
        scan_payload: Option<String>,
    }

    struct Harness {
        workflow: OnboardingWorkflow,
        calls: Calls,
        identities: Arc<Recording<MemoryIdentityStore>>,
        auth: Arc<Recording<MemoryAuthProvider>>,
        files: Arc<Recording<MemoryFileStore>>,
        scanner: Arc<FakeScanner>,
    }

    impl Harness {
        async fn new(faults: Faults) -> Self {
            let calls: Calls = Arc::default();
            let existing = MemoryIdentityStore::new();
            existing
                .seed(Person {
                    id: String::new(),
                    profile_kind: ProfileKind::Customer,
                    given_name: "Dup".into(),
                    surname: "Licado".into(),
                    national_id: 20999888,
                    photo_address: String::new(),
                    email: "dup@x.com".into(),
                    status: Some(CustomerStatus::Approved),
                })
                .await;
            let identities = Arc::new(Recording {
                inner: existing,
                calls: calls.clone(),
                fail: faults.insert,
            });
            let auth = Arc::new(Recording {
                inner: MemoryAuthProvider::new(),
                calls: calls.clone(),
                fail: faults.null_user,
            });
            let files = Arc::new(Recording {
                inner: MemoryFileStore::new("https://cdn.test"),
                calls: calls.clone(),
                fail: faults.upload,
            });
            let scanner = Arc::new(FakeScanner {
                payload: faults.scan_payload,
                formats: Mutex::default(),
            });
            let camera = Arc::new(FakeCamera {
                calls: calls.clone(),
                photo: (!faults.no_photo).then(|| Photo::jpeg(vec![0xff, 0xd8])),
            });

            let deps = OnboardingDeps {
                identities: identities.clone(),
                auth: auth.clone(),
                files: files.clone(),
                scanner: scanner.clone(),
                camera,
            };
            Self {
                workflow: OnboardingWorkflow::new(deps, OnboardingConfig::default()),
                calls,
                identities,
                auth,
                files,
                scanner,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        async fn ready(faults: Faults) -> Self {
            let mut h = Self::new(faults).await;
            h.workflow.check_email_available("new@x.com").await.unwrap();
            h.workflow.check_id_available(30111222).await.unwrap();
            h.clear_calls();
            h
        }
    }

    fn form(password: &str) -> FormValues {
        FormValues {
            given_name: "Ana".into(),
            surname: "Gómez".into(),
            national_id: "30.111.222".into(),
            email: "new@x.com".into(),
            password: SecretString::from(password.to_string()),
            password_confirmation: SecretString::from(password.to_string()),
        }
    }

    #[tokio::test]
    async fn happy_path_registers_customer() {
        let mut h = Harness::new(Faults::default()).await;

        assert_eq!(
            h.workflow.check_email_available("new@x.com").await.unwrap(),
            Checkpoint::AwaitingIdCheck
        );
        assert!(!h.workflow.view().email_enabled);
        assert!(h.workflow.view().national_id_enabled);

        assert_eq!(
            h.workflow.check_id_available(30111222).await.unwrap(),
            Checkpoint::ReadyToSubmit
        );
        assert!(h.workflow.view().submit_enabled);

        let registration = h.workflow.submit(form("secret1")).await.unwrap();
        let person = registration.customer.person();
        assert!(person.is_persisted());
        assert_eq!(person.national_id, 30111222);
        assert_eq!(person.photo_address, "https://cdn.test/usuarios/cliente-30111222");
        assert_eq!(registration.customer.status(), CustomerStatus::Registered);

        assert_eq!(h.workflow.checkpoint(), Checkpoint::Submitted);
        assert!(h.workflow.attempt().verified_email().is_none());
        assert!(h.files.inner.get("usuarios/cliente-30111222").await.is_some());
        assert!(h.auth.inner.account("new@x.com").await.is_some());
        assert!(h.identities.inner.find_by_email("new@x.com").await.is_found());
    }

    #[tokio::test]
    async fn submission_steps_run_in_order() {
        let mut h = Harness::ready(Faults::default()).await;
        h.workflow.submit(form("secret1")).await.unwrap();
        assert_eq!(
            h.calls(),
            vec!["take_photo", "upload", "create_identity", "insert_profile"]
        );
    }

    #[tokio::test]
    async fn registered_email_keeps_checkpoint() {
        let mut h = Harness::new(Faults::default()).await;
        let err = h.workflow.check_email_available("dup@x.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmailAlreadyRegistered);
        assert_eq!(h.workflow.checkpoint(), Checkpoint::AwaitingEmailCheck);
        assert!(h.workflow.view().email_enabled);

        // Retry with another email succeeds.
        h.workflow.check_email_available("new@x.com").await.unwrap();
    }

    #[tokio::test]
    async fn registered_id_keeps_checkpoint() {
        let mut h = Harness::new(Faults::default()).await;
        h.workflow.check_email_available("new@x.com").await.unwrap();
        let err = h.workflow.check_id_available(20999888).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdAlreadyRegistered);
        assert_eq!(h.workflow.checkpoint(), Checkpoint::AwaitingIdCheck);
    }

    #[tokio::test]
    async fn id_check_before_email_check_is_refused() {
        let mut h = Harness::new(Faults::default()).await;
        let err = h.workflow.check_id_available(30111222).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn repeated_checks_are_idempotent() {
        let mut h = Harness::new(Faults::default()).await;
        h.workflow.check_email_available("new@x.com").await.unwrap();
        h.clear_calls();
        assert_eq!(
            h.workflow.check_email_available("NEW@x.com").await.unwrap(),
            Checkpoint::AwaitingIdCheck
        );
        assert!(h.calls().is_empty());

        let err = h.workflow.check_email_available("other@x.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);

        h.workflow.check_id_available(30111222).await.unwrap();
        assert_eq!(
            h.workflow.check_id_available(30111222).await.unwrap(),
            Checkpoint::ReadyToSubmit
        );
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_without_lookup() {
        let mut h = Harness::new(Faults::default()).await;
        let err = h.workflow.check_email_available("not-an-email").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidForm);
        assert_eq!(err.field_errors()[0].field, Field::Email);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn submit_before_checks_is_refused() {
        let mut h = Harness::new(Faults::default()).await;
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn submit_with_unverified_values_is_refused() {
        let mut h = Harness::ready(Faults::default()).await;
        let mut other = form("secret1");
        other.national_id = "30111223".into();
        let err = h.workflow.submit(other).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_form_reports_every_field() {
        let mut h = Harness::ready(Faults::default()).await;
        let mut bad = form("secret1");
        bad.given_name = "4na".into();
        bad.password_confirmation = SecretString::from("different".to_string());
        let err = h.workflow.submit(bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidForm);
        let fields: Vec<Field> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::GivenName, Field::PasswordConfirmation]);
        assert!(h.calls().is_empty());
        assert_eq!(h.workflow.checkpoint(), Checkpoint::ReadyToSubmit);
    }

    #[tokio::test]
    async fn cancelled_photo_stops_before_upload() {
        let mut h = Harness::ready(Faults {
            no_photo: true,
            ..Faults::default()
        })
        .await;
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PhotoCaptureCancelled);
        assert_eq!(h.calls(), vec!["take_photo"]);
        assert!(h.files.inner.is_empty().await);
        assert!(h.auth.inner.is_empty().await);
        assert_eq!(h.workflow.checkpoint(), Checkpoint::ReadyToSubmit);
    }

    #[tokio::test]
    async fn upload_failure_stops_before_identity() {
        let mut h = Harness::ready(Faults {
            upload: true,
            ..Faults::default()
        })
        .await;
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UploadError);
        assert_eq!(h.calls(), vec!["take_photo", "upload"]);
        assert!(h.workflow.attempt().photo_address().is_none());
    }

    #[tokio::test]
    async fn weak_password_stops_before_profile() {
        let mut h = Harness::ready(Faults::default()).await;
        // The form accepts any matching pair; the provider enforces strength.
        let err = h.workflow.submit(form("12345")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthError);
        assert_eq!(h.calls(), vec!["take_photo", "upload", "create_identity"]);
        assert!(!h.identities.inner.find_by_email("new@x.com").await.is_found());
        // The photo stays uploaded.
        assert_eq!(h.files.inner.len().await, 1);
        assert_eq!(h.workflow.checkpoint(), Checkpoint::ReadyToSubmit);
    }

    #[tokio::test]
    async fn null_user_stops_before_profile() {
        let mut h = Harness::ready(Faults {
            null_user: true,
            ..Faults::default()
        })
        .await;
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthNullUser);
        assert!(!err.is_recoverable());
        assert_eq!(h.calls(), vec!["take_photo", "upload", "create_identity"]);
    }

    #[tokio::test]
    async fn taken_email_at_sign_up_maps_to_already_registered() {
        let mut h = Harness::ready(Faults::default()).await;
        h.auth
            .inner
            .create_identity("new@x.com", &SecretString::from("secret1".to_string()))
            .await
            .unwrap();
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmailAlreadyRegistered);
        assert!(!h.calls().contains(&"insert_profile"));
    }

    #[tokio::test]
    async fn id_taken_between_check_and_insert_keeps_the_orphan() {
        let mut h = Harness::ready(Faults::default()).await;
        h.identities
            .inner
            .seed(Person {
                id: String::new(),
                profile_kind: ProfileKind::Customer,
                given_name: "Otra".into(),
                surname: "Persona".into(),
                national_id: 30111222,
                photo_address: String::new(),
                email: "other@x.com".into(),
                status: Some(CustomerStatus::Approved),
            })
            .await;

        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdAlreadyRegistered);
        assert!(err.orphaned_account().is_some());
        assert!(!err.is_recoverable());
        assert_eq!(h.calls().last(), Some(&"insert_profile"));
        assert!(h.workflow.attempt().orphaned_account().is_some());

        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        assert_eq!(h.auth.inner.len().await, 1);
    }

    #[tokio::test]
    async fn profile_failure_leaves_orphan_until_resumed() {
        let mut h = Harness::ready(Faults {
            insert: true,
            ..Faults::default()
        })
        .await;
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProfileInsertError);
        let account_id = err.orphaned_account().unwrap().to_string();
        assert_eq!(h.auth.inner.account("new@x.com").await.unwrap().id, account_id);
        assert_eq!(
            h.workflow.attempt().orphaned_account().map(|a| a.id.as_str()),
            Some(account_id.as_str())
        );

        // A second submit would create a second identity.
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        assert_eq!(err.orphaned_account(), Some(account_id.as_str()));

        // Still failing: the orphan is kept.
        let err = h.workflow.resume_profile_insert().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProfileInsertError);
        assert!(h.workflow.attempt().orphaned_account().is_some());
        assert_eq!(h.auth.inner.len().await, 1);
    }

    #[tokio::test]
    async fn resume_without_pending_insert_is_refused() {
        let mut h = Harness::new(Faults::default()).await;
        let err = h.workflow.resume_profile_insert().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
    }

    #[tokio::test]
    async fn submitted_attempt_refuses_further_calls_until_reset() {
        let mut h = Harness::ready(Faults::default()).await;
        h.workflow.submit(form("secret1")).await.unwrap();

        let err = h.workflow.check_email_available("again@x.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        let err = h.workflow.submit(form("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);

        h.workflow.reset();
        assert_eq!(h.workflow.checkpoint(), Checkpoint::AwaitingEmailCheck);
        let err = h.workflow.check_email_available("new@x.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmailAlreadyRegistered);
    }

    #[tokio::test]
    async fn scan_prefills_without_verifying() {
        let mut h = Harness::new(Faults {
            scan_payload: Some("00123456789@PEREZ@JUAN CARLOS@M@30111222@A@01/01/1990@01/01/2015".into()),
            ..Faults::default()
        })
        .await;
        let err = h.workflow.scan_document().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);

        h.workflow.check_email_available("new@x.com").await.unwrap();
        let scanned = h.workflow.scan_document().await.unwrap();
        assert_eq!(scanned.national_id, 30111222);
        assert_eq!(h.scanner.formats.lock().unwrap().as_slice(), &[SymbolFormat::Pdf417]);

        let fields = h.workflow.attempt().fields();
        assert_eq!(fields.national_id, "30111222");
        assert_eq!(fields.surname, "Perez");
        assert_eq!(fields.given_name, "Juan Carlos");
        assert_eq!(h.workflow.checkpoint(), Checkpoint::AwaitingIdCheck);
    }

    #[tokio::test]
    async fn empty_scan_is_aborted() {
        let mut h = Harness::new(Faults::default()).await;
        h.workflow.check_email_available("new@x.com").await.unwrap();
        let err = h.workflow.scan_document().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScanAborted);
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn garbled_scan_is_a_parse_error() {
        let mut h = Harness::new(Faults {
            scan_payload: Some("not a document".into()),
            ..Faults::default()
        })
        .await;
        h.workflow.check_email_available("new@x.com").await.unwrap();
        let err = h.workflow.scan_document().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScanParseError);
        assert!(h.workflow.attempt().fields().national_id.is_empty());
    }

    #[tokio::test]
    async fn lookups_report_not_registered() {
        let h = Harness::new(Faults::default()).await;
        let person = h.workflow.find_registered_by_email("dup@x.com").await.unwrap();
        assert_eq!(person.national_id, 20999888);

        let err = h.workflow.find_registered_by_email("nobody@x.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmailNotRegistered);
        let err = h.workflow.find_registered_by_national_id(1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdNotRegistered);
    }
}
