//! Console front end: a stdin/stdout registration session for a staff
//! member at a terminal.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::capture::{Photo, PhotoCapture};
use crate::error::{CaptureError, OnboardingError, ScanError};
use crate::onboarding::{Checkpoint, Field, FormValues, OnboardingWorkflow, Registration};
use crate::scanner::{DocumentScanner, SymbolFormat};
use crate::validation::parse_national_id;

/// Line-oriented prompt reader shared by the session and the console
/// collaborators.
pub struct Console<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl Console<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> Console<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// Print `prompt` and read one trimmed line. `None` at end of input.
    pub async fn ask(&self, prompt: &str) -> io::Result<Option<String>> {
        eprint!("{prompt}: ");
        let line = self.lines.lock().await.next_line().await?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    /// Like [`ask`](Self::ask), but an empty answer keeps `current`.
    async fn ask_or_keep(&self, prompt: &str, current: &str) -> io::Result<Option<String>> {
        let prompt = if current.is_empty() {
            prompt.to_string()
        } else {
            format!("{prompt} [{current}]")
        };
        Ok(self.ask(&prompt).await?.map(|answer| {
            if answer.is_empty() {
                current.to_string()
            } else {
                answer
            }
        }))
    }

    async fn confirm(&self, prompt: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{prompt} [y/N]")).await?;
        Ok(matches!(answer.as_deref(), Some("y" | "Y" | "yes")))
    }
}

/// Reads a pasted barcode payload in place of an optical scanner.
pub struct ConsoleScanner<R = BufReader<Stdin>> {
    console: Arc<Console<R>>,
}

impl<R> ConsoleScanner<R> {
    pub fn new(console: Arc<Console<R>>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> DocumentScanner for ConsoleScanner<R> {
    async fn scan(&self, formats: &[SymbolFormat]) -> Result<Option<String>, ScanError> {
        tracing::debug!(?formats, "Waiting for pasted barcode");
        let line = self
            .console
            .ask("Paste the document barcode (empty to cancel)")
            .await
            .map_err(|e| ScanError::Unavailable(e.to_string()))?;
        Ok(line.filter(|l| !l.is_empty()))
    }
}

/// Loads the customer photo from a file path typed at the console.
pub struct FilePhotoCapture<R = BufReader<Stdin>> {
    console: Arc<Console<R>>,
}

impl<R> FilePhotoCapture<R> {
    pub fn new(console: Arc<Console<R>>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> PhotoCapture for FilePhotoCapture<R> {
    async fn take_photo(&self) -> Result<Option<Photo>, CaptureError> {
        let Some(path) = self
            .console
            .ask("Path to the customer photo (empty to cancel)")
            .await?
            .filter(|p| !p.is_empty())
        else {
            return Ok(None);
        };
        let path = Path::new(&path);
        let bytes = tokio::fs::read(path).await?;
        let extension = path.extension().and_then(|e| e.to_str());
        Ok(Some(Photo::from_file_bytes(bytes, extension)))
    }
}

fn report(err: &OnboardingError) {
    eprintln!("✗ {}", err.message());
    for field_error in err.field_errors() {
        eprintln!("   {}: {}", field_error.field, field_error.message);
    }
}

/// Run registration attempts until end of input or the operator stops.
pub async fn run_session<R: AsyncBufRead + Unpin + Send>(
    workflow: &mut OnboardingWorkflow,
    console: &Console<R>,
) -> io::Result<()> {
    loop {
        if !register_one(workflow, console).await? {
            return Ok(());
        }
        if !console.confirm("Register another customer?").await? {
            return Ok(());
        }
        workflow.reset();
    }
}

/// One attempt. Returns `false` when input ended before it finished.
async fn register_one<R: AsyncBufRead + Unpin + Send>(
    workflow: &mut OnboardingWorkflow,
    console: &Console<R>,
) -> io::Result<bool> {
    // Email
    while workflow.checkpoint() == Checkpoint::AwaitingEmailCheck {
        let Some(email) = console.ask("Email").await? else {
            return Ok(false);
        };
        if let Err(e) = workflow.set_field(Field::Email, &email) {
            report(&e);
        }
        match workflow.check_email_available(&email).await {
            Ok(_) => eprintln!("✓ Email available"),
            Err(e) => report(&e),
        }
    }

    // National ID
    while workflow.checkpoint() == Checkpoint::AwaitingIdCheck {
        let current = workflow.attempt().fields().national_id.clone();
        let Some(answer) = console
            .ask_or_keep("National ID (or 'scan')", &current)
            .await?
        else {
            return Ok(false);
        };
        if answer.eq_ignore_ascii_case("scan") {
            match workflow.scan_document().await {
                Ok(scanned) => eprintln!(
                    "✓ Read {} {} ({})",
                    scanned.given_name, scanned.surname, scanned.national_id
                ),
                Err(e) => report(&e),
            }
            continue;
        }
        if let Err(e) = workflow.set_field(Field::NationalId, &answer) {
            report(&e);
        }
        match parse_national_id(&answer) {
            Ok(national_id) => match workflow.check_id_available(national_id).await {
                Ok(_) => eprintln!("✓ National ID available"),
                Err(e) => report(&e),
            },
            Err(message) => eprintln!("✗ {message}"),
        }
    }

    // Personal data and submit
    while workflow.checkpoint() == Checkpoint::ReadyToSubmit {
        if workflow.attempt().orphaned_account().is_some() {
            if !console.confirm("Retry saving the profile?").await? {
                return Ok(true);
            }
            match workflow.resume_profile_insert().await {
                Ok(registration) => announce(&registration),
                Err(e) => report(&e),
            }
            continue;
        }

        let fields = workflow.attempt().fields().clone();
        let Some(given_name) = console.ask_or_keep("Given name", &fields.given_name).await? else {
            return Ok(false);
        };
        let Some(surname) = console.ask_or_keep("Surname", &fields.surname).await? else {
            return Ok(false);
        };
        let Some(password) = console.ask("Password").await? else {
            return Ok(false);
        };
        let Some(confirmation) = console.ask("Repeat password").await? else {
            return Ok(false);
        };
        for (field, value) in [(Field::GivenName, &given_name), (Field::Surname, &surname)] {
            if let Err(e) = workflow.set_field(field, value) {
                report(&e);
            }
        }

        let form = FormValues {
            given_name,
            surname,
            national_id: fields.national_id,
            email: fields.email,
            password: SecretString::from(password),
            password_confirmation: SecretString::from(confirmation),
        };
        match workflow.submit(form).await {
            Ok(registration) => announce(&registration),
            Err(e) => report(&e),
        }
    }
    Ok(true)
}

fn announce(registration: &Registration) {
    let person = registration.customer.person();
    eprintln!(
        "✓ Registered {} ({}) with status {}",
        person.full_name(),
        person.email,
        registration.customer.status()
    );
}
