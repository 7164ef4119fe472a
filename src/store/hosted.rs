//! Hosted backend: REST adapter for a hosted database/auth/storage service.
//!
//! Talks to three endpoints of the same project:
//! - `/rest/v1/<table>`: profile rows (`eq.`/`ilike.` filters, `Prefer: return=representation`)
//! - `/auth/v1/signup`: email/password identities
//! - `/storage/v1/object/<bucket>/<path>`: photo uploads, public under
//!   `/storage/v1/object/public/<bucket>/<path>`
//!
//! Every request carries the project key both as `apikey` and as a bearer
//! token.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::Photo;
use crate::config::HostedConfig;
use crate::error::{AuthFailure, ConfigError, StoreError, UniqueKey, UploadFailure};
use crate::model::{CustomerStatus, Person, ProfileKind};
use crate::store::traits::{AccountHandle, AuthProvider, FileStore, IdentityStore, Lookup};

/// Profile row as stored in the hosted table.
#[derive(Debug, Serialize, Deserialize)]
struct ProfileRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    account_id: Option<String>,
    profile_kind: ProfileKind,
    given_name: String,
    surname: String,
    national_id: u64,
    email: String,
    #[serde(default)]
    photo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<CustomerStatus>,
}

impl ProfileRow {
    fn new(profile: &Person, account: &AccountHandle) -> Self {
        Self {
            id: None,
            account_id: Some(account.id.clone()),
            profile_kind: profile.profile_kind,
            given_name: profile.given_name.clone(),
            surname: profile.surname.clone(),
            national_id: profile.national_id,
            email: profile.email.clone(),
            photo_url: profile.photo_address.clone(),
            status: profile.status,
        }
    }

    fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn into_person(self) -> Person {
        Person {
            id: self.id_string().unwrap_or_default(),
            profile_kind: self.profile_kind,
            given_name: self.given_name,
            surname: self.surname,
            national_id: self.national_id,
            photo_address: self.photo_url,
            email: self.email,
            status: self.status,
        }
    }
}

/// Error body returned by the table endpoint.
#[derive(Debug, Default, Deserialize)]
struct TableErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Error body returned by the auth endpoint. Different deployments use
/// different message fields.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl AuthErrorBody {
    fn message(self) -> Option<String> {
        self.msg.or(self.message).or(self.error_description)
    }
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// PostgreSQL unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Client for the hosted service, implementing all three store seams.
#[derive(Debug, Clone)]
pub struct HostedBackend {
    http: reqwest::Client,
    config: HostedConfig,
}

impl HostedBackend {
    pub fn new(config: HostedConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "http_client".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, self.config.users_table)
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url,
            self.config.photo_bucket,
            path.trim_start_matches('/')
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.config.api_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    /// `filter` is a complete PostgREST filter such as `eq.42`.
    async fn find_by(&self, column: &str, filter: String) -> Result<Option<Person>, StoreError> {
        let response = self
            .authorized(self.http.get(self.table_url()))
            .query(&[
                (column, filter),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Query(format!("lookup by {column} failed ({status}): {body}")));
        }

        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(rows.into_iter().next().map(ProfileRow::into_person))
    }
}

/// Escape LIKE wildcards so an `ilike.` filter is an exact,
/// case-insensitive match.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn classify_table_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: TableErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.clone().unwrap_or_else(|| body.to_string());

    if status == StatusCode::CONFLICT || parsed.code.as_deref() == Some(UNIQUE_VIOLATION) {
        let detail = format!(
            "{} {}",
            parsed.details.as_deref().unwrap_or_default(),
            message
        );
        let key = if detail.contains("national_id") {
            Some(UniqueKey::NationalId)
        } else if detail.contains("email") {
            Some(UniqueKey::Email)
        } else {
            None
        };
        if let Some(key) = key {
            return StoreError::Duplicate { key, message };
        }
    }
    StoreError::Query(format!("insert failed ({status}): {message}"))
}

#[async_trait]
impl IdentityStore for HostedBackend {
    async fn find_by_email(&self, email: &str) -> Lookup<Person> {
        self.find_by("email", format!("ilike.{}", escape_like(email.trim())))
            .await
            .into()
    }

    async fn find_by_national_id(&self, national_id: u64) -> Lookup<Person> {
        self.find_by("national_id", format!("eq.{national_id}"))
            .await
            .into()
    }

    async fn insert_profile(
        &self,
        profile: &Person,
        account: &AccountHandle,
    ) -> Result<String, StoreError> {
        let response = self
            .authorized(self.http.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&ProfileRow::new(profile, account))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_table_error(status, &body));
        }

        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let id = rows
            .first()
            .and_then(ProfileRow::id_string)
            .ok_or_else(|| StoreError::Query("insert returned no row id".to_string()))?;

        debug!(profile_id = %id, account_id = %account.id, "Profile row created");
        Ok(id)
    }
}

#[async_trait]
impl AuthProvider for HostedBackend {
    async fn create_identity(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AccountHandle>, AuthFailure> {
        let response = self
            .authorized(
                self.http
                    .post(format!("{}/auth/v1/signup", self.config.base_url)),
            )
            .json(&SignUpRequest {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| AuthFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthFailure::Transport(format!("{status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: AuthErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let taken = matches!(
                parsed.error_code.as_deref(),
                Some("user_already_exists" | "email_exists")
            );
            let message = parsed.message().unwrap_or(body);
            return Err(if taken {
                AuthFailure::EmailTaken { message }
            } else {
                AuthFailure::Rejected { message }
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthFailure::Transport(e.to_string()))?;

        // With email confirmation enabled the user object is the body itself.
        let user = match body.get("user") {
            Some(user) if !user.is_null() => user,
            _ => &body,
        };
        let handle = user
            .get("id")
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(|id| AccountHandle {
                id: id.to_string(),
                email: user
                    .get("email")
                    .and_then(|e| e.as_str())
                    .unwrap_or(email)
                    .to_string(),
            });
        Ok(handle)
    }
}

#[async_trait]
impl FileStore for HostedBackend {
    async fn upload(&self, path: &str, photo: &Photo) -> Result<String, UploadFailure> {
        let response = self
            .authorized(self.http.post(self.object_url(path)))
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, photo.content_type.as_str())
            .body(photo.bytes.clone())
            .send()
            .await
            .map_err(|e| UploadFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadFailure::Rejected {
                path: path.to_string(),
                reason: format!("{status}: {body}"),
            });
        }
        debug!(path, bytes = photo.bytes.len(), "Photo uploaded");
        Ok(self.public_address(path))
    }

    fn public_address(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url,
            self.config.photo_bucket,
            path.trim_start_matches('/')
        )
    }
}
