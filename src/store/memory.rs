//! In-memory collaborators for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::capture::Photo;
use crate::error::{AuthFailure, StoreError, UniqueKey, UploadFailure};
use crate::model::Person;
use crate::store::traits::{AccountHandle, AuthProvider, FileStore, IdentityStore, Lookup};
use crate::validation::is_valid_email;

/// Identity store backed by a map of id → person.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    people: RwLock<HashMap<String, Person>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing record, assigning an id if it has none.
    pub async fn seed(&self, mut person: Person) -> String {
        if person.id.is_empty() {
            person.id = Uuid::new_v4().to_string();
        }
        let id = person.id.clone();
        self.people.write().await.insert(id.clone(), person);
        id
    }

    pub async fn len(&self) -> usize {
        self.people.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.people.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Lookup<Person> {
        let people = self.people.read().await;
        let found = people
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email.trim()))
            .cloned();
        Lookup::from(Ok::<_, StoreError>(found))
    }

    async fn find_by_national_id(&self, national_id: u64) -> Lookup<Person> {
        let people = self.people.read().await;
        let found = people
            .values()
            .find(|p| p.national_id == national_id)
            .cloned();
        Lookup::from(Ok::<_, StoreError>(found))
    }

    async fn insert_profile(
        &self,
        profile: &Person,
        account: &AccountHandle,
    ) -> Result<String, StoreError> {
        let mut people = self.people.write().await;

        if people
            .values()
            .any(|p| p.email.eq_ignore_ascii_case(&profile.email))
        {
            return Err(StoreError::Duplicate {
                key: UniqueKey::Email,
                message: format!("email {} already exists", profile.email),
            });
        }
        if people.values().any(|p| p.national_id == profile.national_id) {
            return Err(StoreError::Duplicate {
                key: UniqueKey::NationalId,
                message: format!("national id {} already exists", profile.national_id),
            });
        }

        let mut row = profile.clone();
        row.id = Uuid::new_v4().to_string();
        let id = row.id.clone();
        people.insert(id.clone(), row);

        tracing::debug!(profile_id = %id, account_id = %account.id, "Inserted profile");
        Ok(id)
    }
}

/// Minimum password length enforced by [`MemoryAuthProvider`].
pub const MIN_PASSWORD_LEN: usize = 6;

/// Authentication provider that keeps accounts in memory.
#[derive(Debug, Default)]
pub struct MemoryAuthProvider {
    accounts: RwLock<HashMap<String, AccountHandle>>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account(&self, email: &str) -> Option<AccountHandle> {
        self.accounts
            .read()
            .await
            .get(&email.to_ascii_lowercase())
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn create_identity(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AccountHandle>, AuthFailure> {
        if !is_valid_email(email) {
            return Err(AuthFailure::Rejected {
                message: "Unable to validate email address: invalid format".to_string(),
            });
        }
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthFailure::Rejected {
                message: format!("Password should be at least {MIN_PASSWORD_LEN} characters."),
            });
        }

        let key = email.to_ascii_lowercase();
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(AuthFailure::EmailTaken {
                message: "User already registered".to_string(),
            });
        }

        let handle = AccountHandle {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
        };
        accounts.insert(key, handle.clone());
        Ok(Some(handle))
    }
}

/// File store that keeps uploads in memory.
#[derive(Debug)]
pub struct MemoryFileStore {
    base_url: String,
    files: RwLock<HashMap<String, Photo>>,
}

impl MemoryFileStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            files: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, path: &str) -> Option<Photo> {
        self.files.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new("memory://photos")
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn upload(&self, path: &str, photo: &Photo) -> Result<String, UploadFailure> {
        if path.is_empty() {
            return Err(UploadFailure::Rejected {
                path: path.to_string(),
                reason: "empty path".to_string(),
            });
        }
        self.files
            .write()
            .await
            .insert(path.to_string(), photo.clone());
        Ok(self.public_address(path))
    }

    fn public_address(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
