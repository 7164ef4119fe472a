//! Collaborator traits for the identity store, authentication provider and
//! file store.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::capture::Photo;
use crate::error::{AuthFailure, StoreError, UploadFailure};
use crate::model::Person;

/// Outcome of a lookup by unique key.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The store could not answer.
    Failed(StoreError),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl<T> From<Result<Option<T>, StoreError>> for Lookup<T> {
    fn from(result: Result<Option<T>, StoreError>) -> Self {
        match result {
            Ok(Some(value)) => Self::Found(value),
            Ok(None) => Self::NotFound,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Handle to an authentication identity created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHandle {
    pub id: String,
    pub email: String,
}

/// Person records keyed by email and national ID.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Lookup<Person>;

    async fn find_by_national_id(&self, national_id: u64) -> Lookup<Person>;

    /// Insert a profile row linked to `account`. Returns the assigned id.
    ///
    /// Unique-key violations are reported as [`StoreError::Duplicate`].
    async fn insert_profile(
        &self,
        profile: &Person,
        account: &AccountHandle,
    ) -> Result<String, StoreError>;
}

/// Creates authentication identities.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an identity for `email`/`password`. `Ok(None)` means the
    /// provider accepted the request but returned no usable account.
    async fn create_identity(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<AccountHandle>, AuthFailure>;
}

/// Binary asset storage with public addresses.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload `photo` to `path`, replacing anything already there, and
    /// return its public address.
    async fn upload(&self, path: &str, photo: &Photo) -> Result<String, UploadFailure>;

    /// Public address of `path`, whether or not it exists yet.
    fn public_address(&self, path: &str) -> String;
}
