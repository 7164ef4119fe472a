//! libSQL backend: `IdentityStore` over a local or in-memory database.
//!
//! Email and national ID are UNIQUE columns, so the database itself rejects
//! the second of two racing registrations.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, UniqueKey};
use crate::model::{CustomerStatus, Person, ProfileKind};
use crate::store::migrations;
use crate::store::traits::{AccountHandle, IdentityStore, Lookup};

const PROFILE_COLUMNS: &str =
    "id, profile_kind, given_name, surname, national_id, photo_address, email, status";

/// libSQL identity store.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlIdentityStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlIdentityStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Connection(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Identity store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Number of stored profiles.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM profiles", ())
            .await
            .map_err(|e| StoreError::Query(format!("count: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => {
                let n: i64 = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("count: {e}")))?;
                Ok(u64::try_from(n).unwrap_or(0))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(StoreError::Query(format!("count: {e}"))),
        }
    }

    async fn find_one(&self, sql: &str, param: libsql::Value) -> Result<Option<Person>, StoreError> {
        let mut rows = self
            .conn
            .query(sql, libsql::params::Params::Positional(vec![param]))
            .await
            .map_err(|e| StoreError::Query(format!("find profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_person(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("find profile: {e}"))),
        }
    }
}

/// Map a libsql Row to a Person.
///
/// Column order matches PROFILE_COLUMNS.
fn row_to_person(row: &libsql::Row) -> Result<Person, StoreError> {
    let read = |e: libsql::Error| StoreError::Serialization(format!("row parse: {e}"));

    let kind: String = row.get(1).map_err(read)?;
    let national_id: i64 = row.get(4).map_err(read)?;
    let status: Option<String> = row.get(7).map_err(read)?;

    Ok(Person {
        id: row.get(0).map_err(read)?,
        profile_kind: kind.parse::<ProfileKind>().map_err(StoreError::Serialization)?,
        given_name: row.get(2).map_err(read)?,
        surname: row.get(3).map_err(read)?,
        national_id: u64::try_from(national_id)
            .map_err(|e| StoreError::Serialization(format!("national_id: {e}")))?,
        photo_address: row.get(5).map_err(read)?,
        email: row.get(6).map_err(read)?,
        status: status
            .map(|s| s.parse::<CustomerStatus>())
            .transpose()
            .map_err(StoreError::Serialization)?,
    })
}

fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Classify an insert failure, recognising UNIQUE violations.
fn classify_insert_error(e: libsql::Error) -> StoreError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed: profiles.email") {
        StoreError::Duplicate {
            key: UniqueKey::Email,
            message,
        }
    } else if message.contains("UNIQUE constraint failed: profiles.national_id") {
        StoreError::Duplicate {
            key: UniqueKey::NationalId,
            message,
        }
    } else {
        StoreError::Query(format!("insert_profile: {message}"))
    }
}

#[async_trait]
impl IdentityStore for LibSqlIdentityStore {
    async fn find_by_email(&self, email: &str) -> Lookup<Person> {
        self.find_one(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ?1"),
            libsql::Value::Text(email.trim().to_string()),
        )
        .await
        .into()
    }

    async fn find_by_national_id(&self, national_id: u64) -> Lookup<Person> {
        let Ok(id) = i64::try_from(national_id) else {
            return Lookup::NotFound;
        };
        self.find_one(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE national_id = ?1"),
            libsql::Value::Integer(id),
        )
        .await
        .into()
    }

    async fn insert_profile(
        &self,
        profile: &Person,
        account: &AccountHandle,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let national_id = i64::try_from(profile.national_id)
            .map_err(|e| StoreError::Serialization(format!("national_id: {e}")))?;
        let status = opt_text(profile.status.map(|s| s.to_string()));

        self.conn
            .execute(
                "INSERT INTO profiles (id, account_id, profile_kind, given_name, surname,
                    national_id, email, photo_address, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id.clone(),
                    account.id.clone(),
                    profile.profile_kind.to_string(),
                    profile.given_name.clone(),
                    profile.surname.clone(),
                    national_id,
                    profile.email.clone(),
                    profile.photo_address.clone(),
                    status,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(classify_insert_error)?;

        debug!(profile_id = %id, account_id = %account.id, "Profile inserted into DB");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlIdentityStore {
        LibSqlIdentityStore::new_memory().await.unwrap()
    }

    fn customer(email: &str, national_id: u64) -> Person {
        Person {
            id: String::new(),
            profile_kind: ProfileKind::Customer,
            given_name: "Juan".into(),
            surname: "Pérez".into(),
            national_id,
            photo_address: "https://cdn.test/usuarios/cliente-1".into(),
            email: email.into(),
            status: Some(CustomerStatus::Registered),
        }
    }

    fn account() -> AccountHandle {
        AccountHandle {
            id: "acc-1".into(),
            email: "new@x.com".into(),
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_both_keys() {
        let db = test_db().await;
        let id = db.insert_profile(&customer("new@x.com", 30111222), &account()).await.unwrap();

        let Lookup::Found(by_email) = db.find_by_email("NEW@x.com").await else {
            panic!("expected a record by email");
        };
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.surname, "Pérez");
        assert_eq!(by_email.status, Some(CustomerStatus::Registered));

        let Lookup::Found(by_id) = db.find_by_national_id(30111222).await else {
            panic!("expected a record by national id");
        };
        assert_eq!(by_id.email, "new@x.com");
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let db = test_db().await;
        assert!(matches!(db.find_by_email("nobody@x.com").await, Lookup::NotFound));
        assert!(matches!(db.find_by_national_id(1).await, Lookup::NotFound));
        assert!(matches!(db.find_by_national_id(u64::MAX).await, Lookup::NotFound));
    }

    #[tokio::test]
    async fn unique_violations_are_classified() {
        let db = test_db().await;
        db.insert_profile(&customer("a@x.com", 1111111), &account()).await.unwrap();

        let err = db
            .insert_profile(&customer("A@X.com", 2222222), &account())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { key: UniqueKey::Email, .. }));

        let err = db
            .insert_profile(&customer("b@x.com", 1111111), &account())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { key: UniqueKey::NationalId, .. }));

        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_status_is_a_read_failure() {
        let db = test_db().await;
        db.insert_profile(&customer("odd@x.com", 4444444), &account()).await.unwrap();
        db.conn
            .execute("UPDATE profiles SET status = 'archived' WHERE national_id = 4444444", ())
            .await
            .unwrap();

        assert!(matches!(
            db.find_by_national_id(4444444).await,
            Lookup::Failed(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn missing_status_reads_as_none() {
        let db = test_db().await;
        let mut owner = customer("owner@x.com", 5555555);
        owner.profile_kind = ProfileKind::Owner;
        owner.status = None;
        db.insert_profile(&owner, &account()).await.unwrap();

        let Lookup::Found(found) = db.find_by_email("owner@x.com").await else {
            panic!("expected a record");
        };
        assert_eq!(found.status, None);
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("profiles.db");
        {
            let db = LibSqlIdentityStore::new_local(&path).await.unwrap();
            db.insert_profile(&customer("keep@x.com", 3333333), &account()).await.unwrap();
        }
        let db = LibSqlIdentityStore::new_local(&path).await.unwrap();
        assert!(db.find_by_email("keep@x.com").await.is_found());
    }
}
