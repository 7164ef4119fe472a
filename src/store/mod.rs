//! Collaborator seams and their adapters: in-memory, libSQL, local files and
//! the hosted database/auth/storage service.

pub mod hosted;
pub mod libsql_backend;
pub mod local_files;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use hosted::HostedBackend;
pub use libsql_backend::LibSqlIdentityStore;
pub use local_files::LocalFileStore;
pub use memory::{MemoryAuthProvider, MemoryFileStore, MemoryIdentityStore};
pub use traits::{AccountHandle, AuthProvider, FileStore, IdentityStore, Lookup};
