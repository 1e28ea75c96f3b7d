//! Self-contained backend for development and tests: documents as JSON rows
//! in SQLite, blobs on the local filesystem, OTP codes written to the log.

pub mod auth;
pub mod documents;
pub mod storage;

pub use auth::LocalAuth;
pub use documents::LocalDocuments;
pub use storage::LocalStorage;

use sha2::{Digest, Sha256};

/// Hash a secret for storage
fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
