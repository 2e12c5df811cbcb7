//! Content digests recorded for every stored file.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use md5::Md5;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeMap;
use wharf_storage::StorageBackend;

/// Algorithm name to lowercase hex digest.
pub type Digests = BTreeMap<String, String>;

/// Computes every digest the mirror records for `data`.
pub fn digest(data: &[u8]) -> Digests {
    BTreeMap::from([
        ("blake3".to_string(), blake3::hash(data).to_hex().to_string()),
        ("md5".to_string(), hex::encode(Md5::digest(data))),
        ("sha256".to_string(), hex::encode(Sha256::digest(data))),
        ("sha512".to_string(), hex::encode(Sha512::digest(data))),
    ])
}

/// A file body already written to the content store, with the digests to
/// record against its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub key: String,
    pub hashes: Digests,
}

impl StoredContent {
    /// Save `data` under its content key and digest it. Keys depend only on
    /// the filename and bytes, so saving the same body twice is harmless and
    /// needs no transaction.
    pub async fn save(storage: &dyn StorageBackend, filename: &str, data: &[u8]) -> Result<Self> {
        let key = storage.save(filename, data).await.or_raise(|| ErrorKind::Storage)?;
        let key = key.to_str().ok_or_raise(|| ErrorKind::InvalidData("storage key"))?.to_string();
        Ok(Self {
            key,
            hashes: digest(data),
        })
    }
}
