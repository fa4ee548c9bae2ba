//! Test organization:
//! - channels.rs: every channel receives each event, and failures stay isolated
//! - redelivery.rs: delayed repeats and observer de-duplication


use futures::future::BoxFuture;
use points_resilience_core::{KeyValueStore, StorageError};

/// A store that rejects every operation.
pub(crate) struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async { Err(StorageError::Unavailable("volume offline".into())) })
    }

    fn set<'a>(&'a self, _key: &'a str, _value: String) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async { Err(StorageError::Unavailable("volume offline".into())) })
    }

    fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async { Err(StorageError::Unavailable("volume offline".into())) })
    }
}
