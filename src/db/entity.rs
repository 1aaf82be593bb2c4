use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::{Bucket, KvStore, StoreError, WriteOp};
use crate::error::{AppError, Result};

/// A record persisted as a JSON document in its own bucket
pub trait Entity: Serialize + DeserializeOwned {
    const BUCKET: Bucket;

    fn key(&self) -> String;
}

/// Typed access to the key-value store
///
/// Documents that fail to decode are reported as absent so a corrupt
/// record never turns into a hard failure at read time.
#[derive(Clone)]
pub struct EntityStore {
    kv: Arc<dyn KvStore>,
}

impl EntityStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn ping(&self) -> std::result::Result<(), StoreError> {
        self.kv.ping()
    }

    pub fn find<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        Ok(self
            .kv
            .get(E::BUCKET, key)?
            .and_then(|bytes| decode(E::BUCKET, key, &bytes)))
    }

    pub fn save<E: Entity>(&self, entity: &E) -> Result<()> {
        let bytes = serde_json::to_vec(entity)?;
        self.kv.put(E::BUCKET, &entity.key(), &bytes)?;
        Ok(())
    }

    /// Store the entity unless its key is already taken; returns whether it was written
    pub fn insert_new<E: Entity>(&self, entity: &E) -> Result<bool> {
        let bytes = serde_json::to_vec(entity)?;
        let mut written = false;

        self.kv.update(E::BUCKET, &entity.key(), &mut |current| {
            if current.is_some() {
                WriteOp::Keep
            } else {
                written = true;
                WriteOp::Put(bytes.clone())
            }
        })?;

        Ok(written)
    }

    pub fn remove<E: Entity>(&self, key: &str) -> Result<()> {
        self.kv.delete(E::BUCKET, key)?;
        Ok(())
    }

    pub fn remove_many<E: Entity>(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.kv.delete_many(E::BUCKET, keys)?;
        Ok(())
    }

    /// Entities whose key starts with `prefix`
    pub fn scan<E: Entity>(&self, prefix: &str) -> Result<Vec<E>> {
        Ok(self
            .kv
            .scan_prefix(E::BUCKET, prefix)?
            .into_iter()
            .filter_map(|(key, bytes)| decode(E::BUCKET, &key, &bytes))
            .collect())
    }

    /// Atomic read-modify-write of a single record
    ///
    /// The closure receives the current record (if any) and returns the
    /// replacement: `Some` is written, `None` deletes. An `Err` leaves the
    /// stored record untouched.
    pub fn update<E, R, F>(&self, key: &str, f: F) -> Result<R>
    where
        E: Entity,
        F: FnOnce(Option<E>) -> Result<(Option<E>, R)>,
    {
        let mut f = Some(f);
        let mut outcome: Option<Result<R>> = None;

        self.kv.update(E::BUCKET, key, &mut |current| {
            let Some(f) = f.take() else {
                return WriteOp::Keep;
            };
            let existed = current.is_some();
            let decoded = current.and_then(|bytes| decode(E::BUCKET, key, bytes));

            match f(decoded) {
                Ok((Some(entity), value)) => match serde_json::to_vec(&entity) {
                    Ok(bytes) => {
                        outcome = Some(Ok(value));
                        WriteOp::Put(bytes)
                    }
                    Err(e) => {
                        outcome = Some(Err(e.into()));
                        WriteOp::Keep
                    }
                },
                Ok((None, value)) => {
                    outcome = Some(Ok(value));
                    if existed {
                        WriteOp::Delete
                    } else {
                        WriteOp::Keep
                    }
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    WriteOp::Keep
                }
            }
        })?;

        outcome.unwrap_or(Err(AppError::Store(StoreError::NotApplied)))
    }

    /// Mutate an existing record in place; `Ok(None)` when it does not exist
    pub fn modify<E, R, F>(&self, key: &str, f: F) -> Result<Option<R>>
    where
        E: Entity,
        F: FnOnce(&mut E) -> Result<R>,
    {
        self.update(key, |current: Option<E>| match current {
            Some(mut entity) => {
                let value = f(&mut entity)?;
                Ok((Some(entity), Some(value)))
            }
            None => Ok((None, None)),
        })
    }
}

fn decode<E: Entity>(bucket: Bucket, key: &str, bytes: &[u8]) -> Option<E> {
    match serde_json::from_slice(bytes) {
        Ok(entity) => Some(entity),
        Err(e) => {
            tracing::warn!("Undecodable {} record '{}': {}", bucket, key, e);
            None
        }
    }
}
