use redb::{Database, ReadableTable};
use std::path::Path;

use super::{tables, Bucket, KvStore, StoreError, WriteOp};

/// [`KvStore`] backed by a single redb file
///
/// redb admits one write transaction at a time, so writers are serialized
/// globally while readers proceed against the last committed snapshot.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        tracing::info!("Opening database at: {:?}", path.as_ref());

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    tracing::error!("Failed to create database directory: {}", e);
                    StoreError::Io(e)
                })?;
            }
        }

        let db = Database::create(path)?;

        // Create tables if they don't exist by opening them
        let write_txn = db.begin_write()?;
        for bucket in Bucket::ALL {
            let _ = write_txn.open_table(tables::definition(bucket))?;
        }
        write_txn.commit()?;

        tracing::info!("Database initialized successfully");

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::definition(bucket))?;
        let value = table.get(key)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::definition(bucket))?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::definition(bucket))?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_many(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::definition(bucket))?;
            for key in keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn update(
        &self,
        bucket: Bucket,
        key: &str,
        f: &mut dyn FnMut(Option<&[u8]>) -> WriteOp,
    ) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::definition(bucket))?;
            let current = table.get(key)?.map(|v| v.value().to_vec());

            match f(current.as_deref()) {
                WriteOp::Put(bytes) => {
                    table.insert(key, bytes.as_slice())?;
                }
                WriteOp::Delete => {
                    table.remove(key)?;
                }
                WriteOp::Keep => {}
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn scan_prefix(
        &self,
        bucket: Bucket,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::definition(bucket))?;

        let mut entries = Vec::new();
        for item in table.range(prefix..)? {
            let (key, value) = item?;
            if !key.value().starts_with(prefix) {
                break;
            }
            entries.push((key.value().to_string(), value.value().to_vec()));
        }
        Ok(entries)
    }

    fn ping(&self) -> Result<(), StoreError> {
        let _ = self.db.begin_read()?;
        Ok(())
    }
}
