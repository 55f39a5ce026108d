//! Gift record store on the embedded redb database
//!
//! This module handles the setup of the database file and provides the
//! key-value operations the gift service needs. Every method is a single
//! redb transaction, so each one is atomic per slug. There are no cross-key
//! transactions.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;
use thiserror::Error;

use crate::model::GiftRecord;

/// Main table for storing gift records
///
/// Key: slug
/// Value: JSON-serialized GiftRecord (edit key included)
///
/// Example:
/// - Key: "for-mom"
/// - Value: '{"slug":"for-mom","recipientName":"Mom",...,"editKey":"..."}'
pub const TABLE_GIFTS: TableDefinition<&str, &str> = TableDefinition::new("gifts_v1");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] redb::Error),

    #[error("corrupted gift record: {0}")]
    Codec(#[from] serde_json::Error),
}

macro_rules! from_redb_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::Database(err.into())
                }
            }
        )*
    };
}

from_redb_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type StoreResult<T> = Result<T, StoreError>;

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "gifts.db")
///
/// # Example
///
/// ```no_run
/// # use giftpage::database::init_db;
/// let db = init_db("gifts.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    // Open (or create if not exists) the gifts table
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_GIFTS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Slug-keyed persistence for [`GiftRecord`]
///
/// Cheap to clone; all clones share the same database handle. Methods block
/// on disk I/O, so async callers run them on the blocking pool.
#[derive(Clone)]
pub struct GiftStore {
    db: Arc<Database>,
}

impl GiftStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Looks up a record by slug.
    pub fn get(&self, slug: &str) -> StoreResult<Option<GiftRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_GIFTS)?;

        match table.get(slug)? {
            Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
            None => Ok(None),
        }
    }

    /// Persists `record` only if its slug is not taken yet.
    ///
    /// The existence check and the insert share one write transaction, and
    /// redb admits a single writer at a time, so two concurrent creates for
    /// the same slug cannot both succeed.
    ///
    /// Returns `false` when the slug already exists; nothing is written then.
    pub fn insert_new(&self, record: &GiftRecord) -> StoreResult<bool> {
        let record_json = serde_json::to_string(record)?;

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(TABLE_GIFTS)?;
            if table.get(record.slug.as_str())?.is_some() {
                false
            } else {
                table.insert(record.slug.as_str(), record_json.as_str())?;
                true
            }
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }

        Ok(inserted)
    }

    /// Overwrites the record stored under `record.slug` (last write wins).
    pub fn put(&self, record: &GiftRecord) -> StoreResult<()> {
        let record_json = serde_json::to_string(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_GIFTS)?;
            table.insert(record.slug.as_str(), record_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Removes the record for `slug`. Removing an absent slug is not an error.
    pub fn remove(&self, slug: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_GIFTS)?;
            table.remove(slug)?;
        }
        write_txn.commit()?;

        Ok(())
    }
}
