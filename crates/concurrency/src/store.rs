//! Transaction storage
//!
//! The manager keeps every transaction behind [`TransactionStore`]. The
//! in-memory store is the only working backend; [`SharedTransactionStore`]
//! marks where a multi-process store would plug in.

use crate::transaction::Transaction;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gridtxn_core::{Error, ResourceId, Result, TransactionId};

/// Storage seam for transaction records
pub trait TransactionStore: Send + Sync + 'static {
    /// Add a new transaction
    ///
    /// # Errors
    /// `Internal` if the id is already stored; the stored record is kept.
    fn insert(&self, txn: Transaction) -> Result<()>;

    /// Copy of one transaction
    fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Read one transaction in place without copying it
    ///
    /// `f` runs while the record is held; it must not block.
    ///
    /// # Errors
    /// `TransactionNotFound` if `id` is unknown.
    fn inspect<T, F>(&self, id: TransactionId, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> T;

    /// Mutate one transaction in place
    ///
    /// `f` runs while the record is exclusively held; it must not block.
    ///
    /// # Errors
    /// `TransactionNotFound` if `id` is unknown, otherwise whatever `f` returns.
    fn update<T, F>(&self, id: TransactionId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>;

    /// Delete one transaction
    fn remove(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Copies of all transactions, optionally for one resource, oldest first
    fn list(&self, resource_id: Option<&ResourceId>) -> Result<Vec<Transaction>>;

    /// Number of stored transactions
    fn len(&self) -> usize;

    /// True when nothing is stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    txns: DashMap<TransactionId, Transaction>,
}

impl InMemoryTransactionStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn insert(&self, txn: Transaction) -> Result<()> {
        let id = txn.id();
        match self.txns.entry(id) {
            Entry::Occupied(_) => Err(Error::internal(format!("duplicate transaction id {}", id))),
            Entry::Vacant(slot) => {
                slot.insert(txn);
                Ok(())
            }
        }
    }

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.txns.get(&id).map(|t| t.value().clone()))
    }

    fn inspect<T, F>(&self, id: TransactionId, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> T,
    {
        self.txns
            .get(&id)
            .map(|entry| f(entry.value()))
            .ok_or(Error::TransactionNotFound { id })
    }

    fn update<T, F>(&self, id: TransactionId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut entry = self
            .txns
            .get_mut(&id)
            .ok_or(Error::TransactionNotFound { id })?;
        f(entry.value_mut())
    }

    fn remove(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.txns.remove(&id).map(|(_, t)| t))
    }

    fn list(&self, resource_id: Option<&ResourceId>) -> Result<Vec<Transaction>> {
        let mut out: Vec<Transaction> = self
            .txns
            .iter()
            .filter(|e| resource_id.map_or(true, |r| e.value().resource_id() == r))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|t| (t.created_at(), t.id()));
        Ok(out)
    }

    fn len(&self) -> usize {
        self.txns.len()
    }
}

/// Placeholder for a store shared between coordinator processes
///
/// Every operation fails with [`Error::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedTransactionStore;

impl SharedTransactionStore {
    /// Create the placeholder
    pub fn new() -> Self {
        Self
    }

    fn unsupported<T>() -> Result<T> {
        Err(Error::Unsupported {
            reason: "shared transaction store is not implemented".to_string(),
        })
    }
}

impl TransactionStore for SharedTransactionStore {
    fn insert(&self, _txn: Transaction) -> Result<()> {
        Self::unsupported()
    }

    fn get(&self, _id: TransactionId) -> Result<Option<Transaction>> {
        Self::unsupported()
    }

    fn inspect<T, F>(&self, _id: TransactionId, _f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> T,
    {
        Self::unsupported()
    }

    fn update<T, F>(&self, _id: TransactionId, _f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        Self::unsupported()
    }

    fn remove(&self, _id: TransactionId) -> Result<Option<Transaction>> {
        Self::unsupported()
    }

    fn list(&self, _resource_id: Option<&ResourceId>) -> Result<Vec<Transaction>> {
        Self::unsupported()
    }

    fn len(&self) -> usize {
        0
    }
}
