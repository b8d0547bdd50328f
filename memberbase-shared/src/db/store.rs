//! Store abstractions
//!
//! [`TransactionalStore`] exposes the scope primitives the transaction
//! coordinator needs: acquiring/releasing a read-only session and
//! beginning/committing/rolling back a transaction. Both scopes dereference to
//! the same connection type, so [`MemberStore`] document operations run the
//! same way inside either.
//!
//! Implementations live in [`crate::db::postgres`] and [`crate::db::memory`].

use crate::db::filter::Predicate;
use crate::error::StoreError;
use crate::models::member::MemberRecord;
use crate::models::search::SortKey;
use async_trait::async_trait;
use std::ops::DerefMut;

/// Scope primitives of a store
///
/// Only the coordinator in [`crate::db::transaction`] should call these;
/// repository code receives a `&mut Self::Conn` inside a scope instead.
#[async_trait]
pub trait TransactionalStore: Send + Sync + 'static {
    /// Connection handed to units of work
    type Conn: Send;

    /// Read-only, resource-scoped session
    type Session: DerefMut<Target = Self::Conn> + Send;

    /// Open transaction
    type Transaction: DerefMut<Target = Self::Conn> + Send;

    async fn acquire(&self) -> Result<Self::Session, StoreError>;

    async fn release(&self, session: Self::Session) -> Result<(), StoreError>;

    async fn begin(&self) -> Result<Self::Transaction, StoreError>;

    async fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError>;

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), StoreError>;
}

/// Document operations over the member collection
///
/// Unique keys are `id`, `username`, `phone_number` and `email` (absent values
/// never collide). Writes that would break them fail with
/// [`StoreError::UniqueViolation`].
#[async_trait]
pub trait MemberStore: TransactionalStore {
    async fn insert_one(&self, conn: &mut Self::Conn, member: &MemberRecord)
        -> Result<(), StoreError>;

    async fn find_one(
        &self,
        conn: &mut Self::Conn,
        filter: &Predicate,
    ) -> Result<Option<MemberRecord>, StoreError>;

    async fn find_many(
        &self,
        conn: &mut Self::Conn,
        filter: &Predicate,
        sort: &[SortKey],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MemberRecord>, StoreError>;

    async fn count(&self, conn: &mut Self::Conn, filter: &Predicate) -> Result<i64, StoreError>;

    /// Replaces the record with `member.id`; `false` if no such record exists
    async fn replace_one(&self, conn: &mut Self::Conn, member: &MemberRecord)
        -> Result<bool, StoreError>;

    /// Round-trips the connection, for readiness checks
    async fn ping(&self, conn: &mut Self::Conn) -> Result<(), StoreError>;
}
