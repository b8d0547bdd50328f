//! In-memory member store
//!
//! [`MemoryStore`] implements the same contract as the Postgres store and
//! backs the unit and HTTP tests. Semantics:
//!
//! - a session reads a snapshot taken at acquire; writes through a session
//!   apply immediately (autocommit)
//! - a transaction reads a snapshot taken at begin plus its own staged writes
//! - unique keys are checked when a write is staged and again at commit
//!   against the latest committed state, so two interleaved transactions
//!   cannot both register the same username, phone number or email
//! - rollback, or dropping the transaction handle, discards staged writes

use crate::db::filter::{bool_value, text_value, time_value, Predicate};
use crate::db::store::{MemberStore, TransactionalStore};
use crate::error::StoreError;
use crate::models::member::MemberRecord;
use crate::models::search::{MemberField, SortDirection, SortKey};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::RwLock;

type Members = BTreeMap<String, MemberRecord>;

#[derive(Debug, Clone)]
enum Write {
    Insert(MemberRecord),
    Replace(MemberRecord),
}

/// Connection to a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConn {
    shared: Arc<RwLock<Members>>,
    view: Members,
    staged: Option<Vec<Write>>,
}

/// Read-only session over a snapshot
#[derive(Debug)]
pub struct MemorySession(MemoryConn);

/// Open transaction; dropping it discards staged writes
#[derive(Debug)]
pub struct MemoryTransaction(MemoryConn);

impl Deref for MemorySession {
    type Target = MemoryConn;
    fn deref(&self) -> &MemoryConn {
        &self.0
    }
}

impl DerefMut for MemorySession {
    fn deref_mut(&mut self) -> &mut MemoryConn {
        &mut self.0
    }
}

impl Deref for MemoryTransaction {
    type Target = MemoryConn;
    fn deref(&self) -> &MemoryConn {
        &self.0
    }
}

impl DerefMut for MemoryTransaction {
    fn deref_mut(&mut self) -> &mut MemoryConn {
        &mut self.0
    }
}

/// Member store held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    members: Arc<RwLock<Members>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed records ordered by ID
    pub async fn snapshot(&self) -> Vec<MemberRecord> {
        self.members.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    async fn open(&self, transactional: bool) -> MemoryConn {
        MemoryConn {
            shared: Arc::clone(&self.members),
            view: self.members.read().await.clone(),
            staged: transactional.then(Vec::new),
        }
    }
}

/// Name of the unique key `candidate` would break in `members`
fn conflict(members: &Members, candidate: &MemberRecord) -> Option<&'static str> {
    for other in members.values().filter(|m| m.id != candidate.id) {
        if other.username == candidate.username {
            return Some("members_username_key");
        }
        if candidate.phone_number.is_some() && other.phone_number == candidate.phone_number {
            return Some("members_phone_number_key");
        }
        if candidate.email.is_some() && other.email == candidate.email {
            return Some("members_email_key");
        }
    }
    None
}

fn violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

/// Applies one write to `members`, enforcing every unique key
fn apply(members: &mut Members, write: &Write) -> Result<bool, StoreError> {
    let (record, inserting) = match write {
        Write::Insert(record) => (record, true),
        Write::Replace(record) => (record, false),
    };

    let exists = members.contains_key(&record.id);
    if inserting && exists {
        return Err(violation("members_pkey"));
    }
    if !inserting && !exists {
        return Ok(false);
    }
    if let Some(constraint) = conflict(members, record) {
        return Err(violation(constraint));
    }

    members.insert(record.id.clone(), record.clone());
    Ok(true)
}

fn compare_field(a: &MemberRecord, b: &MemberRecord, field: MemberField) -> Ordering {
    // Absent values sort after present ones, like NULL in ascending SQL order.
    fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    match field {
        MemberField::IsSuspended => nulls_last(bool_value(a, field), bool_value(b, field)),
        MemberField::CreatedAt | MemberField::UpdatedAt | MemberField::LastLoginAt => {
            nulls_last(time_value(a, field), time_value(b, field))
        }
        _ => nulls_last(text_value(a, field), text_value(b, field)),
    }
}

fn compare(a: &MemberRecord, b: &MemberRecord, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = match key.direction {
            SortDirection::Asc => compare_field(a, b, key.field),
            SortDirection::Desc => compare_field(b, a, key.field),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    type Conn = MemoryConn;
    type Session = MemorySession;
    type Transaction = MemoryTransaction;

    async fn acquire(&self) -> Result<MemorySession, StoreError> {
        Ok(MemorySession(self.open(false).await))
    }

    async fn release(&self, _session: MemorySession) -> Result<(), StoreError> {
        Ok(())
    }

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction(self.open(true).await))
    }

    async fn commit(&self, tx: MemoryTransaction) -> Result<(), StoreError> {
        let conn = tx.0;
        let staged = conn.staged.unwrap_or_default();
        if staged.is_empty() {
            return Ok(());
        }

        let mut committed = conn.shared.write().await;
        let mut next = committed.clone();
        for write in &staged {
            apply(&mut next, write)?;
        }
        *committed = next;
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTransaction) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn insert_one(&self, conn: &mut MemoryConn, member: &MemberRecord) -> Result<(), StoreError> {
        let write = Write::Insert(member.clone());
        apply(&mut conn.view, &write)?;

        match conn.staged.as_mut() {
            Some(staged) => staged.push(write),
            None => {
                apply(&mut *conn.shared.write().await, &write)?;
            }
        }
        Ok(())
    }

    async fn find_one(
        &self,
        conn: &mut MemoryConn,
        filter: &Predicate,
    ) -> Result<Option<MemberRecord>, StoreError> {
        Ok(conn.view.values().find(|m| filter.matches(m)).cloned())
    }

    async fn find_many(
        &self,
        conn: &mut MemoryConn,
        filter: &Predicate,
        sort: &[SortKey],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        let mut matched: Vec<&MemberRecord> =
            conn.view.values().filter(|m| filter.matches(m)).collect();
        matched.sort_by(|a, b| compare(a, b, sort));

        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(skip).take(take).cloned().collect())
    }

    async fn count(&self, conn: &mut MemoryConn, filter: &Predicate) -> Result<i64, StoreError> {
        let total = conn.view.values().filter(|m| filter.matches(m)).count();
        Ok(i64::try_from(total).unwrap_or(i64::MAX))
    }

    async fn replace_one(&self, conn: &mut MemoryConn, member: &MemberRecord) -> Result<bool, StoreError> {
        let write = Write::Replace(member.clone());
        if !apply(&mut conn.view, &write)? {
            return Ok(false);
        }

        match conn.staged.as_mut() {
            Some(staged) => {
                staged.push(write);
                Ok(true)
            }
            None => apply(&mut *conn.shared.write().await, &write),
        }
    }

    async fn ping(&self, _conn: &mut MemoryConn) -> Result<(), StoreError> {
        Ok(())
    }
}
