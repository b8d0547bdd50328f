/// PostgreSQL member store
///
/// Members live in the `members` table created by the migrations in
/// `migrations/`. Unique indexes on `username`, `phone_number` and `email`
/// enforce registration uniqueness even when two transactions race; the
/// losing write surfaces as [`StoreError::UniqueViolation`].
///
/// Sessions are pooled connections and transactions are sqlx transactions.
/// Both dereference to `PgConnection`, so the document operations below run
/// unchanged in either scope. Dropping an uncommitted transaction rolls it
/// back.
///
/// # Example
///
/// ```no_run
/// use memberbase_shared::db::context::ExecContext;
/// use memberbase_shared::db::filter::Predicate;
/// use memberbase_shared::db::postgres::PgMemberStore;
/// use memberbase_shared::db::store::MemberStore;
/// use memberbase_shared::db::transaction::without_transaction;
/// use memberbase_shared::error::StoreError;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool) -> Result<(), StoreError> {
/// let store = Arc::new(PgMemberStore::new(pool));
/// let ctx = ExecContext::background();
///
/// let reader = Arc::clone(&store);
/// let total = without_transaction(&ctx, store.as_ref(), move |conn| {
///     Box::pin(async move { reader.count(conn, &Predicate::MatchAll).await })
/// })
/// .await?;
/// println!("{} members", total);
/// # Ok(())
/// # }
/// ```

use crate::db::filter::Predicate;
use crate::db::store::{MemberStore, TransactionalStore};
use crate::error::StoreError;
use crate::models::member::MemberRecord;
use crate::models::search::SortKey;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::{Postgres, QueryBuilder, Transaction};
use tracing::debug;

const MEMBER_COLUMNS: &str = "id, username, password_hash, full_name, member_type, is_suspended, \
     created_at, updated_at, last_login_at, device_id, push_token, phone_number, email, photo_url";

/// Row shape of the `members` table
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: String,
    username: String,
    password_hash: String,
    full_name: String,
    member_type: String,
    is_suspended: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
    device_id: Option<String>,
    push_token: Option<String>,
    phone_number: Option<String>,
    email: Option<String>,
    photo_url: Option<String>,
}

impl MemberRow {
    fn into_record(self, offset: FixedOffset) -> MemberRecord {
        MemberRecord {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            full_name: self.full_name,
            member_type: self.member_type,
            is_suspended: self.is_suspended,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_login_at: self.last_login_at.map(|t| t.with_timezone(&offset)),
            device_id: self.device_id,
            push_token: self.push_token,
            phone_number: self.phone_number,
            email: self.email,
            photo_url: self.photo_url,
        }
    }
}

/// Member store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgMemberStore {
    pool: PgPool,
    login_offset: FixedOffset,
}

impl PgMemberStore {
    /// Store reading `last_login_at` back in UTC
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            login_offset: Utc.fix(),
        }
    }

    /// Reads `last_login_at` back in `offset` instead of UTC
    pub fn with_login_offset(mut self, offset: FixedOffset) -> Self {
        self.login_offset = offset;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn select(&self, filter: &Predicate) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM members WHERE ", MEMBER_COLUMNS));
        filter.push_sql(&mut qb);
        qb
    }
}

#[async_trait]
impl TransactionalStore for PgMemberStore {
    type Conn = PgConnection;
    type Session = PoolConnection<Postgres>;
    type Transaction = Transaction<'static, Postgres>;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    async fn release(&self, session: Self::Session) -> Result<(), StoreError> {
        // Dropping a pooled connection returns it to the pool.
        drop(session);
        Ok(())
    }

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        Ok(tx.rollback().await?)
    }
}

#[async_trait]
impl MemberStore for PgMemberStore {
    async fn insert_one(&self, conn: &mut PgConnection, member: &MemberRecord) -> Result<(), StoreError> {
        debug!(member_id = %member.id, "Inserting member");

        sqlx::query(
            r#"
            INSERT INTO members (
                id, username, password_hash, full_name, member_type, is_suspended,
                created_at, updated_at, last_login_at, device_id, push_token,
                phone_number, email, photo_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&member.id)
        .bind(&member.username)
        .bind(&member.password_hash)
        .bind(&member.full_name)
        .bind(&member.member_type)
        .bind(member.is_suspended)
        .bind(member.created_at)
        .bind(member.updated_at)
        .bind(member.last_login_at.map(|t| t.with_timezone(&Utc)))
        .bind(&member.device_id)
        .bind(&member.push_token)
        .bind(&member.phone_number)
        .bind(&member.email)
        .bind(&member.photo_url)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_one(
        &self,
        conn: &mut PgConnection,
        filter: &Predicate,
    ) -> Result<Option<MemberRecord>, StoreError> {
        let mut qb = self.select(filter);
        qb.push(" LIMIT 1");

        let row = qb
            .build_query_as::<MemberRow>()
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(|r| r.into_record(self.login_offset)))
    }

    async fn find_many(
        &self,
        conn: &mut PgConnection,
        filter: &Predicate,
        sort: &[SortKey],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        let mut qb = self.select(filter);

        qb.push(" ORDER BY ");
        for key in sort {
            qb.push(key.field.column())
                .push(" ")
                .push(key.direction.as_sql())
                .push(", ");
        }
        qb.push("id ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build_query_as::<MemberRow>().fetch_all(&mut *conn).await?;

        Ok(rows
            .into_iter()
            .map(|r| r.into_record(self.login_offset))
            .collect())
    }

    async fn count(&self, conn: &mut PgConnection, filter: &Predicate) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM members WHERE ");
        filter.push_sql(&mut qb);

        let total: i64 = qb.build_query_scalar().fetch_one(&mut *conn).await?;
        Ok(total)
    }

    async fn replace_one(&self, conn: &mut PgConnection, member: &MemberRecord) -> Result<bool, StoreError> {
        debug!(member_id = %member.id, "Replacing member");

        let result = sqlx::query(
            r#"
            UPDATE members SET
                username = $2,
                password_hash = $3,
                full_name = $4,
                member_type = $5,
                is_suspended = $6,
                created_at = $7,
                updated_at = $8,
                last_login_at = $9,
                device_id = $10,
                push_token = $11,
                phone_number = $12,
                email = $13,
                photo_url = $14
            WHERE id = $1
            "#,
        )
        .bind(&member.id)
        .bind(&member.username)
        .bind(&member.password_hash)
        .bind(&member.full_name)
        .bind(&member.member_type)
        .bind(member.is_suspended)
        .bind(member.created_at)
        .bind(member.updated_at)
        .bind(member.last_login_at.map(|t| t.with_timezone(&Utc)))
        .bind(&member.device_id)
        .bind(&member.push_token)
        .bind(&member.phone_number)
        .bind(&member.email)
        .bind(&member.photo_url)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self, conn: &mut PgConnection) -> Result<(), StoreError> {
        let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&mut *conn).await?;
        if one != 1 {
            return Err(StoreError::Corrupt(format!("ping returned {}", one)));
        }
        Ok(())
    }
}
