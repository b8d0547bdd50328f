/// Data-access layer for Memberbase
///
/// # Modules
///
/// - `context`: per-request trace ID, deadline and cancellation
/// - `store`: the store traits (scope primitives and document operations)
/// - `transaction`: read-only and transactional unit-of-work coordinator
/// - `filter`: search criteria to predicate, evaluated in memory or as SQL
/// - `postgres`: PostgreSQL store
/// - `memory`: in-process store used by tests
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: schema migration runner
///
/// # Example
///
/// ```no_run
/// use memberbase_shared::db::migrations::run_migrations;
/// use memberbase_shared::db::pool::{create_pool, DatabaseConfig};
/// use memberbase_shared::db::postgres::PgMemberStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///
///     let store = PgMemberStore::new(pool);
///     Ok(())
/// }
/// ```

pub mod context;
pub mod filter;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod store;
pub mod transaction;
