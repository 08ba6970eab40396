//! Pool provider abstraction for read/write routing.
//!
//! [`PoolProvider`] lets the PostgreSQL store send listings and history reads to a replica
//! while every read that feeds a compare-and-swap, and every write, goes to the primary.
//!
//! For testing, use [`TestDbPools`], whose read pool refuses writes so a misrouted write
//! fails loudly.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Trait for providing database pools with read/write routing.
///
/// # Example
///
/// ```ignore
/// use clubdesk::PoolProvider;
/// use sqlx::PgPool;
///
/// #[derive(Clone)]
/// struct MyPools {
///     primary: PgPool,
///     replica: Option<PgPool>,
/// }
///
/// impl PoolProvider for MyPools {
///     fn read(&self) -> &PgPool {
///         self.replica.as_ref().unwrap_or(&self.primary)
///     }
///
///     fn write(&self) -> &PgPool {
///         &self.primary
///     }
/// }
/// ```
pub trait PoolProvider: Clone + Send + Sync + 'static {
    /// Pool for reads that may be slightly stale: request listings, transition history.
    fn read(&self) -> &PgPool;

    /// Pool for writes and for reads that a later compare-and-swap depends on.
    fn write(&self) -> &PgPool;
}

/// A single pool serves both reads and writes.
impl PoolProvider for PgPool {
    fn read(&self) -> &PgPool {
        self
    }

    fn write(&self) -> &PgPool {
        self
    }
}

/// Test pool provider with read-only replica enforcement.
///
/// Both pools point at the same database; the replica sets
/// `default_transaction_read_only = on` on every connection, so PostgreSQL rejects any write
/// routed through `.read()`.
#[derive(Clone, Debug)]
pub struct TestDbPools {
    primary: PgPool,
    replica: PgPool,
}

impl TestDbPools {
    pub async fn new(pool: PgPool) -> Result<Self, sqlx::Error> {
        let primary = pool.clone();

        let replica = PgPoolOptions::new()
            .max_connections(pool.options().get_max_connections())
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET default_transaction_read_only = on")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(pool.connect_options().as_ref().clone())
            .await?;

        Ok(Self { primary, replica })
    }
}

impl PoolProvider for TestDbPools {
    fn read(&self) -> &PgPool {
        &self.replica
    }

    fn write(&self) -> &PgPool {
        &self.primary
    }
}
