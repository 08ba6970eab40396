//! PostgreSQL implementation of `RequestStore`.
//!
//! The compare-and-swap is a conditional `UPDATE ... WHERE status IS NOT DISTINCT FROM $2`.
//! Under PostgreSQL's default isolation a concurrent writer blocks on the row lock and then
//! re-checks the condition against the committed row, so exactly one of two racing swaps
//! matches. The history insert runs in the same transaction as the update.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use super::{RequestFilter, RequestStore};
use crate::domain::actor::{ActingRole, ActorId, ClubId, DepartmentId};
use crate::domain::request::{
    RawStatus, RequestData, RequestId, RequestStatus, StatusCommit, StoredRequest,
    TransitionAudit, TransitionRecord,
};
use crate::error::{ClubdeskError, Result};

pub mod pool_provider;

pub use pool_provider::{PoolProvider, TestDbPools};

const REQUEST_COLUMNS: &str = "id, requesting_party, department_id, club_id, description, \
     status, last_transition_at, last_transition_by, last_transition_role, created_at";

/// PostgreSQL request store.
///
/// # Example
/// ```ignore
/// use clubdesk::manager::postgres::PostgresRequestStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgresql://localhost/clubdesk").await?;
/// clubdesk::migrator().run(&pool).await?;
/// let store = Arc::new(PostgresRequestStore::new(pool));
/// ```
#[derive(Clone)]
pub struct PostgresRequestStore<P: PoolProvider = sqlx::PgPool> {
    pools: P,
}

impl<P: PoolProvider> PostgresRequestStore<P> {
    pub fn new(pools: P) -> Self {
        Self { pools }
    }

    pub fn pools(&self) -> &P {
        &self.pools
    }

    /// Insert a request row with an arbitrary raw status.
    ///
    /// Stands in for the submission flow and for legacy imports; the status is written as
    /// given, not normalized.
    pub async fn insert_request(&self, data: &RequestData, status: &RawStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO requests (
                id, requesting_party, department_id, club_id, description, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*data.id as Uuid)
        .bind(&data.requesting_party)
        .bind(data.department_id.0)
        .bind(data.club_id.0)
        .bind(&data.description)
        .bind(status.to_stored_text())
        .bind(data.created_at)
        .execute(self.pools.write())
        .await
        .map_err(|e| ClubdeskError::Other(anyhow!("Failed to insert request: {}", e)))?;

        tracing::debug!(request_id = %data.id, "Inserted request");
        Ok(())
    }
}

fn parse_role(role: &str) -> Result<ActingRole> {
    match role {
        "department" => Ok(ActingRole::Department),
        "club" => Ok(ActingRole::Club),
        other => Err(ClubdeskError::Other(anyhow!(
            "Unknown role '{}' in database",
            other
        ))),
    }
}

fn status_from_code(code: i16) -> Result<RequestStatus> {
    RequestStatus::from_code(i64::from(code)).ok_or_else(|| {
        ClubdeskError::Other(anyhow!("Unknown status code {} in transition history", code))
    })
}

fn decode_request(row: &PgRow) -> Result<StoredRequest> {
    let decode = |e: sqlx::Error| ClubdeskError::Other(anyhow!("Failed to decode request: {}", e));

    let last_transition_at: Option<DateTime<Utc>> =
        row.try_get("last_transition_at").map_err(decode)?;
    let last_transition_by: Option<String> = row.try_get("last_transition_by").map_err(decode)?;
    let last_transition_role: Option<String> =
        row.try_get("last_transition_role").map_err(decode)?;

    let last_transition = match (last_transition_at, last_transition_by, last_transition_role) {
        (Some(at), Some(by), Some(role)) => Some(TransitionAudit {
            at,
            by: ActorId(by),
            role: parse_role(&role)?,
        }),
        _ => None,
    };

    Ok(StoredRequest {
        data: RequestData {
            id: RequestId(row.try_get("id").map_err(decode)?),
            requesting_party: row.try_get("requesting_party").map_err(decode)?,
            department_id: DepartmentId(row.try_get("department_id").map_err(decode)?),
            club_id: ClubId(row.try_get("club_id").map_err(decode)?),
            description: row.try_get("description").map_err(decode)?,
            created_at: row.try_get("created_at").map_err(decode)?,
        },
        status: RawStatus::from_stored_text(row.try_get("status").map_err(decode)?),
        last_transition,
    })
}

#[async_trait]
impl<P: PoolProvider> RequestStore for PostgresRequestStore<P> {
    async fn get(&self, id: RequestId) -> Result<StoredRequest> {
        // Primary, not replica: the status read here is the expected value of a later swap.
        let row = sqlx::query(&format!(
            "SELECT {} FROM requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(*id as Uuid)
        .fetch_optional(self.pools.write())
        .await
        .map_err(|e| ClubdeskError::Other(anyhow!("Failed to fetch request: {}", e)))?
        .ok_or(ClubdeskError::RequestNotFound(id))?;

        decode_request(&row)
    }

    #[tracing::instrument(skip_all, fields(request_id = %id, to = %commit.to))]
    async fn compare_and_swap_status(
        &self,
        id: RequestId,
        expected: &RawStatus,
        commit: &StatusCommit,
    ) -> Result<bool> {
        let mut tx =
            self.pools.write().begin().await.map_err(|e| {
                ClubdeskError::Other(anyhow!("Failed to begin transaction: {}", e))
            })?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE requests SET
                status = $3,
                last_transition_at = $4,
                last_transition_by = $5,
                last_transition_role = $6
            WHERE id = $1 AND status IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(*id as Uuid)
        .bind(expected.to_stored_text())
        .bind(commit.to.code().to_string())
        .bind(commit.audit.at)
        .bind(&commit.audit.by.0)
        .bind(commit.audit.role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| ClubdeskError::Other(anyhow!("Failed to update request status: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            let exists = sqlx::query("SELECT 1 FROM requests WHERE id = $1")
                .bind(*id as Uuid)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| ClubdeskError::Other(anyhow!("Failed to fetch request: {}", e)))?
                .is_some();
            tx.rollback().await.map_err(|e| {
                ClubdeskError::Other(anyhow!("Failed to roll back transaction: {}", e))
            })?;

            if !exists {
                return Err(ClubdeskError::RequestNotFound(id));
            }
            tracing::debug!(expected = ?expected, "Compare-and-swap lost: stored status changed");
            return Ok(false);
        }

        if commit.record_history {
            sqlx::query(
                r#"
                INSERT INTO request_transitions (request_id, from_status, to_status, role, actor, at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(*id as Uuid)
            .bind(i16::from(commit.from.code()))
            .bind(i16::from(commit.to.code()))
            .bind(commit.audit.role.as_str())
            .bind(&commit.audit.by.0)
            .bind(commit.audit.at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                ClubdeskError::Other(anyhow!("Failed to record transition history: {}", e))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| ClubdeskError::Other(anyhow!("Failed to commit transition: {}", e)))?;

        Ok(true)
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<StoredRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM requests
            WHERE ($1::uuid IS NULL OR department_id = $1)
              AND ($2::uuid IS NULL OR club_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            REQUEST_COLUMNS
        ))
        .bind(filter.department_id.map(|id| id.0))
        .bind(filter.club_id.map(|id| id.0))
        // LIMIT NULL is no limit
        .bind(
            filter
                .store_limit()
                .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX)),
        )
        .fetch_all(self.pools.read())
        .await
        .map_err(|e| ClubdeskError::Other(anyhow!("Failed to list requests: {}", e)))?;

        rows.iter().map(decode_request).collect()
    }

    async fn history(&self, id: RequestId) -> Result<Vec<TransitionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT from_status, to_status, role, actor, at
            FROM request_transitions
            WHERE request_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(*id as Uuid)
        .fetch_all(self.pools.read())
        .await
        .map_err(|e| ClubdeskError::Other(anyhow!("Failed to fetch transition history: {}", e)))?;

        if rows.is_empty() {
            // Distinguish "no transitions yet" from "no such request"
            self.get(id).await?;
        }

        let decode =
            |e: sqlx::Error| ClubdeskError::Other(anyhow!("Failed to decode transition: {}", e));
        rows.iter()
            .map(|row| {
                let role: String = row.try_get("role").map_err(decode)?;
                Ok(TransitionRecord {
                    request_id: id,
                    from: status_from_code(row.try_get("from_status").map_err(decode)?)?,
                    to: status_from_code(row.try_get("to_status").map_err(decode)?)?,
                    role: parse_role(&role)?,
                    by: ActorId(row.try_get("actor").map_err(decode)?),
                    at: row.try_get("at").map_err(decode)?,
                })
            })
            .collect()
    }
}
