use sea_query::*;
use sea_query_sqlx::SqlxBinder;
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgConnectOptions, PgRow},
};
use tracing::instrument;

use crate::{
    Claim, ClaimStatus, LockOutcome, LockRequest, NewClaim, NewResource, RecordStore, Resource,
    StoreErr, StoreOptions, StoreTransaction, WaitDiscipline, error::type_err, statement,
};

use super::sqlx_common::*;

/// A record store backed by a PostgreSQL connection pool.
///
/// Row locks are the server's own: `SELECT ... FOR UPDATE` with `NOWAIT` or
/// `SKIP LOCKED`, bounded waits through `SET LOCAL lock_timeout`.
#[derive(Debug, Clone)]
pub struct SqlxPostgresStore {
    pool: PgPool,
}

/// A transaction on one pooled PostgreSQL connection
pub struct SqlxPostgresTransaction {
    txn: sqlx::Transaction<'static, Postgres>,
}

impl std::fmt::Debug for SqlxPostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqlxPostgresTransaction")
    }
}

impl SqlxPostgresStore {
    pub async fn connect(options: StoreOptions) -> Result<Self, StoreErr> {
        options.validate()?;
        let mut opt = options
            .url
            .parse::<PgConnectOptions>()
            .map_err(|e| StoreErr::Conn(e.to_string()))?;
        if !options.sqlx_logging {
            use sqlx::ConnectOptions;
            opt = opt.disable_statement_logging();
        }
        let pool = options
            .pool_options::<Postgres>()
            .connect_with(opt)
            .await
            .map_err(sqlx_error_to_conn_err)?;
        Ok(Self { pool })
    }

    pub fn from_sqlx_postgres_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_postgres_connection_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `resources` and `claims` tables if they do not exist yet
    pub async fn create_schema(&self, unique_requesters: bool) -> Result<(), StoreErr> {
        let stmts = [
            statement::create_resources_table().to_string(PostgresQueryBuilder),
            statement::create_claims_table().to_string(PostgresQueryBuilder),
            statement::create_claims_index(unique_requesters).to_string(PostgresQueryBuilder),
        ];
        for sql in stmts {
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(sqlx_error_to_exec_err)?;
        }
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn resource_from_row(row: &PgRow) -> Result<Resource, StoreErr> {
    let capacity: Option<i32> = row.try_get("capacity").map_err(sqlx_error_to_type_err)?;
    Ok(Resource {
        id: row.try_get("id").map_err(sqlx_error_to_type_err)?,
        name: row.try_get("name").map_err(sqlx_error_to_type_err)?,
        capacity: capacity
            .map(<u32 as TryFrom<i32>>::try_from)
            .transpose()
            .map_err(type_err)?,
        version: row.try_get("version").map_err(sqlx_error_to_type_err)?,
    })
}

fn claim_from_row(row: &PgRow) -> Result<Claim, StoreErr> {
    let status: String = row.try_get("status").map_err(sqlx_error_to_type_err)?;
    Ok(Claim {
        id: row.try_get("id").map_err(sqlx_error_to_type_err)?,
        resource_id: row.try_get("resource_id").map_err(sqlx_error_to_type_err)?,
        requester_id: row.try_get("requester_id").map_err(sqlx_error_to_type_err)?,
        status: status.parse::<ClaimStatus>().map_err(type_err)?,
        created_at: row.try_get("created_at").map_err(sqlx_error_to_type_err)?,
    })
}

fn count_from_scalar(count: i64) -> Result<u64, StoreErr> {
    <u64 as TryFrom<i64>>::try_from(count).map_err(type_err)
}

#[async_trait::async_trait]
impl RecordStore for SqlxPostgresStore {
    type Transaction = SqlxPostgresTransaction;

    async fn begin(&self) -> Result<SqlxPostgresTransaction, StoreErr> {
        let txn = self.pool.begin().await.map_err(sqlx_error_to_conn_err)?;
        Ok(SqlxPostgresTransaction { txn })
    }

    async fn insert_resource(&self, resource: NewResource) -> Result<Resource, StoreErr> {
        let (sql, values) =
            statement::insert_resource(&resource)?.build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_exec_err)?;
        resource_from_row(&row)
    }

    async fn find_resource(&self, resource_id: i64) -> Result<Option<Resource>, StoreErr> {
        let (sql, values) =
            statement::select_resource(resource_id, None).build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_query_err)?
            .as_ref()
            .map(resource_from_row)
            .transpose()
    }

    async fn find_resources(&self, resource_ids: &[i64]) -> Result<Vec<Resource>, StoreErr> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (sql, values) =
            statement::select_resources(resource_ids).build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(&sql, values)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_query_err)?
            .iter()
            .map(resource_from_row)
            .collect()
    }

    async fn count_claims(&self, resource_id: i64) -> Result<u64, StoreErr> {
        let (sql, values) = statement::count_claims(resource_id).build_sqlx(PostgresQueryBuilder);
        let count = sqlx::query_scalar_with::<_, i64, _>(&sql, values)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_query_err)?;
        count_from_scalar(count)
    }

    async fn find_claims_by_resources(&self, resource_ids: &[i64]) -> Result<Vec<Claim>, StoreErr> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (sql, values) =
            statement::select_claims_by_resources(resource_ids).build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(&sql, values)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_query_err)?
            .iter()
            .map(claim_from_row)
            .collect()
    }
}

#[async_trait::async_trait]
impl StoreTransaction for SqlxPostgresTransaction {
    #[instrument(level = "trace", skip(self))]
    async fn lock_resource(
        &mut self,
        resource_id: i64,
        request: LockRequest,
    ) -> Result<LockOutcome, StoreErr> {
        if let Some(budget) = request.wait_budget() {
            let sql = format!(
                "SET LOCAL lock_timeout = '{}ms'",
                budget.as_millis().max(1)
            );
            sqlx::query(&sql)
                .execute(&mut *self.txn)
                .await
                .map_err(sqlx_error_to_exec_err)?;
        }
        let (sql, values) = statement::select_resource(resource_id, Some(request.discipline))
            .build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values)
            .fetch_optional(&mut *self.txn)
            .await;
        match result {
            Ok(Some(row)) => Ok(LockOutcome::Acquired(resource_from_row(&row)?)),
            Ok(None) if request.discipline == WaitDiscipline::Skip => {
                // SKIP LOCKED hides held rows just like missing ones
                Ok(match self.find_resource(resource_id).await? {
                    Some(_) => LockOutcome::Busy,
                    None => LockOutcome::NotFound,
                })
            }
            Ok(None) => Ok(LockOutcome::NotFound),
            Err(err) => match sqlstate(&err).as_deref() {
                Some(LOCK_NOT_AVAILABLE) if request.discipline.may_wait() => {
                    Ok(LockOutcome::TimedOut)
                }
                Some(LOCK_NOT_AVAILABLE) | Some(DEADLOCK_DETECTED) => Ok(LockOutcome::Busy),
                _ => Err(sqlx_error_to_query_err(err)),
            },
        }
    }

    async fn find_resource(&mut self, resource_id: i64) -> Result<Option<Resource>, StoreErr> {
        let (sql, values) =
            statement::select_resource(resource_id, None).build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(&sql, values)
            .fetch_optional(&mut *self.txn)
            .await
            .map_err(sqlx_error_to_query_err)?
            .as_ref()
            .map(resource_from_row)
            .transpose()
    }

    async fn count_claims(&mut self, resource_id: i64) -> Result<u64, StoreErr> {
        let (sql, values) = statement::count_claims(resource_id).build_sqlx(PostgresQueryBuilder);
        let count = sqlx::query_scalar_with::<_, i64, _>(&sql, values)
            .fetch_one(&mut *self.txn)
            .await
            .map_err(sqlx_error_to_query_err)?;
        count_from_scalar(count)
    }

    async fn count_claims_by_requester(
        &mut self,
        resource_id: i64,
        requester_id: &str,
    ) -> Result<u64, StoreErr> {
        let (sql, values) = statement::count_claims_by_requester(resource_id, requester_id)
            .build_sqlx(PostgresQueryBuilder);
        let count = sqlx::query_scalar_with::<_, i64, _>(&sql, values)
            .fetch_one(&mut *self.txn)
            .await
            .map_err(sqlx_error_to_query_err)?;
        count_from_scalar(count)
    }

    async fn insert_claim(&mut self, claim: NewClaim) -> Result<Claim, StoreErr> {
        let (sql, values) = statement::insert_claim(&claim)?.build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_one(&mut *self.txn)
            .await
            .map_err(sqlx_error_to_exec_err)?;
        claim_from_row(&row)
    }

    async fn bump_version(&mut self, resource_id: i64, expected: i64) -> Result<bool, StoreErr> {
        let (sql, values) =
            statement::bump_version(resource_id, expected).build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values)
            .execute(&mut *self.txn)
            .await
            .map_err(sqlx_error_to_exec_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self) -> Result<(), StoreErr> {
        self.txn.commit().await.map_err(sqlx_error_to_exec_err)
    }

    async fn rollback(self) -> Result<(), StoreErr> {
        self.txn.rollback().await.map_err(sqlx_error_to_exec_err)
    }
}
