//! PostgreSQL-backed tenant directory and session store.
//!
//! Two tables, point reads and upserts only:
//! - `clients`: one row per tenant, looked up by `twilio_number` or `id`
//! - `voice_sessions`: one row per call, keyed by the platform call ID
//!
//! ID columns may be `uuid` or `text`. Reads cast them to text and filters
//! compare on `id::text`; inserts bind whichever type the server reports for
//! the parameter. Schema management is out of scope; the tables are expected
//! to exist.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use switchboard_core::{
    BearerToken, CallSession, SessionContext, SessionStore, SwitchboardError, SwitchboardResult,
    TenantDirectory, TenantId, TenantRecord,
};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Time to wait for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "switchboard".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from `SWITCHBOARD_DB_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("SWITCHBOARD_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("SWITCHBOARD_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("SWITCHBOARD_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("SWITCHBOARD_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("SWITCHBOARD_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SWITCHBOARD_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("SWITCHBOARD_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// STORE
// ============================================================================

const CLIENT_COLUMNS: &str =
    "id::text AS id, twilio_number, ghl_token, location_id, calendar_id, client_name, timezone";

const SESSION_COLUMNS: &str = "id::text AS id, client_id::text AS client_id, caller, called_number, \
     started_at, ended_at, recording_url, context";

/// Postgres implementation of [`TenantDirectory`] and [`SessionStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn conn(&self) -> SwitchboardResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SwitchboardError::storage(format!("pool: {}", e)))
    }

    async fn client_where(
        &self,
        predicate: &str,
        value: &str,
    ) -> SwitchboardResult<Option<TenantRecord>> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM clients WHERE {} = $1 LIMIT 1", CLIENT_COLUMNS, predicate);
        let row = conn.query_opt(sql.as_str(), &[&value]).await.map_err(storage)?;
        row.as_ref().map(tenant_from_row).transpose()
    }
}

/// An ID parameter bound as the column type the server expects.
#[derive(Debug, PartialEq)]
enum IdParam<'a> {
    Text(&'a str),
    Uuid(Uuid),
}

impl<'a> IdParam<'a> {
    fn bind(ty: &Type, field: &str, value: &'a str) -> SwitchboardResult<Self> {
        if *ty == Type::UUID {
            Uuid::parse_str(value)
                .map(Self::Uuid)
                .map_err(|e| SwitchboardError::invalid_value(field, e.to_string()))
        } else {
            Ok(Self::Text(value))
        }
    }

    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Text(value) => value,
            Self::Uuid(value) => value,
        }
    }
}

fn storage(err: tokio_postgres::Error) -> SwitchboardError {
    SwitchboardError::storage(err.to_string())
}

fn tenant_from_row(row: &Row) -> SwitchboardResult<TenantRecord> {
    let id: String = row.try_get("id").map_err(storage)?;
    let token: Option<String> = row.try_get("ghl_token").map_err(storage)?;
    let display_name: Option<String> = row.try_get("client_name").map_err(storage)?;

    Ok(TenantRecord {
        id: TenantId::new(id),
        phone_number: row.try_get("twilio_number").map_err(storage)?,
        crm_token: token.map(BearerToken::new),
        location_id: row.try_get("location_id").map_err(storage)?,
        calendar_id: row.try_get("calendar_id").map_err(storage)?,
        display_name: display_name.unwrap_or_default(),
        timezone: row.try_get("timezone").map_err(storage)?,
    })
}

fn session_from_row(row: &Row) -> SwitchboardResult<CallSession> {
    let tenant_id: String = row.try_get("client_id").map_err(storage)?;
    let context: Option<serde_json::Value> = row.try_get("context").map_err(storage)?;

    Ok(CallSession {
        call_id: row.try_get("id").map_err(storage)?,
        tenant_id: TenantId::new(tenant_id),
        caller: row.try_get("caller").map_err(storage)?,
        called_number: row.try_get("called_number").map_err(storage)?,
        started_at: row.try_get("started_at").map_err(storage)?,
        ended_at: row.try_get("ended_at").map_err(storage)?,
        recording_url: row.try_get("recording_url").map_err(storage)?,
        context: context.map(SessionContext::from_value).unwrap_or_default(),
    })
}

#[async_trait]
impl TenantDirectory for PgStore {
    async fn tenant_by_phone(&self, phone_number: &str) -> SwitchboardResult<Option<TenantRecord>> {
        self.client_where("twilio_number", phone_number).await
    }

    async fn tenant_by_id(&self, tenant_id: &TenantId) -> SwitchboardResult<Option<TenantRecord>> {
        self.client_where("id::text", tenant_id.as_str()).await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn upsert_session(&self, session: &CallSession) -> SwitchboardResult<CallSession> {
        let conn = self.conn().await?;
        let sql = format!(
            "INSERT INTO voice_sessions (id, client_id, caller, called_number, started_at, context) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                client_id = EXCLUDED.client_id, \
                caller = EXCLUDED.caller, \
                called_number = EXCLUDED.called_number, \
                started_at = EXCLUDED.started_at, \
                context = EXCLUDED.context \
             RETURNING {}",
            SESSION_COLUMNS
        );
        let stmt = conn.prepare_cached(sql.as_str()).await.map_err(storage)?;
        let (call_ty, tenant_ty) = match stmt.params() {
            [call, tenant, ..] => (call.clone(), tenant.clone()),
            _ => return Err(SwitchboardError::storage("unexpected upsert parameters")),
        };
        let call_id = IdParam::bind(&call_ty, "call_id", &session.call_id)?;
        let tenant_id = IdParam::bind(&tenant_ty, "client_id", session.tenant_id.as_str())?;
        let context = session.context.to_value();
        let row = conn
            .query_one(
                &stmt,
                &[
                    call_id.as_sql(),
                    tenant_id.as_sql(),
                    &session.caller,
                    &session.called_number,
                    &session.started_at,
                    &context,
                ],
            )
            .await
            .map_err(storage)?;
        session_from_row(&row)
    }

    async fn get_session(&self, call_id: &str) -> SwitchboardResult<Option<CallSession>> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM voice_sessions WHERE id::text = $1", SESSION_COLUMNS);
        let row = conn.query_opt(sql.as_str(), &[&call_id]).await.map_err(storage)?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn update_context(
        &self,
        call_id: &str,
        context: &SessionContext,
    ) -> SwitchboardResult<bool> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE voice_sessions SET context = $2 WHERE id::text = $1",
                &[&call_id, &context.to_value()],
            )
            .await
            .map_err(storage)?;
        Ok(updated > 0)
    }

    async fn close_session(
        &self,
        call_id: &str,
        ended_at: DateTime<Utc>,
        recording_url: Option<&str>,
        context: &SessionContext,
    ) -> SwitchboardResult<bool> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE voice_sessions SET ended_at = $2, recording_url = $3, context = $4 \
                 WHERE id::text = $1",
                &[&call_id, &ended_at, &recording_url, &context.to_value()],
            )
            .await
            .map_err(storage)?;
        Ok(updated > 0)
    }
}
