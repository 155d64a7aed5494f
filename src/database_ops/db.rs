use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::{EtlError, EtlResult};

/// Target store handle. One connection: the loader is a single sequential writer.
#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, schema: &str) -> EtlResult<Self> {
        let unavailable = |source| EtlError::SinkUnavailable {
            action: "connect",
            source,
        };
        let options = connect_options(database_url, schema).map_err(unavailable)?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(unavailable)?;
        info!(schema, "connected to target db");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("target db connection closed");
    }
}

/// Options parsed from the DSN (host, credentials, `sslmode`, ...) plus the schema search path.
fn connect_options(database_url: &str, schema: &str) -> Result<PgConnectOptions, sqlx::Error> {
    // Table names are schema-qualified anyway; search_path covers ad-hoc statements.
    Ok(PgConnectOptions::from_str(database_url)?.options([("search_path", schema)]))
}
