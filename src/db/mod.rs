/// Database Module
///
/// Connection handling for PostgreSQL. Each write opens its own connection,
/// so this module builds connect options rather than a pool.
use crate::config::PostgresSettings;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};

/// Build connect options from the `[postgres]` settings
pub fn connect_options(settings: &PostgresSettings) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.database)
        .username(&settings.user)
        .password(&settings.password)
}

/// Open a single connection
pub async fn connect(options: &PgConnectOptions) -> Result<PgConnection, sqlx::Error> {
    PgConnection::connect_with(options).await
}

/// Test that the database is reachable
pub async fn test_connection(options: &PgConnectOptions) -> Result<(), sqlx::Error> {
    let mut conn = connect(options).await?;
    sqlx::query("SELECT 1").execute(&mut conn).await?;
    conn.close().await
}
