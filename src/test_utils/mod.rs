//! Helpers for tests and benchmarks. Enabled with the `test-utils` feature.

use postgresql_embedded::blocking::PostgreSQL;

/// A running embedded `PostgreSQL` server with one database created.
///
/// The server stops when this value is dropped.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
}

/// Install (from the bundled archive), start and provision an embedded server.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, or the database
/// cannot be created.
pub fn setup_postgres_embedded(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    let mut postgresql = PostgreSQL::default();
    postgresql.setup()?;
    postgresql.start()?;
    postgresql.create_database(db_name)?;

    let port = postgresql.settings().port;
    let database_url = postgresql.settings().url(db_name);
    tracing::info!(port, "embedded postgres started");

    Ok(EmbeddedPostgres {
        postgresql,
        port,
        database_url,
    })
}

/// Stop the server explicitly, surfacing shutdown errors.
///
/// # Errors
/// Returns an error if the server does not stop cleanly.
pub fn stop_postgres_embedded(
    postgres: EmbeddedPostgres,
) -> Result<(), Box<dyn std::error::Error>> {
    postgres.postgresql.stop()?;
    Ok(())
}
