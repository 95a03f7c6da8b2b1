#![cfg(feature = "postgres")]

use std::sync::Arc;
use std::time::Duration;

use rawl::prelude::*;
#[cfg(feature = "test-utils")]
use rawl::test_utils::{EmbeddedPostgres, setup_postgres_embedded, stop_postgres_embedded};

const SCHEMA: &str = "
    DROP TABLE IF EXISTS rawl;
    CREATE TABLE rawl (
        rawl_id serial NOT NULL PRIMARY KEY,
        stamp timestamp NOT NULL DEFAULT now(),
        name varchar,
        data bytea
    );
    INSERT INTO rawl (name) VALUES ('I am row one.');
    INSERT INTO rawl (name) VALUES ('I am row two.');
    INSERT INTO rawl (name) VALUES ('I am row three.');
    INSERT INTO rawl (name) VALUES ('I am row four.');
";

/// The server under test: `RAWL_DSN` if set, else an embedded one.
struct Server {
    dsn: String,
    #[cfg(feature = "test-utils")]
    embedded: Option<EmbeddedPostgres>,
}

impl Server {
    fn start() -> Result<Option<Self>, Box<dyn std::error::Error>> {
        if let Ok(dsn) = std::env::var("RAWL_DSN") {
            return Ok(Some(Server {
                dsn,
                #[cfg(feature = "test-utils")]
                embedded: None,
            }));
        }
        Self::embedded()
    }

    #[cfg(feature = "test-utils")]
    fn embedded() -> Result<Option<Self>, Box<dyn std::error::Error>> {
        let pg = setup_postgres_embedded("rawl_test")?;
        Ok(Some(Server {
            dsn: pg.database_url.clone(),
            embedded: Some(pg),
        }))
    }

    #[cfg(not(feature = "test-utils"))]
    fn embedded() -> Result<Option<Self>, Box<dyn std::error::Error>> {
        Ok(None)
    }

    fn stop(self) -> Result<(), Box<dyn std::error::Error>> {
        #[cfg(feature = "test-utils")]
        if let Some(pg) = self.embedded {
            stop_postgres_embedded(pg)?;
        }
        Ok(())
    }
}

#[test]
fn postgres_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let Some(server) = Server::start()? else {
        eprintln!("skipping: set RAWL_DSN or enable the test-utils feature");
        return Ok(());
    };
    let registry = Arc::new(PoolRegistry::new(PoolConfig::default().with_max_connections(4))?);
    let model = |registry: &Arc<PoolRegistry>, columns: &str| {
        Model::new(Arc::clone(registry), server.dsn.clone(), columns, "rawl", None)
    };

    let mut rawl = model(&registry, "rawl_id stamp name")?;
    rawl.execute_batch(SCHEMA)?;

    let all = rawl.all()?;
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].get("name")?, &RowValues::Text("I am row one.".into()));
    assert!(matches!(all[0].get("stamp")?, RowValues::Timestamp(_)));

    let two = rawl.get(2)?;
    assert_eq!(two.len(), 1);
    assert_eq!(two[0].get_index(2)?, &RowValues::Text("I am row two.".into()));
    assert_eq!(rawl.delete(2)?, 1);
    assert!(rawl.get(2)?.is_empty());

    // serial columns are int4; keys come back as plain integers
    let pk = rawl.insert_map([("name", "Row five")], &ExecOptions::new())?;
    assert_eq!(pk, RowValues::Int(5));

    // transaction visibility across connections
    let mut reader = model(&registry, "rawl_id stamp name")?;
    rawl.start_transaction()?;
    rawl.insert_map([("name", "pending")], &ExecOptions::new())?;
    assert_eq!(reader.all()?.len(), 4);
    rawl.commit()?;
    assert_eq!(reader.all()?.len(), 5);

    rawl.start_transaction()?;
    rawl.query("DELETE FROM rawl", &[], &ExecOptions::new())?;
    rawl.rollback()?;
    assert_eq!(reader.all()?.len(), 5);

    // an error aborts the transaction; committing it reports the loss
    rawl.start_transaction()?;
    rawl.insert_map([("name", "lost")], &ExecOptions::new())?;
    assert!(rawl.query("SELECT * FROM missing_table", &[], &ExecOptions::new()).is_err());
    let err = rawl.commit().unwrap_err();
    assert!(matches!(err, RawlError::TransactionError(_)));
    assert!(!rawl.has_open_transaction());
    assert_eq!(reader.all()?.len(), 5);

    // a statement that outlives its deadline is cancelled by the server
    let err = rawl
        .query(
            "SELECT pg_sleep(5)",
            &[],
            &ExecOptions::new()
                .with_timeout(Duration::from_millis(300))
                .columns(["slept"]),
        )
        .unwrap_err();
    assert!(matches!(err, RawlError::PostgresError(_)));
    assert_eq!(rawl.all()?.len(), 5);

    // blobs and backslashes read back unchanged
    let mut files = model(&registry, "rawl_id name data")?;
    let bytes = vec![0xde, 0xad, 0x00, b'\'', b'\\'];
    let tricky = r"C:\temp\' OR 1=1 --";
    let pk = files.insert_map(
        [("name", RowValues::from(tricky)), ("data", RowValues::Blob(bytes.clone()))],
        &ExecOptions::new(),
    )?;
    let rows = files.get(pk)?;
    let row = &rows[0];
    assert_eq!(row.get("name")?, &RowValues::Text(tricky.into()));
    assert_eq!(row.get("data")?, &RowValues::Blob(bytes));

    // types without a binary decoder come back through their text form
    let rows = rawl.query(
        "SELECT sum(rawl_id), avg(rawl_id)::numeric(10,2), \
         'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid, '1 day'::interval, \
         NULL::numeric, true, '\\xbeef'::bytea FROM rawl",
        &[],
        &ExecOptions::new().columns(["total", "mean", "id", "span", "nothing", "flag", "raw"]),
    )?;
    let row = &rows[0];
    assert!(matches!(row.get("total")?, RowValues::Int(_)));
    assert!(row.get("mean")?.as_text().is_some_and(|m| m.parse::<f64>().is_ok()));
    assert_eq!(
        row.get("id")?,
        &RowValues::Text("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11".into())
    );
    assert_eq!(row.get("span")?, &RowValues::Text("1 day".into()));
    assert_eq!(row.get("nothing")?, &RowValues::Null);
    assert_eq!(row.get("flag")?, &RowValues::Bool(true));
    assert_eq!(row.get("raw")?, &RowValues::Blob(vec![0xbe, 0xef]));

    drop(files);
    drop(rawl);
    drop(reader);
    drop(registry);
    server.stop()?;
    Ok(())
}
