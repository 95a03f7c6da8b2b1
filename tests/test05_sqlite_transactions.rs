#![cfg(feature = "sqlite")]

use std::sync::Arc;

use rawl::prelude::*;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    registry: Arc<PoolRegistry>,
    dsn: String,
}

impl Fixture {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let dsn = format!("sqlite://{}", dir.path().join("tx.db").display());
        let registry = Arc::new(PoolRegistry::new(PoolConfig::default().with_max_connections(4))?);
        let fixture = Fixture {
            _dir: dir,
            registry,
            dsn,
        };
        fixture.model()?.execute_batch(
            "CREATE TABLE rawl (rawl_id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR);
             INSERT INTO rawl (name) VALUES ('seed');",
        )?;
        Ok(fixture)
    }

    fn model(&self) -> Result<Model, RawlError> {
        Model::new(
            Arc::clone(&self.registry),
            self.dsn.clone(),
            vec!["rawl_id", "name"],
            "rawl",
            None,
        )
    }
}

#[test]
fn uncommitted_work_is_invisible_until_commit() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut writer = fx.model()?;
    let mut reader = fx.model()?;

    writer.start_transaction()?;
    assert_eq!(writer.transaction_status(), TransactionStatus::Idle);
    writer.insert_map([("name", "pending")], &ExecOptions::new().commit(false))?;
    assert_eq!(writer.transaction_status(), TransactionStatus::InTransaction);

    // the writer sees its own row, the reader does not
    assert_eq!(writer.all()?.len(), 2);
    assert_eq!(reader.all()?.len(), 1);

    writer.commit()?;
    assert!(!writer.has_open_transaction());
    assert_eq!(reader.all()?.len(), 2);
    Ok(())
}

#[test]
fn rollback_discards_work() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut writer = fx.model()?;
    let mut reader = fx.model()?;

    writer.start_transaction()?;
    writer.query(
        "UPDATE rawl SET name = {0} WHERE rawl_id = {1};",
        &["changed".into(), RowValues::Int(1)],
        &ExecOptions::new(),
    )?;
    writer.insert_map([("name", "doomed")], &ExecOptions::new())?;
    writer.rollback()?;

    let rows = reader.all()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name")?, &RowValues::Text("seed".into()));
    Ok(())
}

#[test]
fn nested_start_fails_and_keeps_the_open_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut model = fx.model()?;

    model.start_transaction()?;
    model.insert_map([("name", "kept")], &ExecOptions::new())?;
    let err = model.start_transaction().unwrap_err();
    assert!(matches!(err, RawlError::TransactionError(_)));
    assert!(model.has_open_transaction());

    model.commit()?;
    assert_eq!(fx.model()?.all()?.len(), 2);
    Ok(())
}

#[test]
fn cleanup_is_safe_when_nothing_is_open() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut model = fx.model()?;
    model.commit()?;
    model.rollback()?;
    model.start_transaction()?;
    model.rollback()?;
    model.rollback()?;
    Ok(())
}

#[test]
fn explicit_commit_inside_a_transaction_publishes_early() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut writer = fx.model()?;
    let mut reader = fx.model()?;

    writer.start_transaction()?;
    writer.insert_map([("name", "early")], &ExecOptions::new().commit(true))?;
    assert_eq!(reader.all()?.len(), 2);

    writer.insert_map([("name", "late")], &ExecOptions::new())?;
    writer.rollback()?;
    assert_eq!(reader.all()?.len(), 2);
    Ok(())
}

#[test]
fn in_transaction_commits_on_ok_and_rolls_back_on_err() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut model = fx.model()?;

    let pk = model.in_transaction(|m| m.insert_map([("name", "closure")], &ExecOptions::new()))?;
    assert_eq!(pk, RowValues::Int(2));

    let result: Result<(), RawlError> = model.in_transaction(|m| {
        m.insert_map([("name", "lost")], &ExecOptions::new())?;
        m.query("SELECT * FROM missing_table", &[], &ExecOptions::new())?;
        Ok(())
    });
    assert!(result.is_err());
    assert!(!model.has_open_transaction());
    assert_eq!(model.all()?.len(), 2);
    Ok(())
}

#[test]
fn dropping_a_model_mid_transaction_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    {
        let mut model = fx.model()?;
        model.start_transaction()?;
        model.insert_map([("name", "abandoned")], &ExecOptions::new())?;
    }
    assert_eq!(fx.model()?.all()?.len(), 1);
    Ok(())
}
