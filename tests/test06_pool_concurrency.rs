#![cfg(feature = "sqlite")]

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use rawl::IsolationLevel;
use rawl::prelude::*;

#[test]
fn exhausted_pool_blocks_then_serves_everyone() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dsn = format!("sqlite://{}", dir.path().join("pool.db").display());
    let registry = Arc::new(PoolRegistry::new(
        PoolConfig::default()
            .with_max_connections(2)
            .with_acquire_timeout(Duration::from_secs(20)),
    )?);

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let dsn = dsn.clone();
        handles.push(thread::spawn(move || -> Result<(), RawlError> {
            barrier.wait();
            let conn = registry.acquire(&dsn, None)?;
            thread::sleep(Duration::from_millis(50));
            drop(conn);
            Ok(())
        }));
    }

    for handle in handles {
        handle.join().map_err(|_| "worker panicked")??;
    }

    let stats = registry.stats(&dsn).ok_or("pool was never created")?;
    assert!(stats.connections <= 2);
    Ok(())
}

#[test]
fn acquisition_gives_up_after_the_timeout() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dsn = format!("sqlite://{}", dir.path().join("starved.db").display());
    let registry = PoolRegistry::new(
        PoolConfig::default()
            .with_max_connections(1)
            .with_acquire_timeout(Duration::from_millis(200)),
    )?;

    let held = registry.acquire(&dsn, None)?;
    let err = registry.acquire(&dsn, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    drop(held);
    assert!(registry.acquire(&dsn, None).is_ok());
    Ok(())
}

#[test]
fn models_on_one_registry_share_a_pool() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dsn = format!("sqlite://{}", dir.path().join("shared.db").display());
    let registry = Arc::new(PoolRegistry::new(PoolConfig::default().with_max_connections(3))?);

    let mut first = Model::new(Arc::clone(&registry), dsn.clone(), "id name", "items", None)?;
    first.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);")?;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let registry = Arc::clone(&registry);
        let dsn = dsn.clone();
        handles.push(thread::spawn(move || -> Result<Vec<ResultRow>, RawlError> {
            let mut model = Model::new(registry, dsn, "id name", "items", None)?;
            model.all()
        }));
    }
    for handle in handles {
        assert!(handle.join().map_err(|_| "worker panicked")??.is_empty());
    }
    assert!(registry.stats(&dsn).is_some_and(|s| s.connections <= 3));
    Ok(())
}

#[test]
fn closed_pool_is_recreated_on_next_acquire() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dsn = format!("sqlite://{}", dir.path().join("closed.db").display());
    let registry = PoolRegistry::new(PoolConfig::default())?;

    assert!(registry.stats(&dsn).is_none());
    drop(registry.acquire(&dsn, None)?);
    assert!(registry.stats(&dsn).is_some());

    assert!(registry.close(&dsn));
    assert!(!registry.close(&dsn));
    assert!(registry.stats(&dsn).is_none());

    drop(registry.acquire(&dsn, None)?);
    assert!(registry.stats(&dsn).is_some());
    Ok(())
}

#[test]
fn checkout_resets_isolation_to_read_committed() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let dsn = format!("sqlite://{}", dir.path().join("isolation.db").display());
    let registry = PoolRegistry::new(PoolConfig::default().with_max_connections(1))?;

    let mut conn = registry.acquire(&dsn, None)?;
    assert_eq!(conn.isolation(), IsolationLevel::ReadCommitted);
    conn.set_isolation(IsolationLevel::Serializable)?;
    assert_eq!(conn.isolation(), IsolationLevel::Serializable);
    drop(conn);

    // max 1, so this is the same connection handed back
    let conn = registry.acquire(&dsn, None)?;
    assert_eq!(conn.isolation(), IsolationLevel::ReadCommitted);
    Ok(())
}
