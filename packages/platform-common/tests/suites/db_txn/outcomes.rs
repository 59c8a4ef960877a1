// Terminal action per unit outcome: exactly one commit on success, exactly
// one rollback on error or panic, never both.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use platform_common::{Scope, TxError, TxManager, TxOptions};

use crate::support::{FakeDb, RepoError};

#[tokio::test]
async fn ok_unit_commits_once() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());

    let result = tm
        .run_in_transaction(&Scope::root(), TxOptions::read_committed(), |scope| {
            async move {
                assert!(scope.in_transaction());
                Ok::<_, RepoError>(42)
            }
            .boxed()
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(db.begins(), 1);
    assert_eq!(db.commits(), 1);
    assert_eq!(db.rollbacks(), 0);
    assert_eq!(db.open(), 0);
}

#[tokio::test]
async fn err_unit_rolls_back_once() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());

    let result = tm
        .run_in_transaction(&Scope::root(), TxOptions::read_committed(), |_scope| {
            async move { Err::<(), _>(RepoError::NotFound) }.boxed()
        })
        .await;

    let err = result.unwrap_err();
    let RepoError::Tx(tx_err) = &err else {
        panic!("expected a wrapped transaction error, got {err:?}");
    };
    assert!(matches!(tx_err, TxError::Unit { .. }));
    assert!(matches!(
        tx_err.unit_error::<RepoError>(),
        Some(RepoError::NotFound)
    ));
    assert!(err.to_string().contains("record not found"));

    assert_eq!(db.begins(), 1);
    assert_eq!(db.commits(), 0);
    assert_eq!(db.rollbacks(), 1);
}

#[tokio::test]
async fn panicking_unit_rolls_back_once() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());

    let result: Result<(), RepoError> = tm
        .run_in_transaction(&Scope::root(), TxOptions::read_committed(), |_scope| {
            async move {
                if true {
                    panic!("unit exploded");
                }
                Ok(())
            }
            .boxed()
        })
        .await;

    match result {
        Err(RepoError::Tx(TxError::Panic { payload, .. })) => {
            assert!(payload.contains("unit exploded"), "{payload}");
        }
        other => panic!("expected recovered panic, got {other:?}"),
    }
    assert_eq!(db.commits(), 0);
    assert_eq!(db.rollbacks(), 1);
    assert_eq!(db.open(), 0);
}

#[tokio::test]
async fn unit_panicking_before_its_future_rolls_back() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());
    let rows: Vec<u8> = Vec::new();

    let result: Result<(), RepoError> = tm
        .run_in_transaction(&Scope::root(), TxOptions::read_committed(), move |_scope| {
            let _third = rows[3];
            async move { Ok(()) }.boxed()
        })
        .await;

    match result {
        Err(RepoError::Tx(TxError::Panic { payload, .. })) => {
            assert!(payload.contains("index out of bounds"), "{payload}");
        }
        other => panic!("expected recovered panic, got {other:?}"),
    }
    assert_eq!(db.begins(), 1);
    assert_eq!(db.commits(), 0);
    assert_eq!(db.rollbacks(), 1);
    assert_eq!(db.open(), 0);
}

#[tokio::test]
async fn named_unit_is_reported_by_name() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());

    let result = tm
        .run_in_transaction(
            &Scope::root(),
            TxOptions::read_committed().named("orders.place"),
            |_scope| async move { Err::<(), _>(RepoError::NotFound) }.boxed(),
        )
        .await;

    let Err(RepoError::Tx(err)) = result else {
        panic!("expected transaction error");
    };
    assert_eq!(err.unit(), Some("orders.place"));
    assert!(err.to_string().contains("orders.place"), "{err}");
}

#[tokio::test]
async fn unnamed_unit_falls_back_to_closure_type() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());

    let result = tm
        .run_in_transaction(&Scope::root(), TxOptions::default(), |_scope| {
            async move { Err::<(), _>(RepoError::NotFound) }.boxed()
        })
        .await;

    let Err(RepoError::Tx(err)) = result else {
        panic!("expected transaction error");
    };
    assert!(err.unit().is_some_and(|unit| unit.contains("closure")));
}

#[tokio::test]
async fn begin_failure_skips_unit() {
    let db = FakeDb::new().failing_begin();
    let tm = TxManager::new(db.clone());
    let invoked = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&invoked);
    let result = tm
        .run_in_transaction(&Scope::root(), TxOptions::default(), move |_scope| {
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, TxError>(())
            }
            .boxed()
        })
        .await;

    assert!(matches!(result, Err(TxError::Begin(_))));
    assert!(!invoked.load(Ordering::SeqCst));
    assert_eq!(db.commits(), 0);
    assert_eq!(db.rollbacks(), 0);
}

#[tokio::test]
async fn rollback_failure_keeps_original_error() {
    let db = FakeDb::new().failing_rollback();
    let tm = TxManager::new(db.clone());

    let result = tm
        .run_in_transaction(&Scope::root(), TxOptions::read_committed(), |_scope| {
            async move { Err::<(), _>(RepoError::NotFound) }.boxed()
        })
        .await;

    let err = match result {
        Err(RepoError::Tx(err)) => err,
        other => panic!("expected transaction error, got {other:?}"),
    };
    assert!(matches!(
        err,
        TxError::Rollback {
            cause: Some(_),
            ..
        }
    ));
    assert!(matches!(
        err.unit_error::<RepoError>(),
        Some(RepoError::NotFound)
    ));

    let msg = err.to_string();
    assert!(msg.contains("record not found"), "{msg}");
    assert!(msg.contains("rollback refused"), "{msg}");

    assert_eq!(db.commits(), 0);
    assert_eq!(db.rollbacks(), 1);
}

#[tokio::test]
async fn commit_failure_is_reported() {
    let db = FakeDb::new().failing_commit();
    let tm = TxManager::new(db.clone());

    let result = tm
        .run_in_transaction(&Scope::root(), TxOptions::read_committed(), |_scope| {
            async move { Ok::<_, TxError>("saved") }.boxed()
        })
        .await;

    assert!(matches!(result, Err(TxError::Commit(_))));
    assert_eq!(db.commits(), 1);
    assert_eq!(db.rollbacks(), 0);
}

#[tokio::test]
async fn isolation_level_reaches_begin() {
    let db = FakeDb::new();
    let tm = TxManager::new(db.clone());

    tm.run_in_transaction(&Scope::root(), TxOptions::serializable(), |_scope| {
        async move { Ok::<_, TxError>(()) }.boxed()
    })
    .await
    .unwrap();

    let levels = db.isolation_levels();
    assert_eq!(levels.len(), 1);
    assert!(matches!(
        levels[0],
        Some(sea_orm::IsolationLevel::Serializable)
    ));
}
