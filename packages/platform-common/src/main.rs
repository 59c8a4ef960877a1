use std::sync::Arc;

use futures::FutureExt;
use platform_common::{
    connect, Closer, Db, DbConfig, DbScope, Query, ShutdownSignal, TxError, TxManager, TxOptions,
    TxnPolicy,
};
use sea_orm::DbErr;
use tracing::{error, info};

mod telemetry;

/// Connects, proves a transaction round-trips, then idles until SIGINT/SIGTERM
/// and closes the pool through the closer.
#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let closer = match Closer::with_signals(&ShutdownSignal::DEFAULT) {
        Ok(closer) => closer,
        Err(e) => {
            eprintln!("❌ Failed to install signal handlers: {e}");
            std::process::exit(1);
        }
    };

    let config = match DbConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let db = match connect(&config).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let probed = probe(&db, config.txn_policy).await;

    // Last handle to the pool from here on.
    closer.register(move || async move {
        info!("closing database pool");
        db.close().await
    });

    match probed {
        Ok(value) => info!(value, "transaction probe succeeded"),
        Err(e) => {
            error!(error = %e, "transaction probe failed");
            shutdown(closer).await;
            std::process::exit(1);
        }
    }

    println!("✅ Database reachable; waiting for shutdown signal");
    closer.wait().await;
    info!("bye");
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error(transparent)]
    Db(#[from] DbErr),
    #[error(transparent)]
    Tx(#[from] TxError),
}

async fn probe(db: &Db, policy: TxnPolicy) -> Result<i32, ProbeError> {
    let manager = TxManager::with_policy(db.clone(), policy);
    let db = db.clone();
    let options = TxOptions::read_committed().read_only().named("probe");

    manager
        .run_in_transaction(&DbScope::root(), options, move |scope| {
            async move {
                let q = Query::new("probe.select_one", "SELECT 1 AS one");
                let row = db.query_one(scope, &q, vec![]).await?;
                let value = match row {
                    Some(row) => row.try_get::<i32>("", "one")?,
                    None => 0,
                };
                Ok::<_, ProbeError>(value)
            }
            .boxed()
        })
        .await
}

async fn shutdown(closer: Arc<Closer>) {
    closer.trigger_shutdown().await;
    closer.wait().await;
}
