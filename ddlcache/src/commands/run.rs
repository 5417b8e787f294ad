//! Implementation of command line option for running a SQL script

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use ddlcache::{Domain, StatementOutcome};
use ddlcache_catalog::Catalog;
use ddlcache_clap_blocks::{catalog::CatalogConfig, executor::ExecutorConfig};
use ddlcache_jobs::ExecutorArgs;
use ddlcache_txn::MemoryRowSink;
use tokio::io::AsyncReadExt;
use tracing::info;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    catalog_config: CatalogConfig,

    #[clap(flatten)]
    executor_config: ExecutorConfig,

    /// Name of this node's catalog replica, as it appears in logs
    #[clap(long = "node-id", env = "DDLCACHE_NODE_ID", default_value = "node-1", action)]
    node_id: String,

    /// Database to use before the first statement runs
    #[clap(short = 'd', long = "database", env = "DDLCACHE_DATABASE", action)]
    database: Option<String>,

    /// Keep executing after a statement fails
    #[clap(short = 'f', long = "force", action)]
    force: bool,

    /// Script to run; statements are read from stdin when omitted
    #[clap(action)]
    file: Option<PathBuf>,
}

pub(crate) async fn command(config: Config) -> anyhow::Result<()> {
    let script = match &config.file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut script = String::new();
            tokio::io::stdin()
                .read_to_string(&mut script)
                .await
                .context("reading stdin")?;
            script
        }
    };
    let statements = ddlcache_sql::parse_statements(&script)?;

    let store = config.catalog_config.make_store()?;
    let catalog = Catalog::load(store, config.catalog_config.catalog_args())
        .await
        .context("loading catalog")?;
    let domain = Domain::start(
        &config.node_id,
        Arc::new(catalog),
        ExecutorArgs::from(&config.executor_config),
        Arc::new(MemoryRowSink::default()),
    )
    .await;

    let mut session = domain.new_session();
    if let Some(database) = &config.database {
        session.execute(&format!("use `{database}`")).await?;
    }

    let total = statements.len();
    let mut failed = 0;
    for statement in statements {
        match session.execute_statement(statement).await {
            Ok(outcome) => println!("{}", describe(outcome)),
            Err(e) => {
                println!("ERROR {}: {e}", e.code());
                failed += 1;
                if !config.force {
                    break;
                }
            }
        }
    }
    info!(total, failed, version = %domain.catalog().current_version(), "script finished");
    domain.shutdown().await;

    if failed > 0 {
        anyhow::bail!("{failed} of {total} statements failed");
    }
    Ok(())
}

fn describe(outcome: StatementOutcome) -> String {
    match outcome {
        StatementOutcome::Ok => "OK".to_string(),
        StatementOutcome::SchemaChanged(version) => format!("OK, schema version {version}"),
        StatementOutcome::Buffered { rows } => format!("OK, {rows} row(s) pending"),
        StatementOutcome::Committed(info) => format!(
            "OK, committed {} row(s) at schema version {}",
            info.rows, info.schema_version
        ),
        StatementOutcome::RolledBack { rows } => format!("OK, rolled back {rows} row(s)"),
    }
}
