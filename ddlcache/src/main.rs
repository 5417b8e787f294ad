//! Entrypoint of the ddlcache binary

use ddlcache_clap_blocks::logging::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt};

mod commands {
    pub(crate) mod run;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "ddlcache",
    about = "Run SQL scripts against a catalog with cached-table DDL",
    long_about = r#"Run SQL scripts against a catalog with cached-table DDL

Examples:
    # Run a script against a catalog kept in memory
    ddlcache run script.sql

    # Run statements from stdin against a catalog persisted under ~/.ddlcache
    echo "create database test; use test; create table t (a int); alter table t cache" \
        | ddlcache run --catalog-store file --data-dir ~/.ddlcache

    # Run with full debug logging specified with LOG_FILTER
    LOG_FILTER=debug ddlcache run script.sql
"#
)]
struct Config {
    #[clap(flatten)]
    logging_config: LoggingConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
enum Command {
    /// Execute a file of `;` separated statements in one session
    Run(commands::run::Config),
}

fn init_logs(config: &LoggingConfig) -> Result<(), tracing_subscriber::filter::ParseError> {
    let filter: EnvFilter = config.env_filter()?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let config: Config = clap::Parser::parse();
    if let Err(e) = init_logs(&config.logging_config) {
        eprintln!("Initializing logs failed: {e}");
        std::process::exit(ReturnCode::Failure as _);
    }

    match config.command {
        None => println!("command required, -h/--help for help"),
        Some(Command::Run(config)) => {
            if let Err(e) = commands::run::command(config).await {
                eprintln!("Run command failed: {e:#}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
    }
}
