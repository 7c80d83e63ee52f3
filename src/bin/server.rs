//! PageDB - TCP server

use std::env;

use anyhow::{bail, Context, Result};
use pagedb::server::{Server, ServerConfig};
use pagedb::{Database, DatabaseConfig, PredicateMode};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        r#"Usage: pagedb-server [OPTIONS]

Options:
  -H, --host <HOST>          Address to bind (default 127.0.0.1)
  -p, --port <PORT>          Port to listen on (default 5433)
  -d, --data-dir <DIR>       Data directory (default ./data)
      --pool-size <PAGES>    Buffer pool capacity in pages (default 100)
      --full-predicates      Evaluate whole AND/OR trees in WHERE
  -h, --help                 Show this help"#
    );
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}

fn parse_args(args: &[String]) -> Result<Option<(ServerConfig, DatabaseConfig)>> {
    let mut server = ServerConfig::new();
    let mut database = DatabaseConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .with_context(|| format!("missing value for {}", args[i]))
        };
        match args[i].as_str() {
            "-H" | "--host" => {
                server = server.host(value()?.clone());
                i += 1;
            }
            "-p" | "--port" => {
                let port = value()?.parse().context("invalid port")?;
                server = server.port(port);
                i += 1;
            }
            "-d" | "--data-dir" => {
                database.data_dir = value()?.into();
                i += 1;
            }
            "--pool-size" => {
                let pages = value()?.parse().context("invalid pool size")?;
                database = database.buffer_pool_size(pages);
                i += 1;
            }
            "--full-predicates" => database = database.predicate_mode(PredicateMode::Full),
            "-h" | "--help" => return Ok(None),
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    Ok(Some((server, database)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some((server_config, db_config)) = parse_args(&args)? else {
        print_usage();
        return Ok(());
    };

    init_logging();

    let database = Database::open(db_config.clone())
        .with_context(|| format!("failed to open database at {}", db_config.data_dir.display()))?;
    let server = Server::new(server_config, database);
    let shared = server.database();

    tokio::select! {
        result = server.start() => {
            if let Err(e) = &result {
                error!(error = %e, "server stopped");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    let mut db = shared
        .lock()
        .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
    db.flush().context("failed to flush buffer pool")?;
    info!("buffer pool flushed, bye");
    Ok(())
}
