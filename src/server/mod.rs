//! TCP Server for PageDB
//!
//! This module implements a line-oriented TCP server that allows remote clients
//! to connect and execute SQL queries against one shared `Database`.

pub mod protocol;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::database::{split_statements, Database};
use crate::error::{Error, Result};
use crate::executor::QueryResult;

/// Default server port
pub const DEFAULT_PORT: u16 = 5433;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_connections: 100,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host address
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connection limit
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Get the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database shared by every connection; one statement runs at a time
pub type SharedDatabase = Arc<Mutex<Database>>;

/// PageDB TCP Server
pub struct Server {
    config: ServerConfig,
    database: SharedDatabase,
}

impl Server {
    /// Create a new server
    pub fn new(config: ServerConfig, database: Database) -> Self {
        Self {
            config,
            database: Arc::new(Mutex::new(database)),
        }
    }

    /// Handle to the served database
    pub fn database(&self) -> SharedDatabase {
        self.database.clone()
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        info!(address = %listener.local_addr()?, "PageDB server listening");
        Ok(listener)
    }

    /// Bind and serve until the task is cancelled
    pub async fn start(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.config.max_connections.max(1)));

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let permit = match permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(%peer, "connection limit reached, refusing client");
                    continue;
                }
            };

            let database = self.database.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, database).await {
                    warn!(%peer, error = %e, "connection error");
                }
                drop(permit);
            });
        }
    }
}

/// Handle a client connection
async fn handle_connection(stream: TcpStream, peer: SocketAddr, database: SharedDatabase) -> Result<()> {
    info!(%peer, "client connected");

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(protocol::greeting().as_bytes()).await?;
    writer.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if protocol::is_close_command(request) {
            break;
        }

        for statement in split_statements(request) {
            debug!(%peer, sql = %statement, "request");
            let result = execute(&database, statement).await;
            writer
                .write_all(protocol::format_result(&result).as_bytes())
                .await?;
        }
        writer.flush().await?;
    }

    info!(%peer, "client disconnected");
    Ok(())
}

/// Run a statement off the async workers; the database does blocking file I/O
async fn execute(database: &SharedDatabase, statement: String) -> QueryResult {
    let database = database.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<QueryResult> {
        let mut db = database
            .lock()
            .map_err(|_| Error::ExecutionError("database lock poisoned".to_string()))?;
        Ok(db.execute_query(&statement))
    })
    .await;

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => QueryResult::failure(e.to_string()),
        Err(e) => QueryResult::failure(format!("Execution error: statement task failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new().host("0.0.0.0").port(5500).max_connections(4);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5500);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.bind_address(), "0.0.0.0:5500");
    }

    #[test]
    fn test_default_port() {
        assert_eq!(ServerConfig::default().bind_address(), "127.0.0.1:5433");
    }
}
