use std::net::SocketAddr;

use pagedb::server::protocol::{Response, END_MARKER};
use pagedb::server::{Server, ServerConfig};
use pagedb::{Database, DatabaseConfig};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

async fn start_server(dir: &TempDir) -> SocketAddr {
    let database = Database::open(DatabaseConfig::new(dir.path())).unwrap();
    let server = Server::new(ServerConfig::new().port(0), database);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        assert_eq!(client.line().await.as_deref(), Some("PROTOCOL:1.0"));
        assert_eq!(client.line().await.as_deref(), Some("READY"));
        client
    }

    async fn line(&mut self) -> Option<String> {
        self.lines.next_line().await.unwrap()
    }

    async fn send(&mut self, request: &str) {
        self.writer.write_all(request.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn response(&mut self) -> Response {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await.expect("connection closed mid-response");
            if line == END_MARKER {
                break;
            }
            lines.push(line);
        }
        Response::parse(&lines).unwrap()
    }

    async fn query(&mut self, sql: &str) -> Response {
        self.send(sql).await;
        self.response().await
    }
}

#[tokio::test]
async fn test_statements_over_the_wire() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut client = Client::connect(addr).await;

    let response = client.query("CREATE TABLE t (id INTEGER, name VARCHAR)").await;
    assert!(response.success);
    assert_eq!(response.message, "Table created: t");

    let response = client.query("INSERT INTO t VALUES (1, 'Alice')").await;
    assert_eq!(response.message, "1 row inserted");

    let response = client.query("SELECT * FROM t WHERE id = 1").await;
    assert_eq!(response.message, "1 row(s) returned");
    assert_eq!(response.columns, vec!["id", "name"]);
    assert_eq!(response.rows, vec![vec!["1".to_string(), "Alice".to_string()]]);
}

#[tokio::test]
async fn test_errors_keep_the_session_open() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut client = Client::connect(addr).await;

    let response = client.query("SELECT * FROM missing").await;
    assert!(!response.success);
    assert!(response.message.contains("missing"));

    let response = client.query("CREATE TABLE t (id INTEGER)").await;
    assert!(response.success);
}

#[tokio::test]
async fn test_several_statements_on_one_line() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut client = Client::connect(addr).await;

    client
        .send("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (7); SELECT id FROM t;")
        .await;
    assert_eq!(client.response().await.message, "Table created: t");
    assert_eq!(client.response().await.message, "1 row inserted");
    let response = client.response().await;
    assert_eq!(response.rows, vec![vec!["7".to_string()]]);
}

#[tokio::test]
async fn test_exit_closes_connection() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut client = Client::connect(addr).await;

    client.send("EXIT").await;
    assert_eq!(client.line().await, None);
}

#[tokio::test]
async fn test_clients_share_one_database() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;

    let mut first = Client::connect(addr).await;
    first.query("CREATE TABLE t (id INTEGER)").await;
    first.query("INSERT INTO t VALUES (42)").await;

    let mut second = Client::connect(addr).await;
    let response = second.query("SELECT id FROM t").await;
    assert_eq!(response.rows, vec![vec!["42".to_string()]]);
}

#[tokio::test]
async fn test_value_equal_to_end_marker_keeps_framing() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut client = Client::connect(addr).await;

    client.query("CREATE TABLE t (id INTEGER, name VARCHAR)").await;
    client.query("INSERT INTO t VALUES (1, '---END---')").await;

    let response = client.query("SELECT name FROM t").await;
    assert_eq!(response.rows, vec![vec![END_MARKER.to_string()]]);

    let response = client.query("SELECT id FROM t").await;
    assert_eq!(response.rows, vec![vec!["1".to_string()]]);
}
