//! PageDB - CLI Client
//!
//! Talks the line protocol to a running server, or opens a database in-process with
//! `--data-dir`.

use std::env;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use anyhow::{bail, Context, Result};
use pagedb::database::split_statements;
use pagedb::server::protocol::{self, Response};
use pagedb::server::DEFAULT_PORT;
use pagedb::{Database, DatabaseConfig, QueryResult};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

/// Print welcome banner
fn print_banner(target: &str) {
    println!(
        r#"
 PageDB - a minimal relational database in Rust
 Connected to {}
 Type '.help' for help, 'exit' to quit
"#,
        target
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help              Show this help message
  .tables            List all tables (embedded mode)
  .schema <table>    Show table schema (embedded mode)
  .explain <select>  Show the physical plan of a query (embedded mode)
  .mode json|table   Choose how results are printed (embedded mode)
  exit, quit         Leave

SQL Commands:
  CREATE TABLE ...   Create a new table
  CREATE INDEX ...   Create a B+ tree index on one column
  DROP TABLE ...     Drop a table and its indexes
  INSERT INTO ...    Insert a row
  SELECT ...         Query data

Examples:
  CREATE TABLE users (id INTEGER, name VARCHAR);
  CREATE INDEX users_id_idx ON users (id);
  INSERT INTO users VALUES (1, 'Alice');
  SELECT name FROM users WHERE id = 1;
"#
    );
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Table,
    Json,
}

/// Where statements are sent
enum Session {
    Remote {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
    },
    Embedded {
        database: Database,
        format: OutputFormat,
    },
}

impl Session {
    fn connect(address: &str) -> Result<Self> {
        let writer =
            TcpStream::connect(address).with_context(|| format!("failed to connect to {}", address))?;
        let mut reader = BufReader::new(writer.try_clone()?);

        // PROTOCOL:<version> then READY
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if !line.starts_with("PROTOCOL:") {
            bail!("unexpected greeting from server: {}", line.trim());
        }
        line.clear();
        reader.read_line(&mut line)?;
        if line.trim() != "READY" {
            bail!("server is not ready: {}", line.trim());
        }

        Ok(Session::Remote { reader, writer })
    }

    fn open(data_dir: &str) -> Result<Self> {
        let database = Database::open(DatabaseConfig::new(data_dir))
            .with_context(|| format!("failed to open database at {}", data_dir))?;
        Ok(Session::Embedded {
            database,
            format: OutputFormat::Table,
        })
    }

    fn run_sql(&mut self, sql: &str) -> Result<()> {
        match self {
            Session::Remote { reader, writer } => {
                // Comments are gone after splitting, so joining onto one line is safe
                let statements = split_statements(sql);
                if statements.is_empty() {
                    return Ok(());
                }
                let count = statements.len();
                let request = statements.join("; ").replace(['\r', '\n'], " ");
                writer.write_all(request.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()?;

                for _ in 0..count {
                    let response = read_response(reader)?;
                    print_response(&response);
                }
            }
            Session::Embedded { database, format } => {
                for result in database.execute_script(sql) {
                    print_result(&result, *format)?;
                }
            }
        }
        Ok(())
    }

    fn run_command(&mut self, command: &str) -> Result<()> {
        let (name, argument) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));

        if name == ".help" {
            print_help();
            return Ok(());
        }

        let Session::Embedded { database, format } = self else {
            eprintln!("{} is only available with --data-dir", name);
            return Ok(());
        };

        match name {
            ".tables" => {
                let tables = database.list_tables();
                if tables.is_empty() {
                    println!("No tables found.");
                } else {
                    println!("Tables:");
                    for table in tables {
                        println!("  {}", table);
                    }
                }
            }
            ".schema" => {
                let tables = if argument.is_empty() {
                    database.list_tables()
                } else {
                    vec![argument.to_string()]
                };
                for table in tables {
                    match database.table_info(&table) {
                        Ok(info) => println!("{}", info),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
            }
            ".explain" => match database.explain(argument) {
                Ok(plan) => print!("{}", plan),
                Err(e) => eprintln!("Error: {}", e),
            },
            ".mode" => match argument {
                "json" => *format = OutputFormat::Json,
                "table" => *format = OutputFormat::Table,
                other => eprintln!("Unknown mode: {}", other),
            },
            other => {
                eprintln!("Unknown command: {}", other);
                eprintln!("Type '.help' for available commands.");
            }
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        match self {
            Session::Remote { mut writer, .. } => {
                writer.write_all(b"EXIT\n")?;
                writer.flush()?;
            }
            Session::Embedded { database, .. } => database.close()?,
        }
        Ok(())
    }
}

/// Read lines up to the end marker
fn read_response(reader: &mut BufReader<TcpStream>) -> Result<Response> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            bail!("server closed the connection");
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        if line == protocol::END_MARKER {
            break;
        }
        lines.push(line);
    }
    Response::parse(&lines).context("malformed response from server")
}

/// Format query results as a table
fn format_table(columns: &[String], rows: &[Vec<String>]) -> String {
    // Calculate column widths
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.len());
            }
        }
    }

    let mut output = String::new();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    for row in rows {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v, width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    if !rows.is_empty() {
        output.push_str(&separator);
    }
    output
}

fn print_response(response: &Response) {
    if !response.success {
        eprintln!("{}", response.message);
        return;
    }
    if !response.columns.is_empty() {
        print!("{}", format_table(&response.columns, &response.rows));
    }
    println!("{}", response.message);
}

fn print_result(result: &QueryResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(result)?);
        return Ok(());
    }
    if !result.success {
        eprintln!("{}", result.message);
        return Ok(());
    }
    if !result.columns.is_empty() {
        let rows: Vec<Vec<String>> = result
            .rows
            .iter()
            .map(|row| row.values().iter().map(|v| v.to_string()).collect())
            .collect();
        print!("{}", format_table(&result.columns, &rows));
    }
    println!("{}", result.message);
    Ok(())
}

fn is_exit(line: &str) -> bool {
    let line = line.trim().trim_end_matches(';');
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Main REPL loop
fn run_repl(mut session: Session, target: &str) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    print_banner(target);

    let mut input_buffer = String::new();

    loop {
        let prompt = if input_buffer.is_empty() { "pagedb> " } else { "   ...> " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                input_buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();

        if input_buffer.is_empty() {
            if trimmed.is_empty() {
                continue;
            }
            if is_exit(trimmed) {
                break;
            }
            if trimmed.starts_with('.') {
                editor.add_history_entry(trimmed)?;
                session.run_command(trimmed)?;
                continue;
            }
        }

        input_buffer.push_str(&line);
        input_buffer.push('\n');

        // Statements end with a semicolon
        if trimmed.ends_with(';') {
            let sql = std::mem::take(&mut input_buffer);
            editor.add_history_entry(sql.trim())?;
            session.run_sql(&sql)?;
        }
    }

    session.close()?;
    println!("Goodbye!");
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let mut host = "127.0.0.1".to_string();
    let mut port = DEFAULT_PORT;
    let mut data_dir: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args
            .get(i + 1)
            .with_context(|| format!("missing value for {}", args[i]));
        match args[i].as_str() {
            "-H" | "--host" => host = value?.clone(),
            "-p" | "--port" => port = value?.parse().context("invalid port")?,
            "-d" | "--data-dir" => data_dir = Some(value?.clone()),
            "-h" | "--help" => {
                println!("Usage: pagedb-cli [--host HOST] [--port PORT] | [--data-dir DIR]");
                return Ok(());
            }
            other => bail!("unknown argument: {}", other),
        }
        i += 2;
    }

    match data_dir {
        Some(dir) => {
            let session = Session::open(&dir)?;
            run_repl(session, &dir)
        }
        None => {
            let address = format!("{}:{}", host, port);
            let session = Session::connect(&address)?;
            run_repl(session, &address)
        }
    }
}
