//! Line protocol
//!
//! One request per line, possibly holding several `;`-separated statements. Every
//! statement is answered with either `OK: <message>` (followed by a header, a `---` rule
//! and the rows for a SELECT) or `ERROR: <message>`, and then `END_MARKER` on its own line.
//! A row line equal to `END_MARKER`, or starting with `ROW_ESCAPE`, is sent with one extra
//! leading `ROW_ESCAPE` that `Response::parse` strips again.

use crate::executor::QueryResult;

/// Protocol version announced on connect
pub const PROTOCOL_VERSION: &str = "1.0";

/// Terminates every response
pub const END_MARKER: &str = "---END---";

/// Separates the header from the rows
pub const HEADER_RULE: &str = "---";

/// Column and value separator
pub const FIELD_SEPARATOR: &str = " | ";

/// Prefixed to a row line that would otherwise read as `END_MARKER`
pub const ROW_ESCAPE: char = '\\';

/// Sent once when a client connects
pub fn greeting() -> String {
    format!("PROTOCOL:{}\nREADY\n", PROTOCOL_VERSION)
}

/// Does this request line end the session?
pub fn is_close_command(line: &str) -> bool {
    let line = line.trim().trim_end_matches(';').trim();
    line.eq_ignore_ascii_case("END") || line.eq_ignore_ascii_case("EXIT")
}

/// Render a result, end marker included
pub fn format_result(result: &QueryResult) -> String {
    let mut output = String::new();

    if !result.success {
        output.push_str(&format!("ERROR: {}\n", single_line(&result.message)));
        output.push_str(END_MARKER);
        output.push('\n');
        return output;
    }

    output.push_str(&format!("OK: {}\n", single_line(&result.message)));
    if !result.columns.is_empty() {
        output.push_str(&result.columns.join(FIELD_SEPARATOR));
        output.push('\n');
        output.push_str(HEADER_RULE);
        output.push('\n');

        for row in &result.rows {
            let line = row
                .values()
                .iter()
                .map(|v| single_line(&v.to_string()))
                .collect::<Vec<_>>()
                .join(FIELD_SEPARATOR);
            if line == END_MARKER || line.starts_with(ROW_ESCAPE) {
                output.push(ROW_ESCAPE);
            }
            output.push_str(&line);
            output.push('\n');
        }
    }

    output.push_str(END_MARKER);
    output.push('\n');
    output
}

/// Line breaks inside a field would be read as protocol framing
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// A response as read back by a client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub success: bool,
    pub message: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Response {
    /// Parse the lines of one response, end marker excluded
    pub fn parse(lines: &[String]) -> Option<Self> {
        let (first, rest) = lines.split_first()?;

        if let Some(message) = first.strip_prefix("ERROR: ") {
            return Some(Self {
                success: false,
                message: message.to_string(),
                columns: Vec::new(),
                rows: Vec::new(),
            });
        }

        let message = first.strip_prefix("OK: ")?.to_string();
        let (columns, rows) = match rest {
            [header, rule, rows @ ..] if rule == HEADER_RULE => (
                split_fields(header),
                rows.iter()
                    .map(|r| split_fields(r.strip_prefix(ROW_ESCAPE).unwrap_or(r)))
                    .collect(),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        Some(Self {
            success: true,
            message,
            columns,
            rows,
        })
    }
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(FIELD_SEPARATOR).map(str::to_string).collect()
}
