//! Row representation and on-page encoding
//!
//! A row is encoded at the fixed stride of its table: INTEGER columns take four
//! big-endian bytes, VARCHAR columns a four-byte length followed by a payload padded
//! to `VARCHAR_MAX_LEN` bytes.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

use super::value::Value;
use crate::catalog::types::VARCHAR_MAX_LEN;
use crate::catalog::{DataType, TableMetadata};
use crate::error::{Error, Result};

/// A row of values in table column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Encode a row at the table's stride.
///
/// Every VARCHAR is length-checked before anything is written, so an oversized value
/// never reaches a page.
pub fn encode_row(table: &TableMetadata, row: &Row) -> Result<Vec<u8>> {
    if row.len() != table.columns().len() {
        return Err(Error::ColumnCountMismatch {
            expected: table.columns().len(),
            found: row.len(),
        });
    }

    let mut buf = Vec::with_capacity(table.row_size());
    for (column, value) in table.columns().iter().zip(row.values()) {
        match (column.data_type, value) {
            (DataType::Integer, Value::Integer(i)) => {
                buf.write_i32::<BigEndian>(*i)?;
            }
            (DataType::Varchar, Value::String(s)) => {
                let bytes = s.as_bytes();
                if bytes.len() > VARCHAR_MAX_LEN {
                    return Err(Error::ValueTooLong {
                        column: column.name.clone(),
                        len: bytes.len(),
                        max: VARCHAR_MAX_LEN,
                    });
                }
                buf.write_u32::<BigEndian>(bytes.len() as u32)?;
                buf.extend_from_slice(bytes);
                buf.resize(buf.len() + VARCHAR_MAX_LEN - bytes.len(), 0);
            }
            (expected, value) => {
                return Err(Error::TypeMismatch {
                    column: column.name.clone(),
                    expected: expected.to_string(),
                    found: value.to_string(),
                });
            }
        }
    }
    Ok(buf)
}

/// Decode a row previously written by `encode_row`
pub fn decode_row(table: &TableMetadata, bytes: &[u8]) -> Result<Row> {
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        match column.data_type {
            DataType::Integer => values.push(Value::Integer(cursor.read_i32::<BigEndian>()?)),
            DataType::Varchar => {
                let len = cursor.read_u32::<BigEndian>()? as usize;
                if len > VARCHAR_MAX_LEN {
                    return Err(Error::StorageError(format!(
                        "stored length {} of column '{}' exceeds {}",
                        len, column.name, VARCHAR_MAX_LEN
                    )));
                }
                let mut payload = [0u8; VARCHAR_MAX_LEN];
                cursor.read_exact(&mut payload)?;
                let s = String::from_utf8(payload[..len].to_vec()).map_err(|_| {
                    Error::StorageError(format!("column '{}' holds invalid UTF-8", column.name))
                })?;
                values.push(Value::String(s));
            }
        }
    }
    Ok(Row::new(values))
}
