//! Human-readable dumps of query results for test logs.
//!
//! ```text
//! Query: SELECT id, name FROM host
//!
//! [0]   id: 1
//! [0] name: "web-1"
//! ```

use std::fmt::{self, Write};

use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, MySqlPool, PgPool, Row, TypeInfo, ValueRef};

use crate::error::Result;

/// One decoded result cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// SQL `NULL`.
    Null,
    /// Character data.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Anything else, already formatted.
    Other(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("NULL"),
            CellValue::Text(s) => write!(f, "{s:?}"),
            CellValue::Bytes(b) => {
                let hex: String = b.iter().fold(String::from("0x"), |mut acc, byte| {
                    let _ = write!(acc, "{byte:02x}");
                    acc
                });
                let quoted = format!("\"{}\"", b.escape_ascii());
                if hex.len() < quoted.len() {
                    f.write_str(&hex)
                } else {
                    f.write_str(&quoted)
                }
            }
            CellValue::Other(s) => f.write_str(s),
        }
    }
}

/// Formats a result set: the query, then one block per row with column
/// labels right-aligned to the widest one.
pub fn render(query: &str, columns: &[String], rows: &[Vec<CellValue>]) -> String {
    let width = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut out = format!("Query: {query}\n");
    for (row_id, row) in rows.iter().enumerate() {
        out.push('\n');
        for (column, value) in columns.iter().zip(row) {
            let _ = writeln!(out, "[{row_id}] {column:>width$}: {value}");
        }
    }
    out
}

macro_rules! decode_cell {
    ($row:expr, $i:expr, $($ty:ty => $wrap:expr),+ $(,)?) => {{
        let raw = $row.try_get_raw($i)?;
        if raw.is_null() {
            CellValue::Null
        }
        $(else if let Ok(v) = $row.try_get::<$ty, _>($i) {
            ($wrap)(v)
        })+
        else {
            CellValue::Other(format!("<{}>", raw.type_info().name()))
        }
    }};
}

fn column_names<R: Row>(rows: &[R]) -> Vec<String> {
    rows.first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default()
}

fn mysql_cells(row: &MySqlRow) -> Result<Vec<CellValue>> {
    (0..row.len())
        .map(|i| -> Result<CellValue> {
            Ok(decode_cell!(row, i,
                String => CellValue::Text,
                i64 => |v: i64| CellValue::Other(v.to_string()),
                u64 => |v: u64| CellValue::Other(v.to_string()),
                f64 => |v: f64| CellValue::Other(v.to_string()),
                f32 => |v: f32| CellValue::Other(v.to_string()),
                Vec<u8> => CellValue::Bytes,
            ))
        })
        .collect()
}

fn postgres_cells(row: &PgRow) -> Result<Vec<CellValue>> {
    (0..row.len())
        .map(|i| -> Result<CellValue> {
            Ok(decode_cell!(row, i,
                String => CellValue::Text,
                i64 => |v: i64| CellValue::Other(v.to_string()),
                i32 => |v: i32| CellValue::Other(v.to_string()),
                i16 => |v: i16| CellValue::Other(v.to_string()),
                f64 => |v: f64| CellValue::Other(v.to_string()),
                f32 => |v: f32| CellValue::Other(v.to_string()),
                bool => |v: bool| CellValue::Other(v.to_string()),
                Vec<u8> => CellValue::Bytes,
            ))
        })
        .collect()
}

/// Runs `query` on MySQL and formats the result for a log.
pub async fn pretty_select_mysql(pool: &MySqlPool, query: &str) -> Result<String> {
    let rows = sqlx::query(query).fetch_all(pool).await?;
    let cells = rows.iter().map(mysql_cells).collect::<Result<Vec<_>>>()?;
    Ok(render(query, &column_names(&rows), &cells))
}

/// Runs `query` on PostgreSQL and formats the result for a log.
pub async fn pretty_select_postgres(pool: &PgPool, query: &str) -> Result<String> {
    let rows = sqlx::query(query).fetch_all(pool).await?;
    let cells = rows.iter().map(postgres_cells).collect::<Result<Vec<_>>>()?;
    Ok(render(query, &column_names(&rows), &cells))
}
