use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Statement};
use tracing::info;

use crate::error::{Error, Result};

/// Core value types bound to statement placeholders.
///
/// This is the closed set of kinds a [`Sql`](crate::Sql) fragment can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Convert a JSON scalar. Arrays, objects and unsigned integers beyond
    /// `i64::MAX` have no binding rule and fail with
    /// [`Error::UnsupportedBindType`].
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        let unsupported = |json: &Json, kind| Error::UnsupportedBindType {
            value: json.to_string(),
            kind,
        };
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Boolean(b)),
            Json::String(s) => Ok(Value::Text(s)),
            Json::Number(ref n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if n.is_f64() {
                    Ok(Value::Real(n.as_f64().unwrap_or_default()))
                } else {
                    // Only u64 values above i64::MAX land here.
                    Err(unsupported(&json, "unsigned integer"))
                }
            }
            Json::Array(_) => Err(unsupported(&json, "array")),
            Json::Object(_) => Err(unsupported(&json, "object")),
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        Value::from_json(json)
    }
}

macro_rules! integer_values {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

integer_values!(i8, i16, i32, i64, u8, u16, u32);

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

/// Bind `value` to the 1-based placeholder `index`. Used internally for
/// fragment arguments, and available for callers querying the connection
/// directly.
pub fn bind(stmt: &mut Statement<'_>, index: usize, value: &Value) -> rusqlite::Result<()> {
    stmt.raw_bind_parameter(index, value)
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead logging, readers do not block the writer.
    Wal,
    /// Rollback journal.
    Delete,
    Memory,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// Connection settings for a document database
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    pub journal_mode: JournalMode,
    /// How long a statement waits on a locked database before failing with
    /// `SQLITE_BUSY`.
    pub busy_timeout_ms: u32,
    pub foreign_keys: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            journal_mode: JournalMode::Wal,
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    /// Create a config for the database file at `db_path`
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = journal_mode;
        self
    }

    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u32) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    /// Open a connection and apply the configured pragmas.
    ///
    /// Each concurrent caller should open its own connection; a
    /// `rusqlite::Connection` is not `Sync`.
    pub fn open(&self) -> Result<Connection> {
        let open_err = |source| Error::Open {
            path: self.db_path.clone(),
            source,
        };
        let conn = Connection::open(&self.db_path).map_err(open_err)?;
        conn.busy_timeout(Duration::from_millis(u64::from(self.busy_timeout_ms)))
            .map_err(open_err)?;
        // journal_mode reports the mode actually in effect; in-memory
        // databases stay on "memory" whatever is asked for.
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", self.journal_mode.as_str(), |row| {
                row.get(0)
            })
            .map_err(open_err)?;
        conn.pragma_update(None, "foreign_keys", self.foreign_keys)
            .map_err(open_err)?;
        info!(
            path = %self.db_path,
            journal_mode = %journal_mode,
            busy_timeout_ms = self.busy_timeout_ms,
            "opened sqlite connection"
        );
        Ok(conn)
    }
}
