//! SQL fragments.
//!
//! A [`Sql`] is a piece of a larger query: clause text with `?` placeholders
//! and the values to bind to them. Tables append fragments to their own
//! statement text in order, separated by a space, and bind every fragment's
//! arguments in that same order starting at position 1.

use rusqlite::Statement;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::sqlite::{bind, Value};

/// Part of a larger SQL query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    pub query: String,
    pub args: Vec<Value>,
}

impl Sql {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(query: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            args,
        }
    }

    /// Append an argument for the next placeholder.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Append any serializable scalar. Composite values fail with
    /// [`Error::UnsupportedBindType`].
    pub fn try_arg<S: Serialize + ?Sized>(mut self, value: &S) -> Result<Self> {
        let json = serde_json::to_value(value).map_err(Error::Argument)?;
        self.args.push(Value::from_json(json)?);
        Ok(self)
    }
}

/// Select a document by its `ID` field.
pub fn by_id(id: impl Into<String>) -> Sql {
    Sql::new("where data->>'ID' = ?").arg(id.into())
}

pub(crate) fn push_fragments(query: &mut String, sqls: &[Sql]) {
    for part in sqls {
        query.push(' ');
        query.push_str(&part.query);
    }
}

pub(crate) fn arg_count(sqls: &[Sql]) -> usize {
    sqls.iter().map(|part| part.args.len()).sum()
}

/// Bind all fragment arguments in order, the first one at placeholder
/// `first`. The caller checks the count against the statement beforehand.
pub(crate) fn bind_fragments(
    stmt: &mut Statement<'_>,
    first: usize,
    sqls: &[Sql],
) -> rusqlite::Result<()> {
    let args = sqls.iter().flat_map(|part| part.args.iter());
    for (i, arg) in args.enumerate() {
        bind(stmt, first + i, arg)?;
    }
    Ok(())
}
