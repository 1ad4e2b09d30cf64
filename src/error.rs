//! Error types for document table operations.

/// Result type for document table operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned by `one` when the query matched nothing.
    #[error("sqlite_docstore: no document")]
    NoDocument,

    #[error("sqlite_docstore: expected type {type_name} to serialize with an ID field of type string")]
    MissingIdField { type_name: &'static str },

    #[error("sqlite_docstore: failed to serialize document for {table:?}: {source}")]
    Serialization {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("sqlite_docstore: failed to serialize fragment argument: {0}")]
    Argument(#[source] serde_json::Error),

    /// The stored document could not be decoded; `raw` is the text read back.
    #[error("sqlite_docstore: invalid json from {table:?}: {source}\n{raw}")]
    Deserialization {
        table: String,
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("sqlite_docstore: {op} on {table:?} failed for {query:?}: {source}")]
    Statement {
        op: &'static str,
        table: String,
        query: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite_docstore: unexpected value {value} of kind {kind}")]
    UnsupportedBindType { value: String, kind: &'static str },

    #[error("sqlite_docstore: {query:?} expects {expected} arguments but {actual} were given")]
    ParameterCount {
        query: String,
        expected: usize,
        actual: usize,
    },

    #[error("sqlite_docstore: opening {path:?}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    pub fn is_no_document(&self) -> bool {
        matches!(self, Error::NoDocument)
    }
}

/// Turns the [`Error::NoDocument`] sentinel into `Ok(None)`, the way
/// `rusqlite::OptionalExtension` does for `QueryReturnedNoRows`.
pub trait OptionalExtension<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExtension<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(Error::NoDocument) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
