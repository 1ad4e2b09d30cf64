//! JSON document tables on top of SQLite for the Runar ecosystem.
//!
//! # Intention
//!
//! - Store typed records as JSON documents, one `data` column per table.
//! - Give every document a sortable `ID`, generated on insert when missing.
//! - Keep SQL only lightly hidden: callers compose `where`/`order by` clauses
//!   as [`Sql`] fragments with positional arguments.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/document code belongs here.
//! - No connection pooling, retries or transaction management: every
//!   operation takes a `&rusqlite::Connection` and runs a single statement.
//!
//! # Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use sqlite_docstore::{by_id, Document, DocumentTable, SqliteConfig};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Jedi {
//!     #[serde(rename = "ID")]
//!     id: String,
//!     name: String,
//! }
//!
//! impl Document for Jedi {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!     fn set_id(&mut self, id: String) {
//!         self.id = id;
//!     }
//! }
//!
//! let conn = SqliteConfig::new("jedis.db").open().unwrap();
//! let jedis = DocumentTable::<Jedi>::new("jedis");
//! jedis.migrate(&conn).unwrap();
//! let yoda = Jedi { id: String::new(), name: "yoda".into() };
//! // `yoda` has no ID, so the returned copy carries a generated one.
//! let yoda = jedis.insert(&conn, &yoda).unwrap().into_owned();
//! let fetched = jedis.one(&conn, &[by_id(yoda.id())]).unwrap();
//! assert_eq!(fetched.name, "yoda");
//! ```

pub mod error;
pub mod id;
pub mod query;
pub mod sqlite;
pub mod table;

pub use error::{Error, OptionalExtension, Result};
pub use id::new_id;
pub use query::{by_id, Sql};
pub use sqlite::{bind, JournalMode, SqliteConfig, Value};
pub use table::{Document, DocumentTable};
