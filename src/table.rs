//! Typed access to a table of JSON documents.
//!
//! Every table has a single column, `data`, holding the document as JSONB.
//! Fields are reached in SQL with `data->>'Field'`, so fragments such as
//! `where data->>'Age' > ?` work against any table.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use rusqlite::{Connection, Row, Statement};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::id::new_id;
use crate::query::{arg_count, bind_fragments, push_fragments, Sql};
use crate::sqlite::{bind, Value};

/// A record stored in a [`DocumentTable`].
///
/// The accessors must read and write the field that serializes as `ID`
/// (for example `#[serde(rename = "ID")] id: String`). Inserts check the
/// serialized form for it and fail with [`Error::MissingIdField`] when it
/// is absent.
pub trait Document {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

/// Provides access to a named table holding documents of type `T`.
pub struct DocumentTable<T> {
    name: String,
    insert_query: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DocumentTable<T> {
    /// Create a table handle. No I/O happens here; the name is not
    /// validated and a bad one surfaces when a statement is prepared.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let insert_query = format!("insert into {name} (data) values (jsonb(?))");
        Self {
            name,
            insert_query,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for DocumentTable<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            insert_query: self.insert_query.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DocumentTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTable")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

impl<T> DocumentTable<T>
where
    T: Document + Serialize + DeserializeOwned + Clone,
{
    /// Run the standard migrations: create the table and a unique index on
    /// `ID`. Both are idempotent, so this belongs in application startup.
    ///
    /// If the index fails after the table was created, the table is left in
    /// place and a later call finishes the job.
    pub fn migrate(&self, conn: &Connection) -> Result<()> {
        let create = format!("create table if not exists {} (data blob)", self.name);
        self.execute_ddl(conn, "create table", &create)?;
        let index = format!(
            "create unique index if not exists {0}_ID on {0} (data->>'ID')",
            self.name
        );
        self.execute_ddl(conn, "create ID index", &index)?;
        info!(table = %self.name, "migrated document table");
        Ok(())
    }

    /// Create a non-unique index named `<table>_<field>` on a document
    /// field. `field` is spliced into the statement as is.
    pub fn create_index(&self, conn: &Connection, field: &str) -> Result<()> {
        let index = format!(
            "create index if not exists {0}_{1} on {0} (data->>'{1}')",
            self.name, field
        );
        self.execute_ddl(conn, "create index", &index)?;
        info!(table = %self.name, field, "created document index");
        Ok(())
    }

    /// Insert a new document.
    ///
    /// A document with an `ID` is stored and returned as is. Otherwise a
    /// clone with a generated ID is stored and returned, leaving `doc`
    /// untouched. Duplicate IDs fail on the unique index.
    pub fn insert<'d>(&self, conn: &Connection, doc: &'d T) -> Result<Cow<'d, T>> {
        let doc = if doc.id().is_empty() {
            let mut copy = doc.clone();
            copy.set_id(new_id());
            Cow::Owned(copy)
        } else {
            Cow::Borrowed(doc)
        };

        let json = self.encode(&doc)?;
        match json.get("ID") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => {}
            _ => {
                return Err(Error::MissingIdField {
                    type_name: type_name::<T>(),
                })
            }
        }

        let query = &self.insert_query;
        let mut stmt = conn
            .prepare_cached(query)
            .map_err(|e| self.statement_error("insert", query, e))?;
        bind(&mut stmt, 1, &Value::Text(json.to_string()))
            .map_err(|e| self.statement_error("insert", query, e))?;
        debug!(table = %self.name, id = doc.id(), "inserting document");
        stmt.raw_execute()
            .map_err(|e| self.statement_error("insert", query, e))?;
        Ok(doc)
    }

    /// Return the first document matching the fragments, or
    /// [`Error::NoDocument`] when nothing matches.
    pub fn one(&self, conn: &Connection, sqls: &[Sql]) -> Result<T> {
        let mut query = format!("select json(data) from {}", self.name);
        push_fragments(&mut query, sqls);
        query.push_str(" limit 1");

        let mut stmt = self.prepare(conn, "one", &query, None, sqls)?;
        let mut rows = stmt.raw_query();
        let row = rows
            .next()
            .map_err(|e| self.statement_error("one", &query, e))?;
        let doc = match row {
            Some(row) => self.decode(row, &query)?,
            None => return Err(Error::NoDocument),
        };
        Ok(doc)
    }

    /// Return every document matching the fragments. No match is an empty
    /// vector, not an error.
    pub fn all(&self, conn: &Connection, sqls: &[Sql]) -> Result<Vec<T>> {
        let mut query = format!("select json(data) from {}", self.name);
        push_fragments(&mut query, sqls);

        let mut stmt = self.prepare(conn, "all", &query, None, sqls)?;
        let mut rows = stmt.raw_query();
        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| self.statement_error("all", &query, e))?
        {
            docs.push(self.decode(row, &query)?);
        }
        Ok(docs)
    }

    /// Delete every document matching the fragments.
    pub fn delete(&self, conn: &Connection, sqls: &[Sql]) -> Result<()> {
        let mut query = format!("delete from {}", self.name);
        push_fragments(&mut query, sqls);

        let mut stmt = self.prepare(conn, "delete", &query, None, sqls)?;
        stmt.raw_execute()
            .map_err(|e| self.statement_error("delete", &query, e))?;
        Ok(())
    }

    /// Merge `partial` into every matching document with `jsonb_patch`.
    ///
    /// Only members present in the serialized `partial` are written, so a
    /// field skipped by serde (e.g. `skip_serializing_if` on a zero value)
    /// keeps its stored value. There is no way to reset a field to zero
    /// here; use [`replace`](Self::replace) for that. A member serialized as
    /// `null` removes the field from the stored document.
    pub fn patch(&self, conn: &Connection, partial: &T, sqls: &[Sql]) -> Result<()> {
        self.update(conn, "patch", "set data = jsonb_patch(data, ?)", partial, sqls)
    }

    /// Overwrite every matching document with `doc`.
    pub fn replace(&self, conn: &Connection, doc: &T, sqls: &[Sql]) -> Result<()> {
        self.update(conn, "replace", "set data = jsonb(?)", doc, sqls)
    }

    fn update(
        &self,
        conn: &Connection,
        op: &'static str,
        set_clause: &str,
        doc: &T,
        sqls: &[Sql],
    ) -> Result<()> {
        let json = Value::Text(self.encode(doc)?.to_string());
        let mut query = format!("update {} {}", self.name, set_clause);
        push_fragments(&mut query, sqls);

        let mut stmt = self.prepare(conn, op, &query, Some(json), sqls)?;
        stmt.raw_execute()
            .map_err(|e| self.statement_error(op, &query, e))?;
        Ok(())
    }

    /// Prepare `query` and bind `doc` (if any) followed by the fragment
    /// arguments. Fails when the argument count differs from the number of
    /// placeholders.
    fn prepare<'c>(
        &self,
        conn: &'c Connection,
        op: &'static str,
        query: &str,
        doc: Option<Value>,
        sqls: &[Sql],
    ) -> Result<Statement<'c>> {
        let mut stmt = conn
            .prepare(query)
            .map_err(|e| self.statement_error(op, query, e))?;

        let first = usize::from(doc.is_some()) + 1;
        let actual = first - 1 + arg_count(sqls);
        let expected = stmt.parameter_count();
        if expected != actual {
            return Err(Error::ParameterCount {
                query: query.to_string(),
                expected,
                actual,
            });
        }

        if let Some(doc) = &doc {
            bind(&mut stmt, 1, doc).map_err(|e| self.statement_error(op, query, e))?;
        }
        bind_fragments(&mut stmt, first, sqls).map_err(|e| self.statement_error(op, query, e))?;
        debug!(table = %self.name, op, query, args = actual, "executing statement");
        Ok(stmt)
    }

    fn execute_ddl(&self, conn: &Connection, op: &'static str, query: &str) -> Result<()> {
        debug!(table = %self.name, op, query, "executing migration");
        conn.execute(query, [])
            .map_err(|e| self.statement_error(op, query, e))?;
        Ok(())
    }

    fn decode(&self, row: &Row<'_>, query: &str) -> Result<T> {
        let raw: String = row
            .get(0)
            .map_err(|e| self.statement_error("decode", query, e))?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(source) => Err(Error::Deserialization {
                table: self.name.clone(),
                raw,
                source,
            }),
        }
    }

    /// Every write path serializes through a `serde_json::Value`, so stored
    /// documents get the same member order whichever operation wrote them.
    fn encode(&self, doc: &T) -> Result<serde_json::Value> {
        serde_json::to_value(doc).map_err(|source| self.serialization_error(source))
    }

    fn serialization_error(&self, source: serde_json::Error) -> Error {
        Error::Serialization {
            table: self.name.clone(),
            source,
        }
    }

    fn statement_error(&self, op: &'static str, query: &str, source: rusqlite::Error) -> Error {
        Error::Statement {
            op,
            table: self.name.clone(),
            query: query.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::SerializeStruct;
    use serde::{Deserialize, Serializer};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Droid {
        #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
        id: String,
        model: String,
    }

    impl Document for Droid {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    /// Implements `Document` but serializes its identifier under another name.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Unkeyed {
        key: String,
    }

    impl Document for Unkeyed {
        fn id(&self) -> &str {
            &self.key
        }
        fn set_id(&mut self, id: String) {
            self.key = id;
        }
    }

    /// Serializes only while `sealed` is false.
    #[derive(Debug, Clone, Deserialize)]
    struct Holocron {
        #[serde(rename = "ID", default)]
        id: String,
        #[serde(default)]
        sealed: bool,
    }

    impl Serialize for Holocron {
        fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            if self.sealed {
                return Err(serde::ser::Error::custom("holocron is sealed"));
            }
            let mut state = serializer.serialize_struct("Holocron", 1)?;
            state.serialize_field("ID", &self.id)?;
            state.end()
        }
    }

    impl Document for Holocron {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn assert_send_sync<S: Send + Sync>() {}

    #[test]
    fn table_is_shareable_for_any_record_type() {
        assert_send_sync::<DocumentTable<Droid>>();
        assert_send_sync::<DocumentTable<std::rc::Rc<Droid>>>();
    }

    #[test]
    fn new_precomputes_insert() {
        let droids = DocumentTable::<Droid>::new("droids");
        assert_eq!(droids.name(), "droids");
        assert_eq!(
            droids.insert_query,
            "insert into droids (data) values (jsonb(?))"
        );
    }

    #[test]
    fn insert_requires_serialized_id() {
        let conn = Connection::open_in_memory().unwrap();
        let table = DocumentTable::<Unkeyed>::new("unkeyed");
        table.migrate(&conn).unwrap();
        let err = table
            .insert(&conn, &Unkeyed { key: String::new() })
            .unwrap_err();
        match err {
            Error::MissingIdField { type_name } => assert!(type_name.ends_with("Unkeyed")),
            other => panic!("expected MissingIdField, got {other:?}"),
        }
    }

    #[test]
    fn serialization_failures_write_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let holocrons = DocumentTable::<Holocron>::new("holocrons");
        holocrons.migrate(&conn).unwrap();
        let count = |conn: &Connection| -> i64 {
            conn.query_row("select count(*) from holocrons", [], |row| row.get(0))
                .unwrap()
        };

        let sealed = Holocron {
            id: String::new(),
            sealed: true,
        };
        match holocrons.insert(&conn, &sealed).unwrap_err() {
            Error::Serialization { table, .. } => assert_eq!(table, "holocrons"),
            other => panic!("expected Serialization, got {other:?}"),
        }
        assert_eq!(count(&conn), 0);

        let open = Holocron {
            id: "sith".to_string(),
            sealed: false,
        };
        holocrons.insert(&conn, &open).unwrap();
        let by_sith = [crate::query::by_id("sith")];
        assert!(matches!(
            holocrons.patch(&conn, &sealed, &by_sith),
            Err(Error::Serialization { .. })
        ));
        assert!(matches!(
            holocrons.replace(&conn, &sealed, &by_sith),
            Err(Error::Serialization { .. })
        ));
        assert_eq!(count(&conn), 1);
        let stored = holocrons.one(&conn, &by_sith).unwrap();
        assert_eq!(stored.id, "sith");
        assert!(!stored.sealed);
    }

    #[test]
    fn writes_share_member_order() {
        let conn = Connection::open_in_memory().unwrap();
        let droids = DocumentTable::<Droid>::new("droids");
        droids.migrate(&conn).unwrap();
        let r2 = Droid {
            id: "r2".to_string(),
            model: "astromech".to_string(),
        };
        droids.insert(&conn, &r2).unwrap();
        let raw = |conn: &Connection| -> String {
            conn.query_row("select json(data) from droids", [], |row| row.get(0))
                .unwrap()
        };
        let inserted = raw(&conn);
        droids
            .replace(&conn, &r2, &[crate::query::by_id("r2")])
            .unwrap();
        assert_eq!(raw(&conn), inserted);
    }

    #[test]
    fn parameter_count_mismatch_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let droids = DocumentTable::<Droid>::new("droids");
        droids.migrate(&conn).unwrap();

        let err = droids
            .all(&conn, &[Sql::new("where data->>'model' = ?")])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ParameterCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));

        let err = droids
            .patch(
                &conn,
                &Droid {
                    id: String::new(),
                    model: "R2".to_string(),
                },
                &[Sql::new("where data->>'model' = 'R1'").arg("extra")],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ParameterCount {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn bad_table_name_surfaces_as_statement_error() {
        let conn = Connection::open_in_memory().unwrap();
        let bad = DocumentTable::<Droid>::new("not a table");
        match bad.migrate(&conn).unwrap_err() {
            Error::Statement { op, table, .. } => {
                assert_eq!(op, "create table");
                assert_eq!(table, "not a table");
            }
            other => panic!("expected Statement, got {other:?}"),
        }
    }
}
