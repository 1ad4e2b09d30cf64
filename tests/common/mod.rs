#![allow(dead_code)]

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sqlite_docstore::{Document, DocumentTable, Result};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jedi {
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "Age", default, skip_serializing_if = "is_zero")]
    pub age: u32,
}

fn is_zero(age: &u32) -> bool {
    *age == 0
}

impl Document for Jedi {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

pub fn jedi(id: &str, name: &str, age: u32) -> Jedi {
    Jedi {
        id: id.to_string(),
        name: name.to_string(),
        age,
    }
}

pub fn jedis() -> DocumentTable<Jedi> {
    DocumentTable::new("jedis")
}

pub const YODA: &str = "01HQ0000000000000000000YDA";
pub const LUKE: &str = "01HQ0000000000000000000LKE";
pub const LEIA: &str = "01HQ0000000000000000000LEA";

pub fn seed(conn: &Connection) -> Result<()> {
    let jedis = jedis();
    jedis.migrate(conn)?;
    jedis.insert(conn, &jedi(YODA, "yoda", 980))?;
    jedis.insert(conn, &jedi(LUKE, "luke", 42))?;
    jedis.insert(conn, &jedi(LEIA, "leia", 42))?;
    Ok(())
}

// Helper function to create a seeded in-memory database for testing
pub fn create_test_db() -> Result<Connection> {
    let conn = Connection::open_in_memory().expect("open in-memory database");
    seed(&conn)?;
    Ok(conn)
}

// Helper function to create a seeded temporary file-based database
pub fn create_temp_db() -> Result<(Connection, NamedTempFile)> {
    let temp_file = NamedTempFile::new().expect("create temp file");
    let conn = sqlite_docstore::SqliteConfig::new(temp_file.path().to_string_lossy()).open()?;
    seed(&conn)?;
    Ok((conn, temp_file))
}
