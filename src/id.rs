//! Sortable document identifiers.
//!
//! Identifiers are ULIDs: a 48-bit millisecond timestamp followed by 80
//! random bits, rendered as 26 characters of Crockford base32. Later
//! timestamps always sort after earlier ones.

use ulid::Ulid;

/// Generate a fresh identifier for the current time.
pub fn new_id() -> String {
    Ulid::new().to_string()
}
