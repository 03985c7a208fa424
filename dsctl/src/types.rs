//! Common type definitions.
//!
//! Users are keyed by a database-assigned `BIGSERIAL`; metadata rows are keyed by their natural
//! keys (lock name, config key, schema/table/engine triple).

use std::fmt;

pub type UserId = i64;
pub type LockName = String;
pub type ConfigKey = String;

/// Natural key of a row in `metadata.catalog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogKey {
    pub schema_name: String,
    pub table_name: String,
    pub db_engine: String,
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.schema_name, self.table_name, self.db_engine)
    }
}
