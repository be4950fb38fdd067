use crate::infrastructure::error::EngineError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), EngineError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub(crate) fn open_connection(path: &Path) -> Result<Connection, EngineError> {
    Connection::open(path).map_err(EngineError::from)
}
