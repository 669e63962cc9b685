#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `PostGIS` gateway for the park assets boundary check.
//!
//! Uses `switchy_database` raw queries throughout: the asset schema is
//! discovered at runtime from `information_schema`, so there is nothing for
//! a typed query builder to bind to. Spatial work (`ST_Transform`,
//! `ST_Intersects`, geography distances) happens in `PostGIS`.

pub mod catalog;
pub mod db;
pub mod queries;
pub mod reproject;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The connection could not be established.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// Connection settings are missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Quotes a Postgres identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("benches"), "\"benches\"");
        assert_eq!(quote_ident("Park Signs"), "\"Park Signs\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
