//! Error types for the country filter.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while building a [`CountryFilter`](crate::CountryFilter).
#[derive(Debug, Error)]
pub enum FilterError {
    /// The geolocation database could not be opened.
    #[error("failed to open GeoIP database {}: {source}", .path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: maxminddb::MaxMindDBError,
    },
}

/// Error returned by a [`CountryLookup`](crate::geoip::CountryLookup).
///
/// Never surfaced from a decision; every variant resolves to an
/// `UNKNOWN` block.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The address has no entry in the database.
    #[error("address not found in database")]
    NotFound,

    /// The lookup handle has been released.
    #[error("lookup database is closed")]
    Unavailable,

    /// The database reader failed.
    #[error("database error: {0}")]
    Database(String),
}

impl From<maxminddb::MaxMindDBError> for LookupError {
    fn from(e: maxminddb::MaxMindDBError) -> Self {
        match e {
            maxminddb::MaxMindDBError::AddressNotFoundError(_) => LookupError::NotFound,
            other => LookupError::Database(other.to_string()),
        }
    }
}
