//! Geolocation lookup backends.

use crate::error::{FilterError, LookupError};
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

/// Country information for a single address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRecord {
    /// ISO 3166-1 alpha-2 code (e.g. "US").
    pub iso_code: Option<String>,
    /// English country name, used for logging only.
    pub name: Option<String>,
}

impl CountryRecord {
    /// Create a record with a code and no name.
    pub fn with_code(code: &str) -> Self {
        Self {
            iso_code: Some(code.to_string()),
            name: None,
        }
    }

    /// The ISO code, if present and non-empty.
    pub fn code(&self) -> Option<&str> {
        self.iso_code.as_deref().filter(|c| !c.is_empty())
    }
}

/// Maps an IP address to the country it is registered in.
pub trait CountryLookup: Send + Sync {
    /// Look up the country for an address.
    fn lookup(&self, ip: IpAddr) -> Result<CountryRecord, LookupError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// MaxMind GeoIP2 / GeoLite2 database reader.
pub struct MaxMindLookup {
    reader: Reader<Vec<u8>>,
}

impl MaxMindLookup {
    /// Open a `.mmdb` database from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FilterError> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path).map_err(|source| FilterError::Init {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            build_epoch = reader.metadata.build_epoch,
            "GeoIP database opened"
        );

        Ok(Self { reader })
    }

    /// Database type string from the file metadata (e.g. "GeoLite2-Country").
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }
}

impl CountryLookup for MaxMindLookup {
    fn lookup(&self, ip: IpAddr) -> Result<CountryRecord, LookupError> {
        let record: geoip2::Country = self.reader.lookup(ip)?;

        Ok(record
            .country
            .map(|country| CountryRecord {
                iso_code: country.iso_code.map(String::from),
                name: country
                    .names
                    .and_then(|n| n.get("en").map(|s| s.to_string())),
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "maxmind"
    }
}
