//! Country filter for inbound connections.
//!
//! Decides whether a connection may proceed based on the country its source
//! address resolves to in a local MaxMind GeoIP database.
//!
//! # Rules
//!
//! - **Relays** - Private, loopback and link-local addresses (TURN relays) are
//!   always allowed and never looked up
//! - **Allowed countries** - Addresses resolving to a configured ISO code are allowed
//! - **Other countries** - Blocked
//! - **Unknown country** - Addresses missing from the database are blocked
//! - **Invalid input** - Unparsable addresses are blocked
//!
//! # Example Configuration
//!
//! ```yaml
//! geoip:
//!   database_path: "/usr/share/GeoIP/GeoLite2-Country.mmdb"
//!
//! allowed_countries:
//!   - "US"
//!   - "CA"
//!
//! relay:
//!   extra_networks:
//!     - "100.64.0.0/10"
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod geoip;
pub mod relay;

pub use config::Config;
pub use error::{FilterError, LookupError};
pub use filter::{CountryFilter, Decision, FilterStats};
