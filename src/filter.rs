//! Country-based connection filter.

use crate::config::{Config, Settings};
use crate::error::{FilterError, LookupError};
use crate::geoip::{CountryLookup, CountryRecord, MaxMindLookup};
use crate::relay::{canonical, is_relay_address, RelayEntry};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Country code reported for relay addresses.
pub const RELAY_CODE: &str = "RELAY";

/// Country code reported when the country cannot be determined.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Outcome of a single filter decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the connection may proceed.
    pub allowed: bool,
    /// Resolved ISO code, `RELAY`, `UNKNOWN`, or empty for unparsable input.
    pub country_code: String,
    /// Whether the address was classified as a relay.
    pub is_relay: bool,
}

impl Decision {
    fn relay() -> Self {
        Self {
            allowed: true,
            country_code: RELAY_CODE.to_string(),
            is_relay: true,
        }
    }

    fn invalid() -> Self {
        Self {
            allowed: false,
            country_code: String::new(),
            is_relay: false,
        }
    }

    fn unknown() -> Self {
        Self {
            allowed: false,
            country_code: UNKNOWN_CODE.to_string(),
            is_relay: false,
        }
    }

    fn country(code: &str, allowed: bool) -> Self {
        Self {
            allowed,
            country_code: code.to_string(),
            is_relay: false,
        }
    }
}

/// Snapshot of the decision counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub allowed: u64,
    pub blocked: u64,
    pub relay: u64,
}

impl FilterStats {
    /// Total number of decisions made.
    pub fn total(&self) -> u64 {
        self.allowed + self.blocked + self.relay
    }
}

/// Allows or blocks addresses by the country they resolve to.
pub struct CountryFilter {
    lookup: RwLock<Option<Box<dyn CountryLookup>>>,
    allowed_countries: HashSet<String>,
    relay_networks: Vec<RelayEntry>,
    settings: Settings,
    stats: RwLock<FilterStats>,
}

impl CountryFilter {
    /// Open the GeoIP database at `database_path` and allow `allowed_countries`.
    pub fn open<P, S>(database_path: P, allowed_countries: &[S]) -> Result<Self, FilterError>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let path = database_path.as_ref();
        info!(path = %path.display(), "Opening GeoIP database");

        let lookup = MaxMindLookup::open(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to open GeoIP database");
            e
        })?;

        info!(
            path = %path.display(),
            database_type = %lookup.database_type(),
            "GeoIP database loaded"
        );

        Ok(Self::with_lookup(lookup, allowed_countries))
    }

    /// Build a filter around any lookup backend.
    pub fn with_lookup<L, S>(lookup: L, allowed_countries: &[S]) -> Self
    where
        L: CountryLookup + 'static,
        S: AsRef<str>,
    {
        let allowed_countries: HashSet<String> = allowed_countries
            .iter()
            .map(|c| c.as_ref().trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();

        let filter = Self {
            lookup: RwLock::new(Some(Box::new(lookup))),
            allowed_countries,
            relay_networks: Vec::new(),
            settings: Settings::default(),
            stats: RwLock::new(FilterStats::default()),
        };
        filter.log_rules();
        filter
    }

    /// Build a filter from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, FilterError> {
        let filter = Self::open(&config.geoip.database_path, &config.allowed_countries)?
            .with_relay_networks(config.parse_relay_networks())
            .with_settings(config.settings);
        Ok(filter)
    }

    /// Treat these addresses or networks as relays as well.
    pub fn with_relay_networks(mut self, networks: Vec<RelayEntry>) -> Self {
        if !networks.is_empty() {
            info!(networks = networks.len(), "Extra relay networks configured");
        }
        self.relay_networks = networks;
        self
    }

    /// Set logging behaviour.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    fn log_rules(&self) {
        let mut countries: Vec<&str> = self.allowed_countries.iter().map(String::as_str).collect();
        countries.sort_unstable();

        if countries.is_empty() {
            warn!("No allowed countries configured, every non-relay address will be blocked");
        }

        info!(
            allowed_countries = ?countries,
            private_relays = "allowed",
            unknown_country = "blocked",
            other_countries = "blocked",
            "Country filter initialized"
        );
    }

    /// Whether `code` is in the allow-set.
    pub fn is_country_allowed(&self, code: &str) -> bool {
        self.allowed_countries.contains(code)
    }

    /// Decide on a textual IPv4 or IPv6 address.
    pub fn decide(&self, ip: &str) -> Decision {
        match ip.parse::<IpAddr>() {
            Ok(addr) => self.decide_addr(addr),
            Err(_) => {
                let blocked = self.count(|s| &mut s.blocked);
                debug!(ip = %ip, total_blocked = blocked, "Invalid IP address, blocking");
                Decision::invalid()
            }
        }
    }

    /// Decide on an already parsed address.
    pub fn decide_addr(&self, ip: IpAddr) -> Decision {
        let ip = canonical(ip);

        if self.is_relay(&ip) {
            let relays = self.count(|s| &mut s.relay);
            debug!(ip = %ip, total_relays = relays, "Relay address, allowing");
            return Decision::relay();
        }

        let record = match self.lookup_country(ip) {
            Ok(record) => record,
            Err(e) => {
                let blocked = self.count(|s| &mut s.blocked);
                if self.settings.log_blocked {
                    info!(ip = %ip, error = %e, total_blocked = blocked, "Country unknown, blocking");
                }
                return Decision::unknown();
            }
        };

        let Some(code) = record.code() else {
            let blocked = self.count(|s| &mut s.blocked);
            if self.settings.log_blocked {
                info!(ip = %ip, total_blocked = blocked, "No country code for address, blocking");
            }
            return Decision::unknown();
        };
        let name = record.name.as_deref().unwrap_or("");

        if self.is_country_allowed(code) {
            let allowed = self.count(|s| &mut s.allowed);
            if self.settings.log_allowed {
                debug!(ip = %ip, country = %code, name = %name, total_allowed = allowed, "Allowing");
            }
            Decision::country(code, true)
        } else {
            let blocked = self.count(|s| &mut s.blocked);
            if self.settings.log_blocked {
                info!(ip = %ip, country = %code, name = %name, total_blocked = blocked, "Blocking");
            }
            Decision::country(code, false)
        }
    }

    /// Current counter snapshot.
    pub fn stats(&self) -> FilterStats {
        *self.stats.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the GeoIP database. Later lookups resolve as unknown.
    pub fn shutdown(&self) {
        let mut lookup = self.lookup.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(backend) = lookup.take() {
            info!(backend = backend.name(), "Country filter lookup closed");
        }
    }

    /// Whether the lookup backend is still open.
    pub fn is_open(&self) -> bool {
        self.lookup
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn is_relay(&self, ip: &IpAddr) -> bool {
        is_relay_address(ip) || self.relay_networks.iter().any(|entry| entry.contains(ip))
    }

    fn lookup_country(&self, ip: IpAddr) -> Result<CountryRecord, LookupError> {
        let lookup = self.lookup.read().unwrap_or_else(PoisonError::into_inner);
        match lookup.as_ref() {
            Some(backend) => backend.lookup(ip),
            None => Err(LookupError::Unavailable),
        }
    }

    /// Bump one counter and return its new value.
    fn count(&self, counter: fn(&mut FilterStats) -> &mut u64) -> u64 {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        let value = counter(&mut *stats);
        *value += 1;
        *value
    }
}
