//! Configuration types for the country filter.

use crate::relay::RelayEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// GeoIP database configuration.
    pub geoip: GeoIpConfig,

    /// ISO country codes whose addresses are allowed.
    #[serde(default)]
    pub allowed_countries: Vec<String>,

    /// Relay address handling.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Global settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Settings {
    /// Log blocked decisions.
    #[serde(default = "default_true")]
    pub log_blocked: bool,

    /// Log allowed decisions.
    #[serde(default)]
    pub log_allowed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_blocked: true,
            log_allowed: false,
        }
    }
}

/// GeoIP database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeoIpConfig {
    /// Path to a GeoIP2 / GeoLite2 Country or City database.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/usr/share/GeoIP/GeoLite2-Country.mmdb")
}

/// Relay address handling.
///
/// Private, loopback and link-local addresses are always treated as relays;
/// `extra_networks` adds more.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Additional relay addresses or CIDR blocks.
    #[serde(default)]
    pub extra_networks: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let db = &self.geoip.database_path;
        if db.as_os_str().is_empty() {
            anyhow::bail!("geoip.database_path is empty");
        }
        if !db.is_file() {
            anyhow::bail!("GeoIP database is not a file: {}", db.display());
        }

        for code in &self.allowed_countries {
            if !is_country_code(code) {
                anyhow::bail!("Invalid country code: {:?} (expected two letters)", code);
            }
        }

        for entry in &self.relay.extra_networks {
            if RelayEntry::parse(entry).is_none() {
                anyhow::bail!("Invalid relay network: {}", entry);
            }
        }

        Ok(())
    }

    /// Parse relay entries, skipping any that do not parse.
    pub fn parse_relay_networks(&self) -> Vec<RelayEntry> {
        self.relay
            .extra_networks
            .iter()
            .filter_map(|s| RelayEntry::parse(s))
            .collect()
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Country Filter Configuration

settings:
  log_blocked: true            # Log every blocked address
  log_allowed: false           # Log every allowed address (debug level)

# MaxMind GeoIP2 / GeoLite2 database
geoip:
  database_path: "/usr/share/GeoIP/GeoLite2-Country.mmdb"

# ISO 3166-1 alpha-2 codes that are allowed.
# Addresses from any other country, or with no known country, are blocked.
allowed_countries:
  - "US"
  - "CA"

# Private, loopback and link-local addresses are always allowed as relays.
# Extra relay addresses or CIDR blocks can be listed here.
relay:
  extra_networks:
    - "100.64.0.0/10"
"#
        .to_string()
    }
}

fn is_country_code(code: &str) -> bool {
    let code = code.trim();
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"))
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    env_var_pattern()
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_with_db(db: &Path) -> Config {
        Config {
            settings: Settings::default(),
            geoip: GeoIpConfig {
                database_path: db.to_path_buf(),
            },
            allowed_countries: vec!["US".to_string(), "CA".to_string()],
            relay: RelayConfig::default(),
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.log_blocked);
        assert!(!settings.log_allowed);
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("COUNTRY_FILTER_TEST_DB", "/data/geo.mmdb");
        let input = "database_path: \"${COUNTRY_FILTER_TEST_DB}\"";
        let result = expand_env_vars(input);
        assert_eq!(result, "database_path: \"/data/geo.mmdb\"");
        std::env::remove_var("COUNTRY_FILTER_TEST_DB");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let input = "database_path: \"${COUNTRY_FILTER_NONEXISTENT_VAR}\"";
        let result = expand_env_vars(input);
        assert_eq!(result, "database_path: \"\"");
    }

    #[test]
    fn test_parse_config_yaml() {
        let yaml = r#"
settings:
  log_allowed: true

geoip:
  database_path: "/var/lib/GeoIP/GeoLite2-City.mmdb"

allowed_countries:
  - "US"
  - "CA"
  - "US"

relay:
  extra_networks:
    - "100.64.0.0/10"
    - "198.51.100.7"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.settings.log_allowed);
        assert!(config.settings.log_blocked);
        assert_eq!(
            config.geoip.database_path,
            PathBuf::from("/var/lib/GeoIP/GeoLite2-City.mmdb")
        );
        assert_eq!(config.allowed_countries.len(), 3);
        assert_eq!(config.parse_relay_networks().len(), 2);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = "geoip: {}\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.geoip.database_path, default_database_path());
        assert!(config.allowed_countries.is_empty());
        assert!(config.relay.extra_networks.is_empty());
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_example_parses() {
        let config: Config = serde_yaml::from_str(&Config::example()).unwrap();
        assert_eq!(config.allowed_countries, vec!["US", "CA"]);
        assert_eq!(config.relay.extra_networks, vec!["100.64.0.0/10"]);
    }

    #[test]
    fn test_validate_ok() {
        let db = NamedTempFile::new().unwrap();
        assert!(config_with_db(db.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_missing_database() {
        let config = config_with_db(Path::new("/nonexistent/GeoLite2-Country.mmdb"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_db(dir.path());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_database_path() {
        let config = config_with_db(Path::new(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_country_code() {
        let db = NamedTempFile::new().unwrap();
        for bad in ["USA", "U", "1A", ""] {
            let mut config = config_with_db(db.path());
            config.allowed_countries.push(bad.to_string());
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_bad_relay_network() {
        let db = NamedTempFile::new().unwrap();
        let mut config = config_with_db(db.path());
        config.relay.extra_networks.push("not-a-network".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let db = NamedTempFile::new().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "geoip:\n  database_path: \"{}\"\nallowed_countries: [\"DE\", \"fr\"]\n",
            db.path().display()
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.allowed_countries, vec!["DE", "fr"]);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "geoip:\n  database_path: \"/nonexistent/db.mmdb\"\nallowed_countries: [\"US\"]\n"
        )
        .unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}
