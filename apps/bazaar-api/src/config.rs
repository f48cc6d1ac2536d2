//! # API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAZAAR_BIND_ADDR=0.0.0.0:8080                                      │
//! │     BAZAAR_GATEWAY_KEY_SECRET=...                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $BAZAAR_CONFIG, or                                                 │
//! │     ~/.config/bazaar/bazaar.toml (Linux)                               │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//!
//! [database]
//! path = "/var/lib/bazaar/bazaar.db"
//! max_connections = 5
//!
//! [checkout]
//! shipping_charge_paise = 5000
//! free_shipping_above_paise = 50000
//! cod_limit_paise = 400000
//! currency = "INR"
//! pending_order_ttl_hours = 24
//!
//! [gateway]
//! base_url = "https://api.razorpay.com/v1"
//! key_id = "rzp_live_..."
//! key_secret = "..."
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bazaar_core::{CheckoutPolicy, Money, CURRENCY, PENDING_GATEWAY_ORDER_TTL_HOURS};
use bazaar_db::DbConfig;
use bazaar_orders::ServiceConfig;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Falls back to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Checkout money rules, all amounts in paise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    #[serde(default = "default_shipping_charge")]
    pub shipping_charge_paise: i64,

    /// Shipping is free when the subtotal is strictly above this.
    #[serde(default = "default_free_shipping_above")]
    pub free_shipping_above_paise: i64,

    /// Cash on delivery is refused when the total is strictly above this.
    #[serde(default = "default_cod_limit")]
    pub cod_limit_paise: i64,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_pending_ttl")]
    pub pending_order_ttl_hours: i64,
}

fn default_shipping_charge() -> i64 {
    CheckoutPolicy::default().shipping_charge.paise()
}

fn default_free_shipping_above() -> i64 {
    CheckoutPolicy::default().free_shipping_above.paise()
}

fn default_cod_limit() -> i64 {
    CheckoutPolicy::default().cod_limit.paise()
}

fn default_currency() -> String {
    CURRENCY.to_string()
}

fn default_pending_ttl() -> i64 {
    PENDING_GATEWAY_ORDER_TTL_HOURS
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            shipping_charge_paise: default_shipping_charge(),
            free_shipping_above_paise: default_free_shipping_above(),
            cod_limit_paise: default_cod_limit(),
            currency: default_currency(),
            pending_order_ttl_hours: default_pending_ttl(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    #[serde(default)]
    pub key_id: Option<String>,

    #[serde(default)]
    pub key_secret: Option<String>,
}

fn default_gateway_url() -> String {
    "https://api.razorpay.com/v1".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            base_url: default_gateway_url(),
            key_id: None,
            key_secret: None,
        }
    }
}

impl GatewaySettings {
    /// Both halves of the key pair are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.key_id, &self.key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &self.key_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// =============================================================================
// BazaarConfig
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BazaarConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl BazaarConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`BAZAAR_CONFIG` or the platform config dir)
    /// 3. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BAZAAR_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!(?path, "Loading config from file");
                Self::from_toml(&std::fs::read_to_string(&path)?)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `BAZAAR_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn paise(key: &str, value: String) -> Result<i64, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        }

        if let Some(addr) = lookup("BAZAAR_BIND_ADDR") {
            debug!(addr = %addr, "Overriding bind address from environment");
            self.server.bind_addr = addr;
        }
        if let Some(path) = lookup("BAZAAR_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(id) = lookup("BAZAAR_GATEWAY_KEY_ID") {
            self.gateway.key_id = Some(id);
        }
        if let Some(secret) = lookup("BAZAAR_GATEWAY_KEY_SECRET") {
            self.gateway.key_secret = Some(secret);
        }
        if let Some(url) = lookup("BAZAAR_GATEWAY_BASE_URL") {
            self.gateway.base_url = url;
        }
        if let Some(v) = lookup("BAZAAR_SHIPPING_CHARGE") {
            self.checkout.shipping_charge_paise = paise("BAZAAR_SHIPPING_CHARGE", v)?;
        }
        if let Some(v) = lookup("BAZAAR_FREE_SHIPPING_ABOVE") {
            self.checkout.free_shipping_above_paise = paise("BAZAAR_FREE_SHIPPING_ABOVE", v)?;
        }
        if let Some(v) = lookup("BAZAAR_COD_LIMIT") {
            self.checkout.cod_limit_paise = paise("BAZAAR_COD_LIMIT", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue("server.bind_addr".to_string()))?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        let checkout = &self.checkout;
        if checkout.shipping_charge_paise < 0
            || checkout.free_shipping_above_paise < 0
            || checkout.cod_limit_paise < 0
        {
            return Err(ConfigError::Invalid("checkout amounts must not be negative".into()));
        }
        if checkout.currency.len() != 3 || !checkout.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::InvalidValue("checkout.currency".to_string()));
        }
        if checkout.pending_order_ttl_hours <= 0 {
            return Err(ConfigError::Invalid(
                "checkout.pending_order_ttl_hours must be greater than 0".into(),
            ));
        }

        if self.gateway.key_id.is_some() != self.gateway.key_secret.is_some() {
            return Err(ConfigError::Invalid(
                "gateway.key_id and gateway.key_secret must be set together".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind_addr".to_string()))
    }

    pub fn db_config(&self) -> DbConfig {
        let path = self
            .database
            .path
            .clone()
            .or_else(|| {
                directories::ProjectDirs::from("com", "bazaar", "bazaar")
                    .map(|dirs| dirs.data_dir().join("bazaar.db"))
            })
            .unwrap_or_else(|| PathBuf::from("bazaar.db"));

        DbConfig::new(path).max_connections(self.database.max_connections)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            checkout: CheckoutPolicy {
                shipping_charge: Money::from_paise(self.checkout.shipping_charge_paise),
                free_shipping_above: Money::from_paise(self.checkout.free_shipping_above_paise),
                cod_limit: Money::from_paise(self.checkout.cod_limit_paise),
            },
            currency: self.checkout.currency.clone(),
            pending_order_ttl: chrono::Duration::hours(self.checkout.pending_order_ttl_hours),
            ..ServiceConfig::default()
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bazaar", "bazaar")
            .map(|dirs| dirs.config_dir().join("bazaar.toml"))
    }
}
