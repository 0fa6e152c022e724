use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// IpAddress is a tracked address record, keyed by its canonical literal.
/// `in_use` is derived from the network interfaces that claim the address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<String>,
    pub in_use: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IpAddress {
    /// Alternate names, split from the space-delimited alias field
    pub fn alias_list(&self) -> Vec<&str> {
        self.aliases
            .as_deref()
            .map(|a| a.split_whitespace().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for IpAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.hostname, self.address)
    }
}

/// CreateIpAddressRequest for registering an address.
/// `in_use` is never taken from callers.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIpAddressRequest {
    pub address: String,
    pub hostname: String,
    #[serde(default)]
    pub aliases: Option<String>,
}

/// UpdateIpAddressRequest for editing descriptive fields of an address
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateIpAddressRequest {
    pub hostname: String,
    #[serde(default)]
    pub aliases: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

pub(crate) fn default_true() -> bool {
    true
}
