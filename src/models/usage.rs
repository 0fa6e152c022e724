use serde::{Deserialize, Serialize};

/// A single in_use flag rewrite on an IP address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageChange {
    pub address: String,
    pub in_use: bool,
}

/// Result of comparing stored in_use flags against interface claims
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReport {
    /// Number of addresses examined
    pub checked: usize,
    /// Addresses whose stored flag disagreed, with the value it should have
    pub drifted: Vec<UsageChange>,
    /// True when the drifted rows were rewritten
    pub repaired: bool,
}

impl UsageReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty()
    }
}
