use anyhow::Result;
use sqlx::SqliteConnection;

use crate::db::{IpAddressRepo, NotFoundError};
use crate::models::{CreateNetworkInterfaceRequest, NetworkInterface, UsageChange};

/// How an interface write reaches the database.
/// `Raw` is the bulk/import path and leaves every in_use flag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Normal,
    Raw,
}

/// The part of an interface that decides whether it holds an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub ip_address: Option<String>,
    pub active: bool,
}

impl Claim {
    pub fn of(iface: &NetworkInterface) -> Self {
        Self {
            ip_address: iface.ip_address.clone(),
            active: iface.active,
        }
    }

    pub fn requested(req: &CreateNetworkInterfaceRequest) -> Self {
        Self {
            ip_address: req.ip_address.clone(),
            active: req.active,
        }
    }

    /// Address this claim holds, if it holds one
    fn held(&self) -> Option<&str> {
        if self.active {
            self.ip_address.as_deref()
        } else {
            None
        }
    }
}

/// Distinct non-null addresses touched by moving from `previous` to `next`
fn affected_addresses<'a>(previous: Option<&'a Claim>, next: Option<&'a Claim>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::with_capacity(2);
    for addr in [previous, next]
        .into_iter()
        .flatten()
        .filter_map(|c| c.ip_address.as_deref())
    {
        if !out.contains(&addr) {
            out.push(addr);
        }
    }
    out
}

/// Recompute in_use for `address` given everything except `interface_id`,
/// plus whether the interface being written claims it. Writes only on change.
async fn resync(
    conn: &mut SqliteConnection,
    address: &str,
    interface_id: Option<i64>,
    claimed_here: bool,
) -> Result<Option<UsageChange>> {
    let state = IpAddressRepo::usage_state(conn, address, interface_id)
        .await?
        .ok_or_else(|| NotFoundError::new("IP Address", address))?;

    let in_use = state.claimed_elsewhere || claimed_here;
    if in_use == state.in_use {
        return Ok(None);
    }

    IpAddressRepo::set_in_use(conn, address, in_use).await?;
    tracing::debug!("IP address {} in_use -> {}", address, in_use);
    Ok(Some(UsageChange {
        address: address.to_string(),
        in_use,
    }))
}

/// Pre-write hook for an interface row. `interface_id` is None for a row not yet inserted.
pub async fn before_save(
    conn: &mut SqliteConnection,
    interface_id: Option<i64>,
    previous: Option<&Claim>,
    next: &Claim,
    mode: WriteMode,
) -> Result<Vec<UsageChange>> {
    if mode == WriteMode::Raw {
        return Ok(Vec::new());
    }

    let mut changes = Vec::new();
    for address in affected_addresses(previous, Some(next)) {
        let claimed_here = next.held() == Some(address);
        if let Some(change) = resync(conn, address, interface_id, claimed_here).await? {
            changes.push(change);
        }
    }
    Ok(changes)
}

/// Pre-delete hook: release the address of the interface about to be removed
pub async fn before_delete(
    conn: &mut SqliteConnection,
    interface_id: i64,
    current: &Claim,
) -> Result<Vec<UsageChange>> {
    let mut changes = Vec::new();
    for address in affected_addresses(Some(current), None) {
        if let Some(change) = resync(conn, address, Some(interface_id), false).await? {
            changes.push(change);
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(ip: Option<&str>, active: bool) -> Claim {
        Claim {
            ip_address: ip.map(|s| s.to_string()),
            active,
        }
    }

    #[test]
    fn test_affected_addresses() {
        let a = claim(Some("10.0.0.1"), true);
        let b = claim(Some("10.0.0.2"), true);
        let none = claim(None, true);

        assert_eq!(affected_addresses(Some(&a), Some(&b)), vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(affected_addresses(Some(&a), Some(&a)), vec!["10.0.0.1"]);
        assert_eq!(affected_addresses(None, Some(&b)), vec!["10.0.0.2"]);
        assert_eq!(affected_addresses(Some(&a), Some(&none)), vec!["10.0.0.1"]);
        assert!(affected_addresses(None, Some(&none)).is_empty());
    }

    #[test]
    fn test_inactive_claim_holds_nothing() {
        assert_eq!(claim(Some("10.0.0.1"), true).held(), Some("10.0.0.1"));
        assert_eq!(claim(Some("10.0.0.1"), false).held(), None);
        assert_eq!(claim(None, true).held(), None);
    }
}
