use anyhow::Result;
use std::collections::HashSet;

use crate::db::{NotFoundError, ValidationError};
use crate::models::{CreateNetworkInterfaceRequest, InterfaceBatchOp, NetworkInterface};

/// One interface of a computer as it will look after the batch.
/// `id` is None for rows the batch creates.
#[derive(Debug, Clone)]
pub struct PlannedRow {
    pub id: Option<i64>,
    pub req: CreateNetworkInterfaceRequest,
}

/// Validated batch, in the order it must be written
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub deletes: Vec<NetworkInterface>,
    /// Non-primary rows first, the primary row last
    pub saves: Vec<PlannedRow>,
}

/// Apply `ops` to the computer's current interfaces without touching the database.
/// Every op is pinned to `computer_id`; ids must belong to `existing`.
pub fn plan(computer_id: i64, existing: &[NetworkInterface], ops: &[InterfaceBatchOp]) -> Result<BatchPlan> {
    let mut rows: Vec<PlannedRow> = existing
        .iter()
        .map(|iface| PlannedRow {
            id: Some(iface.id),
            req: CreateNetworkInterfaceRequest::from(iface),
        })
        .collect();
    let mut touched: HashSet<i64> = HashSet::new();
    let mut changed: HashSet<i64> = HashSet::new();
    let mut deletes = Vec::new();
    let mut created = Vec::new();

    for op in ops {
        match op {
            InterfaceBatchOp::Create(req) => {
                let mut req = req.clone();
                req.computer_id = computer_id;
                created.push(PlannedRow { id: None, req });
            }
            InterfaceBatchOp::Update { id, req } => {
                let pos = position(&rows, *id)?;
                if !touched.insert(*id) {
                    return Err(ValidationError::new(format!("Network interface {} appears twice in batch", id)).into());
                }
                let mut req = req.clone();
                req.computer_id = computer_id;
                rows[pos].req = req;
                changed.insert(*id);
            }
            InterfaceBatchOp::Delete { id } => {
                let pos = position(&rows, *id)?;
                if !touched.insert(*id) {
                    return Err(ValidationError::new(format!("Network interface {} appears twice in batch", id)).into());
                }
                rows.remove(pos);
                if let Some(iface) = existing.iter().find(|i| i.id == *id) {
                    deletes.push(iface.clone());
                }
            }
        }
    }

    rows.extend(created);
    validate(&rows)?;

    // untouched rows are already stored as-is
    let (primary, others): (Vec<PlannedRow>, Vec<PlannedRow>) = rows
        .into_iter()
        .filter(|row| row.id.map_or(true, |id| changed.contains(&id)))
        .partition(|row| row.req.primary);
    let mut saves = others;
    saves.extend(primary);

    Ok(BatchPlan { deletes, saves })
}

fn position(rows: &[PlannedRow], id: i64) -> Result<usize> {
    rows.iter()
        .position(|row| row.id == Some(id))
        .ok_or_else(|| NotFoundError::new("Network Interface", &id.to_string()).into())
}

/// Whole-set rules for one computer's interfaces
pub fn validate(rows: &[PlannedRow]) -> Result<()> {
    if rows.iter().filter(|row| row.req.primary).count() > 1 {
        return Err(ValidationError::new("Only one network interface can be primary").into());
    }

    let mut addresses = HashSet::new();
    for address in rows.iter().filter_map(|row| row.req.ip_address.as_deref()) {
        if !addresses.insert(address) {
            return Err(ValidationError::new("Cannot assign duplicate IP addresses").into());
        }
    }

    let mut names = HashSet::new();
    for row in rows.iter().filter(|row| row.req.active) {
        if row.req.name.is_empty() {
            return Err(ValidationError::new("Network interface name is required").into());
        }
        if !names.insert(row.req.name.as_str()) {
            return Err(ValidationError::new(format!(
                "Network interface name {} is already in use on this computer",
                row.req.name
            ))
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ErrorKind;
    use crate::models::InterfaceKind;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn iface(id: i64, name: &str, ip: Option<&str>, primary: bool) -> NetworkInterface {
        let now = Utc::now();
        NetworkInterface {
            id,
            computer_id: 1,
            name: name.to_string(),
            kind: InterfaceKind::Ethernet,
            mac_address: String::new(),
            primary,
            managed: false,
            ip_address: ip.map(|s| s.to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn create(name: &str) -> CreateNetworkInterfaceRequest {
        CreateNetworkInterfaceRequest::new(1, name, InterfaceKind::Ethernet)
    }

    #[test]
    fn test_rejects_two_primaries() {
        let existing = vec![iface(1, "en0", None, true)];
        let ops = vec![InterfaceBatchOp::Create(create("en1").with_primary(true))];
        let err = assert_err!(plan(1, &existing, &ops));
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);
        assert!(err.to_string().contains("Only one network interface can be primary"));
    }

    #[test]
    fn test_rejects_duplicate_addresses() {
        let existing = vec![iface(1, "en0", Some("10.0.0.1"), false)];
        let ops = vec![InterfaceBatchOp::Create(create("en1").with_ip("10.0.0.1"))];
        let err = assert_err!(plan(1, &existing, &ops));
        assert!(err.to_string().contains("Cannot assign duplicate IP addresses"));
    }

    #[test]
    fn test_rejects_duplicate_active_names() {
        let ops = vec![
            InterfaceBatchOp::Create(create("en0")),
            InterfaceBatchOp::Create(create("en0")),
        ];
        let err = assert_err!(plan(1, &[], &ops));
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);

        // an inactive row may share a name
        let mut inactive = create("en0");
        inactive.active = false;
        let ops = vec![InterfaceBatchOp::Create(create("en0")), InterfaceBatchOp::Create(inactive)];
        assert_ok!(plan(1, &[], &ops));
    }

    #[test]
    fn test_foreign_or_repeated_ids() {
        let existing = vec![iface(1, "en0", None, false)];
        let err = assert_err!(plan(1, &existing, &[InterfaceBatchOp::Delete { id: 99 }]));
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);

        let ops = vec![InterfaceBatchOp::Delete { id: 1 }, InterfaceBatchOp::Update { id: 1, req: create("en0") }];
        let err = assert_err!(plan(1, &existing, &ops));
        assert_eq!(ErrorKind::of(&err), ErrorKind::NotFound);

        let ops = vec![
            InterfaceBatchOp::Update { id: 1, req: create("en0") },
            InterfaceBatchOp::Update { id: 1, req: create("en1") },
        ];
        let err = assert_err!(plan(1, &existing, &ops));
        assert_eq!(ErrorKind::of(&err), ErrorKind::Validation);
    }

    #[test]
    fn test_moving_primary_and_address_between_rows() {
        // en0 gives up both primary and its address to en1 in the same batch
        let existing = vec![iface(1, "en0", Some("10.0.0.1"), true), iface(2, "en1", None, false)];
        let ops = vec![
            InterfaceBatchOp::Update { id: 2, req: create("en1").with_ip("10.0.0.1").with_primary(true) },
            InterfaceBatchOp::Update { id: 1, req: create("en0") },
        ];
        let plan = assert_ok!(plan(1, &existing, &ops));
        assert!(plan.deletes.is_empty());
        let order: Vec<Option<i64>> = plan.saves.iter().map(|row| row.id).collect();
        assert_eq!(order, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_write_order_and_pinned_computer() {
        let existing = vec![iface(1, "en0", None, false), iface(2, "en1", None, false), iface(3, "wl0", None, false)];
        let mut foreign = create("en2").with_primary(true);
        foreign.computer_id = 42;
        let ops = vec![
            InterfaceBatchOp::Create(foreign),
            InterfaceBatchOp::Delete { id: 2 },
            InterfaceBatchOp::Update { id: 3, req: create("wl0").with_ip("10.0.0.3") },
        ];
        let plan = assert_ok!(plan(1, &existing, &ops));

        assert_eq!(plan.deletes.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2]);
        // untouched en0 is not rewritten; the primary row comes last
        assert_eq!(plan.saves.len(), 2);
        assert_eq!(plan.saves[0].id, Some(3));
        assert_eq!(plan.saves[1].id, None);
        assert!(plan.saves[1].req.primary);
        assert!(plan.saves.iter().all(|row| row.req.computer_id == 1));
    }
}
