use anyhow::{Context, Result};
use sqlx::SqliteConnection;

use crate::models::*;
use crate::services::interface_batch;
use crate::services::usage_sync::{self, Claim, WriteMode};
use crate::utils;
use super::{ComputerRepo, IpAddressRepo, NetworkInterfaceRepo, NotFoundError, Store, ValidationError};

/// Which row checks a single interface write runs.
/// Batches validate primary and name rules on the whole projected set instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowChecks {
    Full,
    ReferencesOnly,
}

/// Canonical form of an interface request: trimmed name, normalized MAC and address
fn prepare(req: &CreateNetworkInterfaceRequest) -> Result<CreateNetworkInterfaceRequest> {
    let ip_address = match req.ip_address.as_deref().map(str::trim) {
        Some(addr) if !addr.is_empty() => Some(IpAddressRepo::normalize(addr)?),
        _ => None,
    };
    Ok(CreateNetworkInterfaceRequest {
        name: req.name.trim().to_string(),
        mac_address: utils::normalize_mac(&req.mac_address),
        ip_address,
        ..req.clone()
    })
}

fn prepare_op(op: &InterfaceBatchOp) -> Result<InterfaceBatchOp> {
    Ok(match op {
        InterfaceBatchOp::Create(req) => InterfaceBatchOp::Create(prepare(req)?),
        InterfaceBatchOp::Update { id, req } => InterfaceBatchOp::Update {
            id: *id,
            req: prepare(req)?,
        },
        InterfaceBatchOp::Delete { id } => InterfaceBatchOp::Delete { id: *id },
    })
}

async fn check_row(
    conn: &mut SqliteConnection,
    id: Option<i64>,
    req: &CreateNetworkInterfaceRequest,
    previous: Option<&NetworkInterface>,
    checks: RowChecks,
) -> Result<()> {
    if !ComputerRepo::exists(conn, req.computer_id).await? {
        return Err(NotFoundError::new("Computer", &req.computer_id.to_string()).into());
    }
    if req.name.is_empty() {
        return Err(ValidationError::new("Network interface name is required").into());
    }

    if let Some(address) = req.ip_address.as_deref() {
        let ip = IpAddressRepo::get(&mut *conn, address)
            .await?
            .ok_or_else(|| NotFoundError::new("IP Address", address))?;
        // a reference kept from before may point at a since-deactivated address
        let newly_referenced = previous.and_then(|p| p.ip_address.as_deref()) != Some(address);
        if newly_referenced && !ip.active {
            return Err(ValidationError::new(format!("IP address {} is not active", address)).into());
        }
    }

    if checks == RowChecks::Full {
        if req.primary && NetworkInterfaceRepo::other_primary(conn, req.computer_id, id).await?.is_some() {
            return Err(ValidationError::new("Only one network interface can be primary").into());
        }
        if req.active
            && NetworkInterfaceRepo::other_active_named(conn, req.computer_id, &req.name, id)
                .await?
                .is_some()
        {
            return Err(ValidationError::new(format!(
                "Network interface name {} is already in use on this computer",
                req.name
            ))
            .into());
        }
    }
    Ok(())
}

/// Sync address usage, then write the row. Returns the interface id.
async fn save_in_tx(
    conn: &mut SqliteConnection,
    id: Option<i64>,
    previous: Option<&NetworkInterface>,
    req: &CreateNetworkInterfaceRequest,
) -> Result<i64> {
    let previous_claim = previous.map(Claim::of);
    let changes = usage_sync::before_save(
        conn,
        id,
        previous_claim.as_ref(),
        &Claim::requested(req),
        WriteMode::Normal,
    )
    .await?;
    if !changes.is_empty() {
        tracing::debug!("Interface write changed usage of {} address(es)", changes.len());
    }

    match id {
        Some(id) => {
            NetworkInterfaceRepo::update(conn, id, req).await?;
            Ok(id)
        }
        None => NetworkInterfaceRepo::insert(conn, req).await,
    }
}

/// Release the interface's address, then remove the row
async fn delete_in_tx(conn: &mut SqliteConnection, iface: &NetworkInterface) -> Result<()> {
    usage_sync::before_delete(conn, iface.id, &Claim::of(iface)).await?;
    NetworkInterfaceRepo::delete(conn, iface.id).await
}

async fn load_existing(conn: &mut SqliteConnection, id: i64) -> Result<NetworkInterface> {
    NetworkInterfaceRepo::get(&mut *conn, id)
        .await?
        .ok_or_else(|| NotFoundError::new("Network Interface", &id.to_string()).into())
}

impl Store {
    // ========== Network Interface Operations ==========

    pub async fn get_network_interface(&self, id: i64) -> Result<Option<NetworkInterface>> {
        NetworkInterfaceRepo::get(&self.pool, id).await
    }

    pub async fn list_network_interfaces(&self, filter: &InterfaceFilter) -> Result<Vec<NetworkInterface>> {
        NetworkInterfaceRepo::list(&self.pool, filter).await
    }

    pub async fn create_network_interface(&self, req: &CreateNetworkInterfaceRequest) -> Result<NetworkInterface> {
        let req = prepare(req)?;
        let mut tx = self.begin_write().await?;
        check_row(&mut tx, None, &req, None, RowChecks::Full).await?;
        let id = save_in_tx(&mut tx, None, None, &req).await?;
        let iface = NetworkInterfaceRepo::get(&mut *tx, id)
            .await?
            .context("Network interface not found after creation")?;
        tx.commit().await.context("Failed to commit network interface creation")?;

        tracing::info!("Created network interface {} on computer {}", iface.name, iface.computer_id);
        Ok(iface)
    }

    /// Replace every field of the interface; may move it to another computer or address
    pub async fn update_network_interface(
        &self,
        id: i64,
        req: &CreateNetworkInterfaceRequest,
    ) -> Result<NetworkInterface> {
        let req = prepare(req)?;
        let mut tx = self.begin_write().await?;
        let previous = load_existing(&mut tx, id).await?;
        check_row(&mut tx, Some(id), &req, Some(&previous), RowChecks::Full).await?;
        save_in_tx(&mut tx, Some(id), Some(&previous), &req).await?;
        let iface = NetworkInterfaceRepo::get(&mut *tx, id)
            .await?
            .context("Network interface not found after update")?;
        tx.commit().await.context("Failed to commit network interface update")?;
        Ok(iface)
    }

    pub async fn delete_network_interface(&self, id: i64) -> Result<()> {
        let mut tx = self.begin_write().await?;
        let iface = load_existing(&mut tx, id).await?;
        delete_in_tx(&mut tx, &iface).await?;
        tx.commit().await.context("Failed to commit network interface deletion")?;

        tracing::info!("Deleted network interface {} from computer {}", iface.name, iface.computer_id);
        Ok(())
    }

    /// Apply creates, updates and deletes to one computer's interfaces as a unit.
    /// The resulting set is validated before anything is written. Returns the final set.
    pub async fn apply_interface_batch(
        &self,
        computer_id: i64,
        ops: &[InterfaceBatchOp],
    ) -> Result<Vec<NetworkInterface>> {
        let ops = ops.iter().map(prepare_op).collect::<Result<Vec<_>>>()?;

        let mut tx = self.begin_write().await?;
        if !ComputerRepo::exists(&mut tx, computer_id).await? {
            return Err(NotFoundError::new("Computer", &computer_id.to_string()).into());
        }
        let existing = NetworkInterfaceRepo::list_by_computer(&mut *tx, computer_id).await?;
        let plan = interface_batch::plan(computer_id, &existing, &ops)?;

        for iface in &plan.deletes {
            delete_in_tx(&mut tx, iface).await?;
        }
        for row in &plan.saves {
            let previous = row.id.and_then(|id| existing.iter().find(|i| i.id == id));
            check_row(&mut tx, row.id, &row.req, previous, RowChecks::ReferencesOnly).await?;
            save_in_tx(&mut tx, row.id, previous, &row.req).await?;
        }

        let interfaces = NetworkInterfaceRepo::list_by_computer(&mut *tx, computer_id).await?;
        tx.commit().await.context("Failed to commit interface batch")?;

        tracing::info!(
            "Applied {} interface change(s) to computer {} ({} deleted, {} saved)",
            ops.len(),
            computer_id,
            plan.deletes.len(),
            plan.saves.len()
        );
        Ok(interfaces)
    }

    /// Import path: store the row exactly as given. No row checks, no usage sync.
    pub async fn load_network_interface_raw(&self, iface: &NetworkInterface) -> Result<()> {
        let mut tx = self.begin_write().await?;
        usage_sync::before_save(&mut tx, Some(iface.id), None, &Claim::of(iface), WriteMode::Raw).await?;
        NetworkInterfaceRepo::replace_raw(&mut tx, iface).await?;
        tx.commit().await.context("Failed to commit raw interface load")?;
        Ok(())
    }

    /// Delete a computer. Its interfaces are removed one by one first so their
    /// addresses are released.
    pub async fn delete_computer(&self, id: i64) -> Result<()> {
        let mut tx = self.begin_write().await?;
        let interfaces = NetworkInterfaceRepo::list_by_computer(&mut *tx, id).await?;
        for iface in &interfaces {
            delete_in_tx(&mut tx, iface).await?;
        }
        ComputerRepo::delete(&mut tx, id).await?;
        tx.commit().await.context("Failed to commit computer deletion")?;

        tracing::info!("Deleted computer {} and {} interface(s)", id, interfaces.len());
        Ok(())
    }

    // ========== Usage Audit ==========

    /// Compare every stored in_use flag with whether an active interface claims
    /// the address. With `repair`, drifted rows are rewritten in one transaction.
    pub async fn audit_ip_usage(&self, repair: bool) -> Result<UsageReport> {
        let mut tx = self.begin_write().await?;
        let rows = IpAddressRepo::usage_snapshot(&mut tx).await?;

        let drifted: Vec<UsageChange> = rows
            .iter()
            .filter(|row| row.in_use != row.claimed)
            .map(|row| UsageChange {
                address: row.address.clone(),
                in_use: row.claimed,
            })
            .collect();

        for change in &drifted {
            tracing::warn!("IP address {} has in_use={}, expected {}", change.address, !change.in_use, change.in_use);
            if repair {
                IpAddressRepo::set_in_use(&mut tx, &change.address, change.in_use).await?;
            }
        }
        tx.commit().await.context("Failed to commit usage audit")?;

        Ok(UsageReport {
            checked: rows.len(),
            repaired: repair && !drifted.is_empty(),
            drifted,
        })
    }
}
