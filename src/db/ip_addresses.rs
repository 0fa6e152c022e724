use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, Pool, Row, Sqlite, SqliteConnection};
use std::net::IpAddr;

use crate::models::*;
use crate::utils;
use super::row_helpers::map_ip_address_row;
use super::{NotFoundError, ValidationError};

const SELECT_IP_ADDRESS: &str = r#"
    SELECT address, hostname, aliases, in_use, active, created_at, updated_at
    FROM ip_addresses
"#;

/// Stored flag of one address next to the claims of other interfaces
pub(crate) struct UsageState {
    pub in_use: bool,
    pub claimed_elsewhere: bool,
}

/// One row of the audit snapshot
pub(crate) struct UsageRow {
    pub address: String,
    pub in_use: bool,
    pub claimed: bool,
}

/// Validated descriptive fields of an address
struct AddressFields {
    address: String,
    hostname: String,
    aliases: String,
}

/// IP address database operations
pub struct IpAddressRepo;

impl IpAddressRepo {
    /// Canonical form of an address literal, or a ValidationError
    pub fn normalize(address: &str) -> Result<String> {
        utils::normalize_ip_address(address).map_err(|e| ValidationError::new(e).into())
    }

    fn validate_names(hostname: &str, aliases: Option<&str>) -> Result<(String, String)> {
        let hostname = hostname.trim();
        if !utils::is_valid_hostname(hostname) {
            return Err(ValidationError::new(format!(
                "Hostname must be 1 to {} characters",
                utils::MAX_HOSTNAME_LEN
            ))
            .into());
        }
        let aliases = utils::normalize_aliases(aliases).map_err(ValidationError::new)?;
        Ok((hostname.to_string(), aliases))
    }

    fn validate(req: &CreateIpAddressRequest) -> Result<AddressFields> {
        let address = Self::normalize(&req.address)?;
        let (hostname, aliases) = Self::validate_names(&req.hostname, req.aliases.as_deref())?;
        Ok(AddressFields { address, hostname, aliases })
    }

    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<IpAddress>> {
        let rows = sqlx::query(SELECT_IP_ADDRESS).fetch_all(pool).await?;
        let mut addresses: Vec<IpAddress> = rows.iter().map(map_ip_address_row).collect();
        sort_numerically(&mut addresses);
        Ok(addresses)
    }

    /// Active addresses not in use, plus `held` (the caller's current address)
    pub async fn list_available(pool: &Pool<Sqlite>, held: Option<&str>) -> Result<Vec<IpAddress>> {
        let rows = sqlx::query(&format!(
            "{} WHERE active = 1 AND (in_use = 0 OR address = ?)",
            SELECT_IP_ADDRESS
        ))
        .bind(held)
        .fetch_all(pool)
        .await?;
        let mut addresses: Vec<IpAddress> = rows.iter().map(map_ip_address_row).collect();
        sort_numerically(&mut addresses);
        Ok(addresses)
    }

    pub async fn get<'e, E>(executor: E, address: &str) -> Result<Option<IpAddress>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(&format!("{} WHERE address = ?", SELECT_IP_ADDRESS))
            .bind(address)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_ip_address_row))
    }

    async fn insert<'e, E>(executor: E, fields: &AddressFields) -> Result<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO ip_addresses (address, hostname, aliases, in_use, active, created_at, updated_at)
               VALUES (?, ?, ?, 0, 1, ?, ?)"#,
        )
        .bind(&fields.address)
        .bind(&fields.hostname)
        .bind(&fields.aliases)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await
        .with_context(|| format!("Failed to insert IP address {}", fields.address))?;
        Ok(())
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &CreateIpAddressRequest) -> Result<IpAddress> {
        let fields = Self::validate(req)?;
        if Self::get(pool, &fields.address).await?.is_some() {
            return Err(ValidationError::new(format!(
                "IP address {} already exists",
                fields.address
            ))
            .into());
        }

        Self::insert(pool, &fields).await?;
        tracing::debug!("Registered IP address {}", fields.address);

        Self::get(pool, &fields.address)
            .await?
            .context("IP address not found after creation")
    }

    pub async fn upsert(conn: &mut SqliteConnection, req: &CreateIpAddressRequest) -> Result<(IpAddress, bool)> {
        let fields = Self::validate(req)?;
        let created = if Self::get(&mut *conn, &fields.address).await?.is_some() {
            sqlx::query("UPDATE ip_addresses SET hostname = ?, aliases = ?, updated_at = ? WHERE address = ?")
                .bind(&fields.hostname)
                .bind(&fields.aliases)
                .bind(Utc::now())
                .bind(&fields.address)
                .execute(&mut *conn)
                .await?;
            false
        } else {
            Self::insert(&mut *conn, &fields).await?;
            true
        };

        let ip = Self::get(&mut *conn, &fields.address)
            .await?
            .context("IP address not found after upsert")?;
        Ok((ip, created))
    }

    /// Update descriptive fields. Never touches in_use.
    pub async fn update(pool: &Pool<Sqlite>, address: &str, req: &UpdateIpAddressRequest) -> Result<IpAddress> {
        let address = Self::normalize(address)?;
        let (hostname, aliases) = Self::validate_names(&req.hostname, req.aliases.as_deref())?;
        let result = sqlx::query(
            "UPDATE ip_addresses SET hostname = ?, aliases = ?, active = ?, updated_at = ? WHERE address = ?",
        )
        .bind(&hostname)
        .bind(&aliases)
        .bind(req.active)
        .bind(Utc::now())
        .bind(&address)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("IP Address", &address).into());
        }

        Self::get(pool, &address)
            .await?
            .context("IP address not found after update")
    }

    pub async fn set_active(pool: &Pool<Sqlite>, address: &str, active: bool) -> Result<IpAddress> {
        let address = Self::normalize(address)?;
        let result = sqlx::query("UPDATE ip_addresses SET active = ?, updated_at = ? WHERE address = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(&address)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("IP Address", &address).into());
        }

        Self::get(pool, &address)
            .await?
            .context("IP address not found after update")
    }

    /// Physically remove an address; interfaces referencing it are set to NULL by the schema
    pub async fn delete(pool: &Pool<Sqlite>, address: &str) -> Result<()> {
        let address = Self::normalize(address)?;
        let result = sqlx::query("DELETE FROM ip_addresses WHERE address = ?")
            .bind(&address)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("IP Address", &address).into());
        }
        Ok(())
    }

    // ========== Usage tracking ==========

    /// Stored in_use flag and whether an active interface other than `exclude_interface` claims the address
    pub(crate) async fn usage_state(
        conn: &mut SqliteConnection,
        address: &str,
        exclude_interface: Option<i64>,
    ) -> Result<Option<UsageState>> {
        let row = sqlx::query(
            r#"
            SELECT ip.in_use,
                   EXISTS(SELECT 1 FROM network_interfaces ni
                          WHERE ni.ip_address = ip.address
                            AND ni.active = 1
                            AND (? IS NULL OR ni.id != ?)) AS claimed_elsewhere
            FROM ip_addresses ip
            WHERE ip.address = ?
            "#,
        )
        .bind(exclude_interface)
        .bind(exclude_interface)
        .bind(address)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| UsageState {
            in_use: r.get("in_use"),
            claimed_elsewhere: r.get::<i64, _>("claimed_elsewhere") != 0,
        }))
    }

    pub(crate) async fn set_in_use(conn: &mut SqliteConnection, address: &str, in_use: bool) -> Result<()> {
        let result = sqlx::query("UPDATE ip_addresses SET in_use = ?, updated_at = ? WHERE address = ?")
            .bind(in_use)
            .bind(Utc::now())
            .bind(address)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to persist in_use for {}", address))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("IP Address", address).into());
        }
        Ok(())
    }

    /// Every address with its stored flag and whether any active interface claims it
    pub(crate) async fn usage_snapshot(conn: &mut SqliteConnection) -> Result<Vec<UsageRow>> {
        let rows = sqlx::query(
            r#"
            SELECT ip.address, ip.in_use,
                   EXISTS(SELECT 1 FROM network_interfaces ni
                          WHERE ni.ip_address = ip.address AND ni.active = 1) AS claimed
            FROM ip_addresses ip
            ORDER BY ip.address
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .iter()
            .map(|r| UsageRow {
                address: r.get("address"),
                in_use: r.get("in_use"),
                claimed: r.get::<i64, _>("claimed") != 0,
            })
            .collect())
    }
}

/// Order by numeric address value (IPv4 before IPv6) instead of text
fn sort_numerically(addresses: &mut [IpAddress]) {
    addresses.sort_by_key(|ip| ip.address.parse::<IpAddr>().ok());
}
