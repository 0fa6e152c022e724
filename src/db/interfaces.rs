use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};

use crate::models::*;
use super::row_helpers::map_interface_row;
use super::NotFoundError;

const SELECT_INTERFACE: &str = r#"
    SELECT id, computer_id, name, kind, mac_address, is_primary, managed, ip_address,
           active, created_at, updated_at
    FROM network_interfaces
"#;

const INTERFACE_ORDER: &str = " ORDER BY computer_id, is_primary DESC, name, id";

/// Network interface database operations.
/// Writes here are raw row writes; usage tracking is the caller's job.
pub struct NetworkInterfaceRepo;

impl NetworkInterfaceRepo {
    pub async fn list(pool: &Pool<Sqlite>, filter: &InterfaceFilter) -> Result<Vec<NetworkInterface>> {
        let kind = filter.kind.map(|k| k.as_code());
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE (?1 IS NULL OR computer_id = ?1)
              AND (?2 IS NULL OR kind = ?2)
              AND (?3 IS NULL OR is_primary = ?3)
              AND (?4 IS NULL OR managed = ?4)
              AND (?5 IS NULL OR active = ?5){}"#,
            SELECT_INTERFACE, INTERFACE_ORDER
        ))
        .bind(filter.computer_id)
        .bind(kind)
        .bind(filter.primary)
        .bind(filter.managed)
        .bind(filter.active)
        .fetch_all(pool)
        .await?;
        Ok(rows.iter().map(map_interface_row).collect())
    }

    pub async fn list_by_computer<'e, E>(executor: E, computer_id: i64) -> Result<Vec<NetworkInterface>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query(&format!("{} WHERE computer_id = ?{}", SELECT_INTERFACE, INTERFACE_ORDER))
            .bind(computer_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.iter().map(map_interface_row).collect())
    }

    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Option<NetworkInterface>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_INTERFACE))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_interface_row))
    }

    pub async fn primary_for(pool: &Pool<Sqlite>, computer_id: i64) -> Result<Option<NetworkInterface>> {
        let row = sqlx::query(&format!(
            "{} WHERE computer_id = ? AND is_primary = 1 AND active = 1 ORDER BY id LIMIT 1",
            SELECT_INTERFACE
        ))
        .bind(computer_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.as_ref().map(map_interface_row))
    }

    /// Another interface of the computer (not `except`) flagged primary
    pub async fn other_primary(
        conn: &mut SqliteConnection,
        computer_id: i64,
        except: Option<i64>,
    ) -> Result<Option<NetworkInterface>> {
        let row = sqlx::query(&format!(
            "{} WHERE computer_id = ? AND is_primary = 1 AND (? IS NULL OR id != ?) LIMIT 1",
            SELECT_INTERFACE
        ))
        .bind(computer_id)
        .bind(except)
        .bind(except)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.as_ref().map(map_interface_row))
    }

    /// Another active interface of the computer (not `except`) with this name
    pub async fn other_active_named(
        conn: &mut SqliteConnection,
        computer_id: i64,
        name: &str,
        except: Option<i64>,
    ) -> Result<Option<NetworkInterface>> {
        let row = sqlx::query(&format!(
            "{} WHERE computer_id = ? AND name = ? AND active = 1 AND (? IS NULL OR id != ?) LIMIT 1",
            SELECT_INTERFACE
        ))
        .bind(computer_id)
        .bind(name)
        .bind(except)
        .bind(except)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.as_ref().map(map_interface_row))
    }

    pub async fn insert(conn: &mut SqliteConnection, req: &CreateNetworkInterfaceRequest) -> Result<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO network_interfaces (computer_id, name, kind, mac_address, is_primary, managed,
                                            ip_address, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.computer_id)
        .bind(&req.name)
        .bind(req.kind.as_code())
        .bind(&req.mac_address)
        .bind(req.primary)
        .bind(req.managed)
        .bind(&req.ip_address)
        .bind(req.active)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert network interface")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(conn: &mut SqliteConnection, id: i64, req: &CreateNetworkInterfaceRequest) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE network_interfaces SET computer_id = ?, name = ?, kind = ?, mac_address = ?,
                                          is_primary = ?, managed = ?, ip_address = ?, active = ?,
                                          updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.computer_id)
        .bind(&req.name)
        .bind(req.kind.as_code())
        .bind(&req.mac_address)
        .bind(req.primary)
        .bind(req.managed)
        .bind(&req.ip_address)
        .bind(req.active)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await
        .context("Failed to update network interface")?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Network Interface", &id.to_string()).into());
        }
        Ok(())
    }

    /// Write a row exactly as given, keeping its id and timestamps
    pub async fn replace_raw(conn: &mut SqliteConnection, iface: &NetworkInterface) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO network_interfaces (id, computer_id, name, kind, mac_address, is_primary,
                                                       managed, ip_address, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(iface.id)
        .bind(iface.computer_id)
        .bind(&iface.name)
        .bind(iface.kind.as_code())
        .bind(&iface.mac_address)
        .bind(iface.primary)
        .bind(iface.managed)
        .bind(&iface.ip_address)
        .bind(iface.active)
        .bind(iface.created_at)
        .bind(iface.updated_at)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to load network interface {}", iface.id))?;
        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM network_interfaces WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Network Interface", &id.to_string()).into());
        }
        Ok(())
    }
}
