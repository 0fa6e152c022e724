use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, Pool, Row, Sqlite, SqliteConnection};

use crate::models::*;
use crate::utils;
use super::row_helpers::{map_computer_flag_row, map_computer_key_row, map_computer_row};
use super::{NotFoundError, ValidationError};

const SELECT_COMPUTER: &str = r#"
    SELECT c.*,
           (SELECT GROUP_CONCAT(f.slug, ',')
              FROM computer_flag_links l
              JOIN computer_flags f ON l.flag_id = f.id
             WHERE l.computer_id = c.id) AS flag_slugs_csv
    FROM computers c
"#;

/// Escape LIKE wildcards and wrap the term for a substring match
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn validate_computer(req: &CreateComputerRequest) -> Result<()> {
    if req.common_name.trim().is_empty() || req.hardware.trim().is_empty() {
        return Err(ValidationError::new("common_name and hardware are required").into());
    }
    if !utils::is_valid_slug(&req.host_id) {
        return Err(ValidationError::new(format!("Invalid host_id slug: {:?}", req.host_id)).into());
    }
    Ok(())
}

/// Computer database operations
pub struct ComputerRepo;

impl ComputerRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Computer>> {
        let rows = sqlx::query(&format!("{} ORDER BY c.common_name, c.id", SELECT_COMPUTER))
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_computer_row).collect())
    }

    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Option<Computer>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", SELECT_COMPUTER))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_computer_row))
    }

    pub async fn exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM computers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    pub async fn search(pool: &Pool<Sqlite>, term: &str) -> Result<Vec<Computer>> {
        let term = term.trim();
        if term.is_empty() {
            return Self::list(pool).await;
        }
        let pattern = like_pattern(term);
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE c.common_name LIKE ?1 ESCAPE '\'
               OR c.hardware LIKE ?1 ESCAPE '\'
               OR EXISTS (SELECT 1 FROM network_interfaces ni
                          LEFT JOIN ip_addresses ip ON ni.ip_address = ip.address
                          WHERE ni.computer_id = c.id
                            AND (ni.mac_address LIKE ?1 ESCAPE '\'
                                 OR ni.ip_address LIKE ?1 ESCAPE '\'
                                 OR ip.hostname LIKE ?1 ESCAPE '\'
                                 OR ip.aliases LIKE ?1 ESCAPE '\'))
            ORDER BY c.common_name, c.id"#,
            SELECT_COMPUTER
        ))
        .bind(&pattern)
        .fetch_all(pool)
        .await?;
        Ok(rows.iter().map(map_computer_row).collect())
    }

    pub async fn insert(conn: &mut SqliteConnection, req: &CreateComputerRequest) -> Result<i64> {
        validate_computer(req)?;
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO computers (common_name, hardware, host_id, operating_system, processor, ram,
                                   harddrive, manufacturing_year, admin_user, admin_password, ssh_port,
                                   asset_id, notes, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.common_name.trim())
        .bind(req.hardware.trim())
        .bind(&req.host_id)
        .bind(req.operating_system.as_deref().unwrap_or(""))
        .bind(req.processor.as_deref().unwrap_or(""))
        .bind(req.ram.as_deref().unwrap_or(""))
        .bind(req.harddrive.as_deref().unwrap_or(""))
        .bind(req.manufacturing_year)
        .bind(req.admin_user.as_deref().unwrap_or(""))
        .bind(req.admin_password.as_deref().unwrap_or(""))
        .bind(req.ssh_port)
        .bind(req.asset_id)
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.active)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert computer")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(pool: &Pool<Sqlite>, id: i64, req: &CreateComputerRequest) -> Result<Computer> {
        validate_computer(req)?;
        let result = sqlx::query(
            r#"
            UPDATE computers SET common_name = ?, hardware = ?, host_id = ?, operating_system = ?,
                                 processor = ?, ram = ?, harddrive = ?, manufacturing_year = ?,
                                 admin_user = ?, admin_password = ?, ssh_port = ?, asset_id = ?,
                                 notes = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.common_name.trim())
        .bind(req.hardware.trim())
        .bind(&req.host_id)
        .bind(req.operating_system.as_deref().unwrap_or(""))
        .bind(req.processor.as_deref().unwrap_or(""))
        .bind(req.ram.as_deref().unwrap_or(""))
        .bind(req.harddrive.as_deref().unwrap_or(""))
        .bind(req.manufacturing_year)
        .bind(req.admin_user.as_deref().unwrap_or(""))
        .bind(req.admin_password.as_deref().unwrap_or(""))
        .bind(req.ssh_port)
        .bind(req.asset_id)
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.active)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Computer", &id.to_string()).into());
        }

        Self::get(pool, id)
            .await?
            .context("Computer not found after update")
    }

    /// Delete the computer row; interfaces, flag links and key go with it via ON DELETE CASCADE
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM computers WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Computer", &id.to_string()).into());
        }
        Ok(())
    }

    pub async fn set_flags(conn: &mut SqliteConnection, id: i64, slugs: &[String]) -> Result<()> {
        let current = Self::get(&mut *conn, id)
            .await?
            .ok_or_else(|| NotFoundError::new("Computer", &id.to_string()))?
            .flags;

        let mut flags = Vec::with_capacity(slugs.len());
        for slug in slugs {
            let flag = ComputerFlagRepo::get_by_slug(&mut *conn, slug)
                .await?
                .ok_or_else(|| NotFoundError::new("Computer Flag", slug))?;
            // an inactive flag may stay where it is but is never newly assigned
            if !flag.active && !current.contains(slug) {
                return Err(ValidationError::new(format!("Computer flag {} is not active", slug)).into());
            }
            flags.push(flag);
        }

        sqlx::query("DELETE FROM computer_flag_links WHERE computer_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        for flag in flags {
            sqlx::query("INSERT OR IGNORE INTO computer_flag_links (computer_id, flag_id) VALUES (?, ?)")
                .bind(id)
                .bind(flag.id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}

/// Computer flag database operations
pub struct ComputerFlagRepo;

impl ComputerFlagRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<ComputerFlag>> {
        let rows = sqlx::query("SELECT * FROM computer_flags ORDER BY verbose_name")
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_computer_flag_row).collect())
    }

    pub async fn get_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<ComputerFlag>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM computer_flags WHERE slug = ?")
            .bind(slug)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_computer_flag_row))
    }

    pub async fn set_active(pool: &Pool<Sqlite>, slug: &str, active: bool) -> Result<ComputerFlag> {
        let result = sqlx::query("UPDATE computer_flags SET active = ? WHERE slug = ?")
            .bind(active)
            .bind(slug)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Computer Flag", slug).into());
        }

        Self::get_by_slug(pool, slug)
            .await?
            .context("Computer flag not found after update")
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &CreateComputerFlagRequest) -> Result<ComputerFlag> {
        if req.slug.is_empty() || !utils::is_valid_slug(&req.slug) || req.verbose_name.trim().is_empty() {
            return Err(ValidationError::new("a valid slug and verbose_name are required").into());
        }
        if Self::get_by_slug(pool, &req.slug).await?.is_some() {
            return Err(ValidationError::new(format!("Computer flag {} already exists", req.slug)).into());
        }

        sqlx::query("INSERT INTO computer_flags (slug, verbose_name, active, created_at) VALUES (?, ?, 1, ?)")
            .bind(&req.slug)
            .bind(req.verbose_name.trim())
            .bind(Utc::now())
            .execute(pool)
            .await?;

        Self::get_by_slug(pool, &req.slug)
            .await?
            .context("Computer flag not found after creation")
    }
}

/// Computer API key database operations
pub struct ComputerKeyRepo;

impl ComputerKeyRepo {
    pub async fn get<'e, E>(executor: E, computer_id: i64) -> Result<Option<ComputerKey>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM computer_keys WHERE computer_id = ?")
            .bind(computer_id)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_computer_key_row))
    }

    pub async fn create(conn: &mut SqliteConnection, computer_id: i64) -> Result<ComputerKey> {
        sqlx::query("INSERT INTO computer_keys (computer_id, key, created_at) VALUES (?, ?, ?)")
            .bind(computer_id)
            .bind(utils::generate_api_key())
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("Failed to issue computer key")?;

        Self::get(&mut *conn, computer_id)
            .await?
            .context("Computer key not found after creation")
    }

    /// Replace the key; computers created before keys existed get their first one
    pub async fn regenerate(pool: &Pool<Sqlite>, computer_id: i64) -> Result<ComputerKey> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM computers WHERE id = ?")
            .bind(computer_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(NotFoundError::new("Computer", &computer_id.to_string()).into());
        }

        sqlx::query(
            r#"INSERT INTO computer_keys (computer_id, key, created_at) VALUES (?, ?, ?)
               ON CONFLICT(computer_id) DO UPDATE SET key = excluded.key, created_at = excluded.created_at"#,
        )
        .bind(computer_id)
        .bind(utils::generate_api_key())
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::get(pool, computer_id)
            .await?
            .context("Computer key not found after regeneration")
    }

    pub async fn find_computer_id(pool: &Pool<Sqlite>, key: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT computer_id FROM computer_keys WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get("computer_id")))
    }
}
