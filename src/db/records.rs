use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};

use crate::models::*;
use crate::utils;
use super::row_helpers::{
    map_client_identifier_row, map_licence_row, map_status_key_row, map_status_row, map_work_note_row,
};
use super::{ComputerRepo, NotFoundError, ValidationError};

pub const MAX_CLIENT_ID_LEN: usize = 128;
pub const MAX_STATUS_KEY_LEN: usize = 64;

const SELECT_STATUS: &str = r#"
    SELECT s.id, s.computer_id, s.value, s.created_at, k.slug AS key_slug, k.data_type
    FROM statuses s
    JOIN status_keys k ON s.key_id = k.id
"#;

async fn ensure_computer(conn: &mut SqliteConnection, computer_id: i64) -> Result<()> {
    if !ComputerRepo::exists(conn, computer_id).await? {
        return Err(NotFoundError::new("Computer", &computer_id.to_string()).into());
    }
    Ok(())
}

fn require_value(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{} value is required", what)).into());
    }
    Ok(())
}

/// Work note database operations
pub struct WorkNoteRepo;

impl WorkNoteRepo {
    /// Newest first
    pub async fn list_for_computer(pool: &Pool<Sqlite>, computer_id: i64) -> Result<Vec<WorkNote>> {
        let rows = sqlx::query("SELECT * FROM work_notes WHERE computer_id = ? ORDER BY id DESC")
            .bind(computer_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_work_note_row).collect())
    }

    pub async fn list_unattached(pool: &Pool<Sqlite>) -> Result<Vec<WorkNote>> {
        let rows = sqlx::query("SELECT * FROM work_notes WHERE computer_id IS NULL ORDER BY id DESC")
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_work_note_row).collect())
    }

    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Option<WorkNote>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM work_notes WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_work_note_row))
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateWorkNoteRequest) -> Result<WorkNote> {
        require_value(&req.value, "Work note")?;
        if let Some(computer_id) = req.computer_id {
            ensure_computer(conn, computer_id).await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO work_notes (computer_id, value, author, active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(req.computer_id)
        .bind(&req.value)
        .bind(req.author.as_deref().map(str::trim).unwrap_or(""))
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert work note")?;

        Self::get(&mut *conn, result.last_insert_rowid())
            .await?
            .context("Work note not found after creation")
    }

    pub async fn set_active(pool: &Pool<Sqlite>, id: i64, active: bool) -> Result<WorkNote> {
        let result = sqlx::query("UPDATE work_notes SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Work Note", &id.to_string()).into());
        }
        Self::get(pool, id).await?.context("Work note not found after update")
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM work_notes WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Work Note", &id.to_string()).into());
        }
        Ok(())
    }
}

/// Licence database operations
pub struct LicenceRepo;

impl LicenceRepo {
    pub async fn list_for_computer(pool: &Pool<Sqlite>, computer_id: i64) -> Result<Vec<Licence>> {
        let rows = sqlx::query("SELECT * FROM licences WHERE computer_id = ? ORDER BY id")
            .bind(computer_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_licence_row).collect())
    }

    pub async fn list_unattached(pool: &Pool<Sqlite>) -> Result<Vec<Licence>> {
        let rows = sqlx::query("SELECT * FROM licences WHERE computer_id IS NULL ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_licence_row).collect())
    }

    pub async fn create(conn: &mut SqliteConnection, req: &CreateLicenceRequest) -> Result<Licence> {
        require_value(&req.value, "Licence")?;
        if let Some(computer_id) = req.computer_id {
            ensure_computer(conn, computer_id).await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO licences (computer_id, value, active, created_at, updated_at) VALUES (?, ?, 1, ?, ?)",
        )
        .bind(req.computer_id)
        .bind(&req.value)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert licence")?;

        let row = sqlx::query("SELECT * FROM licences WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(map_licence_row(&row))
    }

    /// Move a licence to another computer, or detach it with None
    pub async fn reassign(conn: &mut SqliteConnection, id: i64, computer_id: Option<i64>) -> Result<Licence> {
        if let Some(computer_id) = computer_id {
            ensure_computer(conn, computer_id).await?;
        }
        let row = sqlx::query("UPDATE licences SET computer_id = ?, updated_at = ? WHERE id = ? RETURNING *")
            .bind(computer_id)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref()
            .map(map_licence_row)
            .ok_or_else(|| NotFoundError::new("Licence", &id.to_string()).into())
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM licences WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Licence", &id.to_string()).into());
        }
        Ok(())
    }
}

/// Client identifier database operations
pub struct ClientIdentifierRepo;

impl ClientIdentifierRepo {
    pub async fn list_for_computer(pool: &Pool<Sqlite>, computer_id: i64) -> Result<Vec<ClientIdentifier>> {
        let rows = sqlx::query("SELECT * FROM client_identifiers WHERE computer_id = ? ORDER BY key")
            .bind(computer_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_client_identifier_row).collect())
    }

    /// Set the computer's value for `key`, replacing any previous one
    pub async fn set(conn: &mut SqliteConnection, computer_id: i64, key: &str, value: &str) -> Result<ClientIdentifier> {
        if key.is_empty() || !utils::is_valid_slug(key) {
            return Err(ValidationError::new(format!("Invalid client identifier key: {:?}", key)).into());
        }
        let value = value.trim();
        if value.is_empty() || value.chars().count() > MAX_CLIENT_ID_LEN {
            return Err(ValidationError::new(format!(
                "Client identifier value must be 1 to {} characters",
                MAX_CLIENT_ID_LEN
            ))
            .into());
        }
        ensure_computer(conn, computer_id).await?;

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO client_identifiers (computer_id, key, value, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (computer_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(computer_id)
        .bind(key)
        .bind(value)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to save client identifier")?;
        Ok(map_client_identifier_row(&row))
    }

    pub async fn delete(pool: &Pool<Sqlite>, computer_id: i64, key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM client_identifiers WHERE computer_id = ? AND key = ?")
            .bind(computer_id)
            .bind(key)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Client Identifier", &format!("{}:{}", computer_id, key)).into());
        }
        Ok(())
    }
}

/// Status key database operations
pub struct StatusKeyRepo;

impl StatusKeyRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<StatusKey>> {
        let rows = sqlx::query("SELECT * FROM status_keys ORDER BY verbose_name, id")
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_status_key_row).collect())
    }

    pub async fn get_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<StatusKey>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT * FROM status_keys WHERE slug = ?")
            .bind(slug)
            .fetch_optional(executor)
            .await?;
        Ok(row.as_ref().map(map_status_key_row))
    }

    pub async fn create(pool: &Pool<Sqlite>, req: &CreateStatusKeyRequest) -> Result<StatusKey> {
        let verbose_name = req.verbose_name.trim();
        if req.slug.is_empty()
            || req.slug.len() > MAX_STATUS_KEY_LEN
            || !utils::is_valid_slug(&req.slug)
            || verbose_name.is_empty()
            || verbose_name.chars().count() > MAX_STATUS_KEY_LEN
        {
            return Err(ValidationError::new(format!(
                "slug and verbose_name must be 1 to {} characters and the slug valid",
                MAX_STATUS_KEY_LEN
            ))
            .into());
        }
        if Self::get_by_slug(pool, &req.slug).await?.is_some() {
            return Err(ValidationError::new(format!("Status key {} already exists", req.slug)).into());
        }

        sqlx::query(
            r#"
            INSERT INTO status_keys (slug, verbose_name, volatile, data_type, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.slug)
        .bind(verbose_name)
        .bind(req.volatile)
        .bind(req.data_type.as_code())
        .bind(req.active)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to insert status key")?;

        Self::get_by_slug(pool, &req.slug)
            .await?
            .context("Status key not found after creation")
    }

    pub async fn set_active(pool: &Pool<Sqlite>, slug: &str, active: bool) -> Result<StatusKey> {
        let result = sqlx::query("UPDATE status_keys SET active = ? WHERE slug = ?")
            .bind(active)
            .bind(slug)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::new("Status Key", slug).into());
        }
        Self::get_by_slug(pool, slug)
            .await?
            .context("Status key not found after update")
    }
}

/// Status report database operations
pub struct StatusRepo;

impl StatusRepo {
    /// Record a value for the computer under an active key
    pub async fn record(conn: &mut SqliteConnection, computer_id: i64, slug: &str, value: &str) -> Result<Status> {
        ensure_computer(conn, computer_id).await?;
        let key = StatusKeyRepo::get_by_slug(&mut *conn, slug)
            .await?
            .ok_or_else(|| NotFoundError::new("Status Key", slug))?;
        if !key.active {
            return Err(ValidationError::new(format!("Status key {} is not active", slug)).into());
        }

        let result = sqlx::query("INSERT INTO statuses (computer_id, key_id, value, created_at) VALUES (?, ?, ?, ?)")
            .bind(computer_id)
            .bind(key.id)
            .bind(value)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("Failed to insert status")?;

        let row = sqlx::query(&format!("{} WHERE s.id = ?", SELECT_STATUS))
            .bind(result.last_insert_rowid())
            .fetch_one(&mut *conn)
            .await?;
        Ok(map_status_row(&row))
    }

    /// Every value reported by the computer, newest first
    pub async fn list_for_computer(pool: &Pool<Sqlite>, computer_id: i64) -> Result<Vec<Status>> {
        let rows = sqlx::query(&format!("{} WHERE s.computer_id = ? ORDER BY s.id DESC", SELECT_STATUS))
            .bind(computer_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(map_status_row).collect())
    }

    /// Newest value per key for the computer, restricted to `slugs` unless empty
    pub async fn latest_by_key(pool: &Pool<Sqlite>, computer_id: i64, slugs: &[String]) -> Result<Vec<Status>> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE s.computer_id = ?
              AND s.id = (SELECT MAX(id) FROM statuses
                          WHERE computer_id = s.computer_id AND key_id = s.key_id)
            ORDER BY k.verbose_name, k.id"#,
            SELECT_STATUS
        ))
        .bind(computer_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .iter()
            .map(map_status_row)
            .filter(|s| slugs.is_empty() || slugs.contains(&s.key))
            .collect())
    }
}
