mod computers;
mod interfaces;
mod ip_addresses;
pub(crate) mod row_helpers;
mod records;
mod store_network;
mod store_records;

pub(crate) use computers::{ComputerFlagRepo, ComputerKeyRepo, ComputerRepo};
pub(crate) use interfaces::NetworkInterfaceRepo;
pub(crate) use ip_addresses::IpAddressRepo;
pub(crate) use records::{ClientIdentifierRepo, LicenceRepo, StatusKeyRepo, StatusRepo, WorkNoteRepo};

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite, SqliteConnection, Transaction};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::models::*;

/// Typed error for a missing resource, recovered by downcast in ErrorKind::of
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Typed error for rejected input. Raised before any row is written.
#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Caller-facing classification of a failed store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    /// Anything else: a read or write against the database failed
    Persistence,
}

impl ErrorKind {
    pub fn of(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<NotFoundError>().is_some() {
            ErrorKind::NotFound
        } else if err.downcast_ref::<ValidationError>().is_some() {
            ErrorKind::Validation
        } else {
            ErrorKind::Persistence
        }
    }
}

/// Store handles all database operations, delegating to per-entity repo modules.
/// Writes go through one gate per store so SQLite never has to upgrade two
/// read transactions to writers at once.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
    write_gate: Arc<Mutex<()>>,
}

/// Transaction holding the store's write gate until it commits or is dropped
pub(crate) struct WriteTx<'a> {
    tx: Transaction<'static, Sqlite>,
    _gate: MutexGuard<'a, ()>,
}

impl WriteTx<'_> {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

impl Deref for WriteTx<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.tx
    }
}

impl DerefMut for WriteTx<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

impl Store {
    /// Create a new database store with configurable pool size
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database on a single connection
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Begin a transaction for a mutation, waiting for any other writer of this store
    pub(crate) async fn begin_write(&self) -> Result<WriteTx<'_>> {
        let gate = self.write_gate.lock().await;
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(WriteTx { tx, _gate: gate })
    }

    /// Hold the write gate for a single-statement write on the pool
    pub(crate) async fn write_gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== IP Address Operations ==========

    pub async fn list_ip_addresses(&self) -> Result<Vec<IpAddress>> {
        IpAddressRepo::list(&self.pool).await
    }

    /// Active addresses that are free, plus the one held by `for_interface` (if any)
    pub async fn list_available_ip_addresses(&self, for_interface: Option<i64>) -> Result<Vec<IpAddress>> {
        let held = match for_interface {
            Some(id) => NetworkInterfaceRepo::get(&self.pool, id)
                .await?
                .ok_or_else(|| NotFoundError::new("Network Interface", &id.to_string()))?
                .ip_address,
            None => None,
        };
        IpAddressRepo::list_available(&self.pool, held.as_deref()).await
    }

    pub async fn get_ip_address(&self, address: &str) -> Result<Option<IpAddress>> {
        let address = IpAddressRepo::normalize(address)?;
        IpAddressRepo::get(&self.pool, &address).await
    }

    pub async fn create_ip_address(&self, req: &CreateIpAddressRequest) -> Result<IpAddress> {
        let _gate = self.write_gate().await;
        IpAddressRepo::create(&self.pool, req).await
    }

    /// Create the address, or refresh hostname/aliases if it is already tracked.
    /// Returns the record and whether it was newly created.
    pub async fn upsert_ip_address(&self, req: &CreateIpAddressRequest) -> Result<(IpAddress, bool)> {
        let mut tx = self.begin_write().await?;
        let result = IpAddressRepo::upsert(&mut tx, req).await?;
        tx.commit().await.context("Failed to commit IP address upsert")?;
        Ok(result)
    }

    pub async fn update_ip_address(&self, address: &str, req: &UpdateIpAddressRequest) -> Result<IpAddress> {
        let _gate = self.write_gate().await;
        IpAddressRepo::update(&self.pool, address, req).await
    }

    pub async fn deactivate_ip_address(&self, address: &str) -> Result<IpAddress> {
        let _gate = self.write_gate().await;
        IpAddressRepo::set_active(&self.pool, address, false).await
    }

    pub async fn delete_ip_address(&self, address: &str) -> Result<()> {
        let _gate = self.write_gate().await;
        IpAddressRepo::delete(&self.pool, address).await
    }

    // ========== Computer Operations ==========

    pub async fn list_computers(&self) -> Result<Vec<Computer>> {
        ComputerRepo::list(&self.pool).await
    }

    pub async fn get_computer(&self, id: i64) -> Result<Option<Computer>> {
        ComputerRepo::get(&self.pool, id).await
    }

    /// Match name, hardware, and the MAC/IP/hostname/aliases of the computer's interfaces
    pub async fn search_computers(&self, term: &str) -> Result<Vec<Computer>> {
        ComputerRepo::search(&self.pool, term).await
    }

    /// Create a computer together with its API key
    pub async fn create_computer(&self, req: &CreateComputerRequest) -> Result<Computer> {
        let mut tx = self.begin_write().await?;
        let id = ComputerRepo::insert(&mut tx, req).await?;
        ComputerKeyRepo::create(&mut tx, id).await?;
        let computer = ComputerRepo::get(&mut *tx, id)
            .await?
            .context("Computer not found after creation")?;
        tx.commit().await.context("Failed to commit computer creation")?;
        tracing::info!("Created computer {} ({})", computer.common_name, computer.id);
        Ok(computer)
    }

    pub async fn update_computer(&self, id: i64, req: &CreateComputerRequest) -> Result<Computer> {
        let _gate = self.write_gate().await;
        ComputerRepo::update(&self.pool, id, req).await
    }

    /// Replace the computer's flag set with the given slugs
    pub async fn set_computer_flags(&self, id: i64, slugs: &[String]) -> Result<Computer> {
        let mut tx = self.begin_write().await?;
        ComputerRepo::set_flags(&mut tx, id, slugs).await?;
        let computer = ComputerRepo::get(&mut *tx, id)
            .await?
            .context("Computer not found after flag update")?;
        tx.commit().await.context("Failed to commit computer flags")?;
        Ok(computer)
    }

    /// Active, primary interface of the computer, if any
    pub async fn primary_interface(&self, computer_id: i64) -> Result<Option<NetworkInterface>> {
        NetworkInterfaceRepo::primary_for(&self.pool, computer_id).await
    }

    // ========== Computer Flag Operations ==========

    pub async fn list_computer_flags(&self) -> Result<Vec<ComputerFlag>> {
        ComputerFlagRepo::list(&self.pool).await
    }

    pub async fn create_computer_flag(&self, req: &CreateComputerFlagRequest) -> Result<ComputerFlag> {
        let _gate = self.write_gate().await;
        ComputerFlagRepo::create(&self.pool, req).await
    }

    /// Inactive flags stay on the computers that carry them but cannot be newly assigned
    pub async fn set_computer_flag_active(&self, slug: &str, active: bool) -> Result<ComputerFlag> {
        let _gate = self.write_gate().await;
        ComputerFlagRepo::set_active(&self.pool, slug, active).await
    }

    // ========== Computer Key Operations ==========

    pub async fn get_computer_key(&self, computer_id: i64) -> Result<Option<ComputerKey>> {
        ComputerKeyRepo::get(&self.pool, computer_id).await
    }

    pub async fn regenerate_computer_key(&self, computer_id: i64) -> Result<ComputerKey> {
        let _gate = self.write_gate().await;
        ComputerKeyRepo::regenerate(&self.pool, computer_id).await
    }

    pub async fn find_computer_by_key(&self, key: &str) -> Result<Option<Computer>> {
        match ComputerKeyRepo::find_computer_id(&self.pool, key).await? {
            Some(id) => ComputerRepo::get(&self.pool, id).await,
            None => Ok(None),
        }
    }
}
