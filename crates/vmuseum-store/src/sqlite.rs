//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.
//!
//! SQLite has no row-level `SELECT ... FOR UPDATE`. Transactions are opened
//! with `BEGIN IMMEDIATE`, which takes the database write lock up front, so a
//! second checkout blocks (up to the busy timeout) before its locking read and
//! then sees the first checkout's committed stock.

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use vmuseum_core::{
    Artifact, ArtifactId, ArtifactStock, Money, MuseumId, NewArtifact, NewPurchase, PurchaseId,
    PurchaseRecord, Quantity, UserId,
};

use crate::config::SqliteConfig;
use crate::error::{Result, StoreError};
use crate::migration;
use crate::now_millis;
use crate::traits::{ArtifactQuery, InventoryRepository, PurchaseLedger, RemoveOutcome, Store, StoreTx};

/// SQLite-based store implementation.
///
/// File databases hand each operation its own connection, so transactions
/// from concurrent requests contend in SQLite's lock rather than in this
/// process. In-memory databases share a single connection. Clones share the
/// same database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<Pool>,
}

enum Source {
    File {
        path: PathBuf,
        idle: Mutex<Vec<Connection>>,
    },
    Shared(Mutex<Connection>),
}

struct Pool {
    source: Source,
    config: SqliteConfig,
}

enum PooledConn<'a> {
    Owned {
        conn: Option<Connection>,
        idle: &'a Mutex<Vec<Connection>>,
        max_idle: usize,
    },
    Shared(MutexGuard<'a, Connection>),
}

impl Pool {
    fn acquire(&self) -> Result<PooledConn<'_>> {
        match &self.source {
            Source::File { path, idle } => {
                let reused = idle.lock().map_err(|_| StoreError::Poisoned)?.pop();
                let conn = match reused {
                    Some(conn) => conn,
                    None => open_connection(path, &self.config)?,
                };
                Ok(PooledConn::Owned {
                    conn: Some(conn),
                    idle,
                    max_idle: self.config.max_idle_connections,
                })
            }
            Source::Shared(conn) => Ok(PooledConn::Shared(
                conn.lock().map_err(|_| StoreError::Poisoned)?,
            )),
        }
    }
}

impl Deref for PooledConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            // `conn` is only taken in `drop`.
            PooledConn::Owned { conn: Some(conn), .. } => conn,
            PooledConn::Owned { conn: None, .. } => unreachable!("connection used after release"),
            PooledConn::Shared(guard) => &**guard,
        }
    }
}

impl DerefMut for PooledConn<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match self {
            PooledConn::Owned { conn: Some(conn), .. } => conn,
            PooledConn::Owned { conn: None, .. } => unreachable!("connection used after release"),
            PooledConn::Shared(guard) => &mut **guard,
        }
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let PooledConn::Owned { conn, idle, max_idle } = self {
            if let (Some(conn), Ok(mut idle)) = (conn.take(), idle.lock()) {
                // A connection is only pooled once it is back in autocommit mode.
                if conn.is_autocommit() && idle.len() < *max_idle {
                    idle.push(conn);
                }
            }
        }
    }
}

fn configure(conn: &Connection, config: &SqliteConfig) -> Result<()> {
    conn.busy_timeout(config.busy_timeout_duration())?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn open_connection(path: &Path, config: &SqliteConfig) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, config)?;
    Ok(conn)
}

impl SqliteStore {
    /// Open a SQLite database at the given path with default settings.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(SqliteConfig::file(path.as_ref()))
    }

    /// Open a database described by `config`.
    ///
    /// A config without a path opens a private in-memory database.
    pub fn open_with(config: SqliteConfig) -> Result<Self> {
        let Some(path) = config.path.clone() else {
            return Self::memory_with(config);
        };

        let mut conn = open_connection(&path, &config)?;
        if config.wal {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!(journal_mode = %mode, "journal mode set");
        }
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");

        Ok(Self {
            pool: Arc::new(Pool {
                source: Source::File {
                    path,
                    idle: Mutex::new(vec![conn]),
                },
                config,
            }),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing. All operations share one connection, so
    /// transactions run one at a time.
    pub fn open_memory() -> Result<Self> {
        Self::memory_with(SqliteConfig::default())
    }

    fn memory_with(config: SqliteConfig) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure(&conn, &config)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            pool: Arc::new(Pool {
                source: Source::Shared(Mutex::new(conn)),
                config,
            }),
        })
    }

    /// Path of the database file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.pool.source {
            Source::File { path, .. } => Some(path),
            Source::Shared(_) => None,
        }
    }

    /// Execute a blocking operation on a pooled connection.
    async fn blocking<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Connection) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.acquire().map_err(E::from)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| E::from(StoreError::Task(e.to_string())))?
    }
}

/// Transaction handle handed to `with_transaction` closures.
struct SqliteTx<'c> {
    conn: &'c Connection,
}

impl InventoryRepository for SqliteTx<'_> {
    fn lock_and_fetch(&mut self, ids: &BTreeSet<ArtifactId>) -> Result<Vec<ArtifactStock>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // One statement over the whole id set; values are bound, only the
        // placeholder list is generated.
        let sql = format!(
            "SELECT artifact_id, title, price_cents, stock FROM artifacts
             WHERE artifact_id IN ({})
             ORDER BY artifact_id",
            placeholders(ids.len())
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter().map(ArtifactId::get)), |row| {
                Ok(ArtifactStock {
                    artifact_id: ArtifactId(row.get("artifact_id")?),
                    title: row.get("title")?,
                    price: money_column(row, "price_cents")?,
                    stock: row.get("stock")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn decrement_stock(&mut self, artifact_id: ArtifactId, qty: Quantity) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE artifacts SET stock = stock - ?1 WHERE artifact_id = ?2",
            params![qty.get(), artifact_id.get()],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(artifact_id));
        }
        Ok(())
    }
}

impl PurchaseLedger for SqliteTx<'_> {
    fn record(&mut self, purchase: &NewPurchase) -> Result<PurchaseRecord> {
        let purchased_at = now_millis();

        self.conn.execute(
            "INSERT INTO purchases (
                customer_id, artifact_id, quantity, total_cents, payment_method, purchased_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                purchase.customer_id.0,
                purchase.artifact_id.get(),
                purchase.quantity.get(),
                purchase.total_amount.cents(),
                purchase.payment_method.as_str(),
                purchased_at,
            ],
        )?;

        let purchase_id = PurchaseId(self.conn.last_insert_rowid());
        Ok(PurchaseRecord::from_new(purchase_id, purchase, purchased_at))
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn conversion_error<E>(column: &str, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(0, ty, format!("{}: {}", column, err).into())
}

fn money_column(row: &rusqlite::Row<'_>, column: &str) -> rusqlite::Result<Money> {
    let cents: i64 = row.get(column)?;
    Money::from_cents(cents).map_err(|e| conversion_error(column, Type::Integer, e))
}

fn row_to_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        artifact_id: ArtifactId(row.get("artifact_id")?),
        artist_id: row.get::<_, Option<i64>>("artist_id")?.map(UserId),
        museum_id: row.get::<_, Option<i64>>("museum_id")?.map(MuseumId),
        title: row.get("title")?,
        description: row.get("description")?,
        kind: row.get("kind")?,
        price: money_column(row, "price_cents")?,
        stock: row.get("stock")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_purchase(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseRecord> {
    let quantity: u32 = row.get("quantity")?;
    let method: String = row.get("payment_method")?;

    Ok(PurchaseRecord {
        purchase_id: PurchaseId(row.get("purchase_id")?),
        customer_id: UserId(row.get("customer_id")?),
        artifact_id: ArtifactId(row.get("artifact_id")?),
        quantity: Quantity::new(quantity).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Integer,
                "quantity: zero quantity in ledger".into(),
            )
        })?,
        total_amount: money_column(row, "total_cents")?,
        payment_method: method
            .parse()
            .map_err(|e| conversion_error("payment_method", Type::Text, e))?,
        purchased_at: row.get("purchased_at")?,
    })
}

const ARTIFACT_COLUMNS: &str =
    "artifact_id, artist_id, museum_id, title, description, kind, price_cents, stock, created_at";

const PURCHASE_COLUMNS: &str =
    "purchase_id, customer_id, artifact_id, quantity, total_cents, payment_method, purchased_at";

#[async_trait]
impl Store for SqliteStore {
    async fn with_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        self.blocking(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| E::from(StoreError::from(e)))?;
            tracing::debug!("transaction opened");

            let outcome = {
                let mut handle = SqliteTx { conn: &tx };
                f(&mut handle)
            };

            match outcome {
                Ok(value) => {
                    tx.commit().map_err(|e| {
                        tracing::warn!(error = %e, "commit failed");
                        E::from(StoreError::from(e))
                    })?;
                    tracing::debug!("transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    if let Err(e) = tx.rollback() {
                        tracing::warn!(error = %e, "rollback failed");
                    } else {
                        tracing::debug!("transaction rolled back");
                    }
                    Err(err)
                }
            }
        })
        .await
    }

    async fn insert_artifact(&self, artifact: &NewArtifact) -> Result<Artifact> {
        let artifact = artifact.clone();

        self.blocking(move |conn| {
            let created_at = now_millis();
            conn.execute(
                "INSERT INTO artifacts (
                    artist_id, museum_id, title, description, kind, price_cents, stock,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    artifact.artist_id.map(|a| a.0),
                    artifact.museum_id.map(|m| m.0),
                    artifact.title,
                    artifact.description,
                    artifact.kind,
                    artifact.price.cents(),
                    artifact.stock,
                    created_at,
                ],
            )?;

            Ok(Artifact {
                artifact_id: ArtifactId(conn.last_insert_rowid()),
                artist_id: artifact.artist_id,
                museum_id: artifact.museum_id,
                title: artifact.title,
                description: artifact.description,
                kind: artifact.kind,
                price: artifact.price,
                stock: artifact.stock,
                created_at,
            })
        })
        .await
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Option<Artifact>> {
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM artifacts WHERE artifact_id = ?1", ARTIFACT_COLUMNS),
                params![id.get()],
                row_to_artifact,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn fetch_artifacts(&self, ids: &BTreeSet<ArtifactId>) -> Result<Vec<Artifact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.clone();

        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {} FROM artifacts WHERE artifact_id IN ({}) ORDER BY artifact_id",
                ARTIFACT_COLUMNS,
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let artifacts = stmt
                .query_map(params_from_iter(ids.iter().map(ArtifactId::get)), row_to_artifact)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(artifacts)
        })
        .await
    }

    async fn list_artifacts(&self, query: &ArtifactQuery) -> Result<Vec<Artifact>> {
        let query = query.clone();

        self.blocking(move |conn| {
            let search = query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| format!("%{}%", escape_like(s)));
            let kind = query.kind.filter(|k| !k.is_empty());

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM artifacts
                 WHERE (?1 = 0 OR stock > 0)
                   AND (?2 IS NULL OR artist_id = ?2)
                   AND (?3 IS NULL OR kind = ?3)
                   AND (?4 IS NULL OR title LIKE ?4 ESCAPE '\\')
                 ORDER BY created_at DESC, artifact_id DESC",
                ARTIFACT_COLUMNS
            ))?;

            let artifacts = stmt
                .query_map(
                    params![
                        query.in_stock_only,
                        query.artist_id.map(|a| a.0),
                        kind,
                        search,
                    ],
                    row_to_artifact,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(artifacts)
        })
        .await
    }

    async fn list_kinds(&self) -> Result<Vec<String>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT kind FROM artifacts ORDER BY kind")?;
            let kinds = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(kinds)
        })
        .await
    }

    async fn remove_artifact(&self, id: ArtifactId) -> Result<RemoveOutcome> {
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: Option<i64> = tx
                .query_row(
                    "SELECT artifact_id FROM artifacts WHERE artifact_id = ?1",
                    params![id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(RemoveOutcome::NotFound);
            }

            let outcome = match tx.execute("DELETE FROM artifacts WHERE artifact_id = ?1", params![id.get()]) {
                Ok(_) => RemoveOutcome::Deleted,
                Err(e) => match StoreError::from(e) {
                    // Purchases still reference it.
                    StoreError::Constraint(_) => {
                        tx.execute(
                            "UPDATE artifacts SET stock = 0 WHERE artifact_id = ?1",
                            params![id.get()],
                        )?;
                        RemoveOutcome::Archived
                    }
                    other => return Err(other),
                },
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn purchases_by_customer(&self, customer_id: UserId) -> Result<Vec<PurchaseRecord>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM purchases WHERE customer_id = ?1
                 ORDER BY purchased_at DESC, purchase_id DESC",
                PURCHASE_COLUMNS
            ))?;
            let purchases = stmt
                .query_map(params![customer_id.0], row_to_purchase)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(purchases)
        })
        .await
    }

    async fn recent_purchases(&self, limit: usize) -> Result<Vec<PurchaseRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM purchases ORDER BY purchased_at DESC, purchase_id DESC LIMIT ?1",
                PURCHASE_COLUMNS
            ))?;
            let purchases = stmt
                .query_map(params![limit], row_to_purchase)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(purchases)
        })
        .await
    }
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
