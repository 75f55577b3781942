//! BelegManager store access using SQLite
//!
//! This module handles everything belegsync reads from or writes to the
//! BelegManager database:
//! - Opening the existing database file and checking its preconditions
//! - Row types for assets, belege, categories and links
//! - Per-transaction queries used by the reconciliation engine
//! - Statistics for the `check` command

mod models;
pub mod schema;

pub use models::*;
pub use schema::{PRESUPPOSED_TABLES, SUPPORTED_DATABASE_VERSION};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

macro_rules! entity_columns {
    () => {
        "id, uuid, name, docType, deleteState, docDate, timestampCreated, unread, sync, needUpSync, needDownSync, timestampLastSync"
    };
}

const SELECT_ASSETS_BY_INTERNAL_PATH: &str = concat!(
    "SELECT ",
    entity_columns!(),
    ", targetDocType, ocrState, internalPath, fileSyncState FROM BmDoc_Asset WHERE internalPath = ? ORDER BY id"
);

const SELECT_ASSET_BY_UUID: &str = concat!(
    "SELECT ",
    entity_columns!(),
    ", targetDocType, ocrState, internalPath, fileSyncState FROM BmDoc_Asset WHERE uuid = ?"
);

const INSERT_ASSET: &str = r#"
INSERT OR IGNORE INTO BmDoc_Asset
    (uuid, name, docType, deleteState, docDate, timestampCreated, sync, needUpSync, needDownSync,
     targetDocType, ocrState, internalPath, fileSyncState)
VALUES (?, ?, ?, 0, ?, ?, 1, 1, 0, 3, 0, ?, 2)
"#;

const SELECT_BELEG_BY_UUID: &str = concat!(
    "SELECT ",
    entity_columns!(),
    ", number, amount, netto, vat, comment, belegDate FROM BmDoc_Beleg WHERE uuid = ?"
);

const SELECT_BELEG_BY_ID: &str = concat!(
    "SELECT ",
    entity_columns!(),
    ", number, amount, netto, vat, comment, belegDate FROM BmDoc_Beleg WHERE id = ?"
);

const INSERT_BELEG: &str = r#"
INSERT OR IGNORE INTO BmDoc_Beleg
    (uuid, name, docType, deleteState, docDate, timestampCreated, sync, needUpSync, needDownSync,
     number, amount, netto, vat, comment, belegDate)
VALUES (?, ?, ?, 0, ?, ?, 1, 1, 0, ?, ?, 0, ?, ?, ?)
"#;

const UPDATE_BELEG: &str = r#"
UPDATE BmDoc_Beleg
SET name = ?, docDate = ?, number = ?, amount = ?, netto = 0, vat = ?, comment = ?, belegDate = ?
WHERE id = ?
"#;

const SELECT_CATEGORIES_BY_NAME: &str = concat!(
    "SELECT ",
    entity_columns!(),
    " FROM BmDoc_Kategorie WHERE name = ? ORDER BY id"
);

const INSERT_CATEGORY: &str = r#"
INSERT OR IGNORE INTO BmDoc_Kategorie
    (uuid, name, docType, deleteState, docDate, timestampCreated, sync, needUpSync, needDownSync)
VALUES (?, ?, ?, 0, ?, ?, 1, 1, 0)
"#;

const INSERT_OR_IGNORE_LINK: &str =
    "INSERT OR IGNORE INTO BmDoc_LinkTable (sourceUuid, targetUuid) VALUES (?, ?)";

const SELECT_LINKS_BY_SOURCE: &str =
    "SELECT id, sourceUuid, targetUuid FROM BmDoc_LinkTable WHERE sourceUuid = ? ORDER BY id";

const SELECT_LINKS_BY_TARGET: &str =
    "SELECT id, sourceUuid, targetUuid FROM BmDoc_LinkTable WHERE targetUuid = ? ORDER BY id";

/// Handle on an existing BelegManager database
#[derive(Clone)]
pub struct BelegStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl BelegStore {
    /// Open an existing database file; never creates one
    pub async fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "BelegManager database not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .busy_timeout(Duration::from_secs(30));

        debug!("Connecting to BelegManager database at {:?}", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the schema version from the `Property` table
    pub async fn database_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar(schema::DATABASE_VERSION_QUERY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::UnsupportedStore(format!("cannot read database version: {}", e))
            })?;

        version.ok_or_else(|| {
            Error::UnsupportedStore("databaseVersion property is missing".to_string())
        })
    }

    /// Check the database version and the presupposed tables
    pub async fn verify(&self) -> Result<()> {
        let version = self.database_version().await?;
        debug!(version, "BelegManager database version");
        if version != SUPPORTED_DATABASE_VERSION {
            return Err(Error::UnsupportedStore(format!(
                "database version {} not supported, supported: {}",
                version, SUPPORTED_DATABASE_VERSION
            )));
        }

        let present: Vec<String> = sqlx::query_scalar(schema::PRESUPPOSED_TABLES_QUERY)
            .fetch_all(&self.pool)
            .await?;
        let missing: Vec<&str> = PRESUPPOSED_TABLES
            .iter()
            .copied()
            .filter(|table| !present.iter().any(|name| name == table))
            .collect();
        if !missing.is_empty() {
            return Err(Error::UnsupportedStore(format!(
                "tables missing: {}",
                missing.join(", ")
            )));
        }

        info!("BelegManager database at {:?} verified", self.path);
        Ok(())
    }

    /// Begin a write transaction; dropping it without commit rolls back
    ///
    /// The write lock is taken up front so transactions from concurrent
    /// file tasks queue on the busy timeout instead of failing with
    /// SQLITE_BUSY when they upgrade from reading to writing.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        debug!("Transaction begun");
        Ok(tx)
    }

    /// Row counts of live entities
    pub async fn stats(&self) -> Result<StoreStats> {
        let database_version = self.database_version().await?;

        let assets: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM BmDoc_Asset WHERE deleteState IS NULL OR deleteState = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        let belege: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM BmDoc_Beleg WHERE deleteState IS NULL OR deleteState = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        let categories: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM BmDoc_Kategorie WHERE deleteState IS NULL OR deleteState = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM BmDoc_LinkTable")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            database_version,
            assets,
            belege,
            categories,
            links,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ===== Asset Operations =====

/// All assets (live or deleted) stored under the given internal path
pub async fn find_assets_by_internal_path(
    conn: &mut SqliteConnection,
    internal_path: &str,
) -> Result<Vec<Asset>> {
    let assets = sqlx::query_as::<_, Asset>(SELECT_ASSETS_BY_INTERNAL_PATH)
        .bind(internal_path)
        .fetch_all(&mut *conn)
        .await?;
    Ok(assets)
}

/// Insert a new asset and return the stored row
pub async fn insert_asset(
    conn: &mut SqliteConnection,
    name: &str,
    internal_path: &str,
    now: DateTime<Utc>,
) -> Result<Asset> {
    let uuid = new_bm_uuid();
    let timestamp = bm_timestamp(now);

    sqlx::query(INSERT_ASSET)
        .bind(&uuid)
        .bind(name)
        .bind(doc_type::ASSET)
        .bind(&timestamp)
        .bind(&timestamp)
        .bind(internal_path)
        .execute(&mut *conn)
        .await?;

    let asset = sqlx::query_as::<_, Asset>(SELECT_ASSET_BY_UUID)
        .bind(&uuid)
        .fetch_one(&mut *conn)
        .await?;
    debug!(asset_id = asset.meta.id, "Created new asset");
    Ok(asset)
}

// ===== Beleg Operations =====

pub async fn find_beleg_by_uuid(conn: &mut SqliteConnection, uuid: &str) -> Result<Option<Beleg>> {
    let beleg = sqlx::query_as::<_, Beleg>(SELECT_BELEG_BY_UUID)
        .bind(uuid)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(beleg)
}

pub async fn find_beleg_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Beleg>> {
    let beleg = sqlx::query_as::<_, Beleg>(SELECT_BELEG_BY_ID)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(beleg)
}

/// Insert a new beleg and return the stored row
pub async fn insert_beleg(
    conn: &mut SqliteConnection,
    values: &BelegValues,
    now: DateTime<Utc>,
) -> Result<Beleg> {
    let uuid = new_bm_uuid();
    let timestamp = bm_timestamp(now);

    sqlx::query(INSERT_BELEG)
        .bind(&uuid)
        .bind(&values.name)
        .bind(doc_type::BELEG)
        .bind(&timestamp)
        .bind(&timestamp)
        .bind(&values.number)
        .bind(values.amount)
        .bind(values.vat)
        .bind(&values.comment)
        .bind(&values.beleg_date)
        .execute(&mut *conn)
        .await?;

    find_beleg_by_uuid(conn, &uuid)
        .await?
        .ok_or_else(|| Error::Reconciliation(format!("beleg {} not found after insert", uuid)))
}

/// Overwrite the mutable values of a beleg in place
///
/// Identifier, uuid and creation timestamp stay untouched; `docDate` is
/// refreshed to `now`.
pub async fn update_beleg(
    conn: &mut SqliteConnection,
    id: i64,
    values: &BelegValues,
    now: DateTime<Utc>,
) -> Result<Beleg> {
    sqlx::query(UPDATE_BELEG)
        .bind(&values.name)
        .bind(bm_timestamp(now))
        .bind(&values.number)
        .bind(values.amount)
        .bind(values.vat)
        .bind(&values.comment)
        .bind(&values.beleg_date)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    find_beleg_by_id(conn, id)
        .await?
        .ok_or_else(|| Error::Reconciliation(format!("beleg {} not found after update", id)))
}

// ===== Category Operations =====

/// All categories (live or deleted) with exactly this name
pub async fn find_categories_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(SELECT_CATEGORIES_BY_NAME)
        .bind(name)
        .fetch_all(&mut *conn)
        .await?;
    Ok(categories)
}

pub async fn insert_or_ignore_category(
    conn: &mut SqliteConnection,
    name: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let timestamp = bm_timestamp(now);
    sqlx::query(INSERT_CATEGORY)
        .bind(new_bm_uuid())
        .bind(name)
        .bind(doc_type::CATEGORY)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ===== Link Operations =====

/// Link two entities; returns false when the pair already existed
pub async fn insert_or_ignore_link(
    conn: &mut SqliteConnection,
    source_uuid: &str,
    target_uuid: &str,
) -> Result<bool> {
    let result = sqlx::query(INSERT_OR_IGNORE_LINK)
        .bind(source_uuid)
        .bind(target_uuid)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_links_by_source(
    conn: &mut SqliteConnection,
    source_uuid: &str,
) -> Result<Vec<Link>> {
    let links = sqlx::query_as::<_, Link>(SELECT_LINKS_BY_SOURCE)
        .bind(source_uuid)
        .fetch_all(&mut *conn)
        .await?;
    Ok(links)
}

pub async fn find_links_by_target(
    conn: &mut SqliteConnection,
    target_uuid: &str,
) -> Result<Vec<Link>> {
    let links = sqlx::query_as::<_, Link>(SELECT_LINKS_BY_TARGET)
        .bind(target_uuid)
        .fetch_all(&mut *conn)
        .await?;
    Ok(links)
}
