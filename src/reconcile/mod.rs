//! Reconciliation of analyzed invoices into the BelegManager store
//!
//! Each analyzed document is written inside its own transaction:
//! 1. Find a live asset for the file's base name whose stored copy has the
//!    same size as the input file
//! 2. Update the beleg linked to that asset, or copy the file and create
//!    asset, beleg and the asset link
//! 3. Find or create the counterparty categories and link them
//!
//! Any failure rolls the transaction back.

pub mod fields;

use crate::analysis::AnalyzedDocument;
use crate::error::{Error, Result};
use crate::files;
use crate::store::{self, Asset, Beleg, BelegStore, Category};
use chrono::Utc;
use sqlx::SqliteConnection;
use std::io::ErrorKind;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether a beleg was newly created or refreshed in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileAction::Created => write!(f, "created"),
            ReconcileAction::Updated => write!(f, "updated"),
        }
    }
}

/// Result of reconciling one analyzed document
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub beleg: Beleg,
    pub action: ReconcileAction,
}

/// Reject documents the analysis did not classify as invoice
pub fn ensure_invoice(doc: &AnalyzedDocument) -> Result<()> {
    if doc.is_invoice() {
        Ok(())
    } else {
        Err(Error::Classification(format!(
            "document type is {:?}",
            doc.doc_type
        )))
    }
}

/// Reconcile one document in its own transaction
///
/// Commits on success and rolls back on error or when `cancel` fired
/// before the commit.
pub async fn reconcile_document(
    store: &BelegStore,
    target_dir: &Path,
    file: &Path,
    doc: &AnalyzedDocument,
    cancel: &CancellationToken,
) -> Result<Reconciled> {
    ensure_invoice(doc)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut tx = store.begin().await?;
    let result = match reconcile(&mut tx, target_dir, file, doc).await {
        Ok(_) if cancel.is_cancelled() => Err(Error::Cancelled),
        other => other,
    };

    match result {
        Ok(reconciled) => {
            tx.commit().await?;
            debug!("Transaction committed");
            Ok(reconciled)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Failed to roll back transaction: {}", rollback_err);
            } else {
                debug!("Transaction rolled back");
            }
            Err(e)
        }
    }
}

/// Create or update the beleg for `doc` using an open transaction
pub async fn reconcile(
    conn: &mut SqliteConnection,
    target_dir: &Path,
    file: &Path,
    doc: &AnalyzedDocument,
) -> Result<Reconciled> {
    let base_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Other(format!("{} has no file name", file.display())))?;

    let reconciled = match find_matching_asset(conn, target_dir, file, &base_name).await? {
        Some(asset) => {
            let beleg = update_beleg_for_asset(conn, &asset, doc).await?;
            Reconciled {
                beleg,
                action: ReconcileAction::Updated,
            }
        }
        None => {
            let beleg = create_beleg_with_asset(conn, target_dir, file, &base_name, doc).await?;
            Reconciled {
                beleg,
                action: ReconcileAction::Created,
            }
        }
    };

    for field_name in fields::CATEGORY_FIELDS {
        link_category(conn, doc, field_name, &reconciled.beleg).await?;
    }

    Ok(reconciled)
}

/// The asset to update, if exactly one live asset has this base name and
/// its stored copy matches the input file's size
async fn find_matching_asset(
    conn: &mut SqliteConnection,
    target_dir: &Path,
    file: &Path,
    base_name: &str,
) -> Result<Option<Asset>> {
    let source_size = tokio::fs::metadata(file).await?.len();

    let stored_copy = target_dir.join(base_name);
    let stored_size = match tokio::fs::metadata(&stored_copy).await {
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let mut live: Vec<Asset> = store::find_assets_by_internal_path(conn, base_name)
        .await?
        .into_iter()
        .filter(|asset| !asset.meta.is_deleted())
        .collect();

    match (live.len(), stored_size) {
        (1, Some(size)) if size == source_size => Ok(live.pop()),
        (count, size) => {
            debug!(
                live_assets = count,
                stored_size = ?size,
                source_size,
                "No unique asset for {}, creating a new one",
                base_name
            );
            Ok(None)
        }
    }
}

/// The link with the asset as source; more than one is an inconsistency
async fn find_link_by_asset_as_source(
    conn: &mut SqliteConnection,
    asset: &Asset,
) -> Result<Option<store::Link>> {
    let mut links = store::find_links_by_source(conn, &asset.meta.uuid).await?;
    if links.len() > 1 {
        return Err(Error::Reconciliation(format!(
            "link for asset {} as source exists more than once, check in BelegManager",
            asset.meta.uuid
        )));
    }
    Ok(links.pop())
}

async fn update_beleg_for_asset(
    conn: &mut SqliteConnection,
    asset: &Asset,
    doc: &AnalyzedDocument,
) -> Result<Beleg> {
    let link = find_link_by_asset_as_source(conn, asset).await?.ok_or_else(|| {
        Error::Reconciliation(format!(
            "no beleg linked to asset {} though expected",
            asset.meta.uuid
        ))
    })?;

    let existing = store::find_beleg_by_uuid(conn, &link.target_uuid)
        .await?
        .ok_or_else(|| {
            Error::Reconciliation(format!(
                "beleg {} linked to asset {} not found",
                link.target_uuid, asset.meta.uuid
            ))
        })?;

    let values = fields::beleg_values(doc);
    let beleg = store::update_beleg(conn, existing.meta.id, &values, Utc::now()).await?;

    info!(beleg_id = beleg.meta.id, beleg_name = %beleg.meta.name, "Beleg updated");
    Ok(beleg)
}

async fn create_beleg_with_asset(
    conn: &mut SqliteConnection,
    target_dir: &Path,
    file: &Path,
    base_name: &str,
    doc: &AnalyzedDocument,
) -> Result<Beleg> {
    let internal_path = files::copy_into_directory(file, target_dir).await?;

    let now = Utc::now();
    let asset = store::insert_asset(conn, base_name, &internal_path, now).await?;
    let beleg = store::insert_beleg(conn, &fields::beleg_values(doc), now).await?;
    store::insert_or_ignore_link(conn, &asset.meta.uuid, &beleg.meta.uuid).await?;

    info!(
        beleg_id = beleg.meta.id,
        beleg_name = %beleg.meta.name,
        internal_path = %internal_path,
        "New Beleg created"
    );
    Ok(beleg)
}

/// At most one category per name; a single deleted match is refused
async fn find_category(conn: &mut SqliteConnection, name: &str) -> Result<Option<Category>> {
    let mut categories = store::find_categories_by_name(conn, name).await?;
    if categories.len() > 1 {
        return Err(Error::Reconciliation(format!(
            "category {:?} exists more than once, check in BelegManager",
            name
        )));
    }

    match categories.pop() {
        Some(category) if category.meta.is_deleted() => Err(Error::Reconciliation(format!(
            "category {:?} is deleted, check in BelegManager",
            name
        ))),
        found => Ok(found),
    }
}

async fn find_or_create_category(conn: &mut SqliteConnection, name: &str) -> Result<Category> {
    if let Some(category) = find_category(conn, name).await? {
        return Ok(category);
    }

    store::insert_or_ignore_category(conn, name, Utc::now()).await?;
    debug!(category = %name, "Created category");

    find_category(conn, name).await?.ok_or_else(|| {
        Error::Reconciliation(format!("category {:?} not found after insert", name))
    })
}

async fn link_category(
    conn: &mut SqliteConnection,
    doc: &AnalyzedDocument,
    field_name: &str,
    beleg: &Beleg,
) -> Result<()> {
    let name = fields::category_name(doc, field_name);
    if name.is_empty() {
        debug!("No {} in analysis, skipping category", field_name);
        return Ok(());
    }

    let category = find_or_create_category(conn, &name).await?;
    store::insert_or_ignore_link(conn, &category.meta.uuid, &beleg.meta.uuid).await?;
    Ok(())
}
