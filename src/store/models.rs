//! Row types of the BelegManager store

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Timestamp format used by BelegManager for `docDate` and `timestampCreated`
pub const BM_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Compact timestamp used in backup, report and collision file names
pub const FLAT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Document type codes of the BelegManager entity tables
pub mod doc_type {
    pub const CATEGORY: i64 = 1;
    pub const BELEG: i64 = 3;
    pub const ASSET: i64 = 4;
}

/// Generate an entity identifier in BelegManager's `{uuid}` form
pub fn new_bm_uuid() -> String {
    format!("{{{}}}", Uuid::new_v4())
}

pub fn bm_timestamp(at: DateTime<Utc>) -> String {
    at.format(BM_TIMESTAMP_FORMAT).to_string()
}

pub fn flat_timestamp(at: DateTime<Local>) -> String {
    at.format(FLAT_TIMESTAMP_FORMAT).to_string()
}

/// Columns shared by every entity table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub doc_type: Option<i64>,
    pub delete_state: Option<i64>,
    pub doc_date: Option<String>,
    pub timestamp_created: Option<String>,
    pub unread: Option<i64>,
    pub sync: Option<i64>,
    pub need_up_sync: Option<i64>,
    pub need_down_sync: Option<i64>,
    pub timestamp_last_sync: Option<String>,
}

impl EntityMeta {
    pub fn is_deleted(&self) -> bool {
        self.delete_state.is_some_and(|state| state != 0)
    }
}

/// `BmDoc_Asset`: one imported source file
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub target_doc_type: Option<i64>,
    pub ocr_state: Option<i64>,
    pub internal_path: Option<String>,
    pub file_sync_state: Option<i64>,
}

/// `BmDoc_Beleg`: the reconciled invoice record
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct Beleg {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub number: Option<String>,
    pub amount: Option<f64>,
    pub netto: Option<i64>,
    pub vat: Option<f64>,
    pub comment: Option<String>,
    pub beleg_date: Option<String>,
}

/// `BmDoc_Kategorie`: a named grouping such as a counterparty
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Category {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: EntityMeta,
}

/// `BmDoc_LinkTable`: an edge between two entities
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[sqlx(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: i64,
    pub source_uuid: String,
    pub target_uuid: String,
}

/// Mutable invoice values derived from an analyzed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BelegValues {
    pub name: String,
    pub number: Option<String>,
    pub amount: Option<f64>,
    pub vat: Option<f64>,
    pub comment: String,
    pub beleg_date: Option<String>,
}

/// Row counts shown by `belegsync check`
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub database_version: i64,
    pub assets: i64,
    pub belege: i64,
    pub categories: i64,
    pub links: i64,
}
