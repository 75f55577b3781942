//! belegsync - import scanned invoices into a BelegManager database
//!
//! This crate provides:
//! - A client for an asynchronous document-analysis service (submit, then poll)
//! - Reconciliation of analyzed invoices into the BelegManager SQLite store
//! - A bounded-concurrency import pipeline with a per-run CSV audit report

pub mod analysis;
pub mod commands;
pub mod config;
pub mod discover;
pub mod error;
pub mod files;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
