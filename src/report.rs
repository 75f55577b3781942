//! Per-run audit report
//!
//! One CSV row per outcome. Writing the report never fails the run:
//! errors are logged and the import result stays the same.

use crate::error::Result;
use crate::pipeline::Outcome;
use crate::reconcile::fields;
use crate::store::flat_timestamp;
use chrono::Local;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One line of the audit report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "OriginalPath")]
    pub original_path: String,
    #[serde(rename = "BelegID")]
    pub beleg_id: String,
    #[serde(rename = "BelegName")]
    pub beleg_name: String,
    #[serde(rename = "BelegDate")]
    pub beleg_date: String,
    #[serde(rename = "BelegAmount")]
    pub beleg_amount: String,
    #[serde(rename = "DocGross")]
    pub doc_gross: String,
    #[serde(rename = "DocGrossConfidence")]
    pub doc_gross_confidence: String,
    #[serde(rename = "DocVat")]
    pub doc_vat: String,
}

fn two_decimals(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

impl From<&Outcome> for ReportRow {
    fn from(outcome: &Outcome) -> Self {
        let mut row = ReportRow {
            original_path: outcome.file.display().to_string(),
            ..Default::default()
        };

        if let Some(reconciled) = &outcome.reconciled {
            let beleg = &reconciled.beleg;
            row.beleg_id = beleg.meta.id.to_string();
            row.beleg_name = beleg.meta.name.clone();
            row.beleg_date = beleg.beleg_date.clone().unwrap_or_default();
            row.beleg_amount = two_decimals(beleg.amount);
        }

        if let Some(doc) = &outcome.document {
            row.doc_gross = two_decimals(fields::gross(doc));
            row.doc_gross_confidence = two_decimals(fields::gross_confidence(doc));
            row.doc_vat = two_decimals(fields::vat(doc));
        }

        row
    }
}

/// Report file name for a run started now
pub fn report_file_name() -> String {
    format!("_import-log-{}.csv", flat_timestamp(Local::now()))
}

/// Write header and one row per outcome
pub fn write_rows<W: Write>(writer: W, outcomes: &[Outcome]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if outcomes.is_empty() {
        csv.write_record([
            "OriginalPath",
            "BelegID",
            "BelegName",
            "BelegDate",
            "BelegAmount",
            "DocGross",
            "DocGrossConfidence",
            "DocVat",
        ])?;
    }
    for outcome in outcomes {
        csv.serialize(ReportRow::from(outcome))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the report into `directory`; returns its path when written
pub fn write_report(directory: &Path, outcomes: &[Outcome]) -> Option<PathBuf> {
    let path = directory.join(report_file_name());

    let file = match std::fs::File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to create report file {}: {}", path.display(), e);
            return None;
        }
    };

    match write_rows(file, outcomes) {
        Ok(()) => {
            info!(rows = outcomes.len(), "Wrote import report {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Failed to write report file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalyzedDocument;
    use crate::reconcile::{ReconcileAction, Reconciled};
    use crate::store::{Beleg, EntityMeta};
    use serde_json::json;
    use tempfile::TempDir;

    const HEADER: &str =
        "OriginalPath,BelegID,BelegName,BelegDate,BelegAmount,DocGross,DocGrossConfidence,DocVat";

    fn beleg() -> Beleg {
        Beleg {
            meta: EntityMeta {
                id: 7,
                uuid: "{00000000-0000-0000-0000-000000000007}".to_string(),
                name: "Toner from Acme, Inc.".to_string(),
                doc_type: Some(3),
                delete_state: Some(0),
                doc_date: None,
                timestamp_created: None,
                unread: None,
                sync: Some(1),
                need_up_sync: Some(1),
                need_down_sync: Some(0),
                timestamp_last_sync: None,
            },
            number: Some("42".to_string()),
            amount: Some(119.0),
            netto: Some(0),
            vat: Some(19.0),
            comment: None,
            beleg_date: Some("2024-05-01".to_string()),
        }
    }

    fn document() -> AnalyzedDocument {
        serde_json::from_value(json!({
            "docType": "invoice",
            "fields": {
                "InvoiceTotal": {"confidence": 0.876, "valueCurrency": {"amount": 119.0}},
                "TaxDetails": {"valueArray": [{"valueObject": {"Rate": {"content": "19%"}}}]}
            }
        }))
        .unwrap()
    }

    fn render(outcomes: &[Outcome]) -> String {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, outcomes).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_rows_for_success_and_failure() {
        let outcomes = vec![
            Outcome {
                file: PathBuf::from("/in/toner.pdf"),
                document: Some(document()),
                reconciled: Some(Reconciled {
                    beleg: beleg(),
                    action: ReconcileAction::Created,
                }),
                error: None,
            },
            Outcome {
                file: PathBuf::from("/in/broken.pdf"),
                document: None,
                reconciled: None,
                error: Some("Analysis error: rejected".to_string()),
            },
        ];

        let lines: Vec<String> = render(&outcomes).lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "/in/toner.pdf,7,\"Toner from Acme, Inc.\",2024-05-01,119.00,119.00,0.88,19.00"
        );
        assert_eq!(lines[2], "/in/broken.pdf,,,,,,,");
    }

    #[test]
    fn test_empty_run_still_has_header() {
        assert_eq!(render(&[]).trim_end(), HEADER);
    }

    #[test]
    fn test_write_report_names_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_report(tmp.path(), &[]).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("_import-log-") && name.ends_with(".csv"));
        assert_eq!(name.len(), "_import-log-.csv".len() + 14);
    }

    #[test]
    fn test_unwritable_directory_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        assert!(write_report(&tmp.path().join("missing"), &[]).is_none());
    }
}
