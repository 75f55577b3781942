//! Wire types of the document analysis service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Document type the import accepts
pub const DOC_TYPE_INVOICE: &str = "invoice";

/// State of an analysis job as reported by its polling URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// Body of a poll response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub status: JobStatus,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_updated_date_time: Option<String>,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
}

/// Result payload of a succeeded analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub documents: Vec<AnalyzedDocument>,
}

/// One document recognized in an analyzed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    #[serde(default)]
    pub doc_type: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub fields: HashMap<String, DocumentField>,
}

/// A typed field extracted from a document
///
/// Array items and object members use the same shape, so `valueArray`
/// and `valueObject` nest this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentField {
    #[serde(default, rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub value_string: Option<String>,
    #[serde(default)]
    pub value_date: Option<String>,
    #[serde(default)]
    pub value_number: Option<f64>,
    #[serde(default)]
    pub value_currency: Option<CurrencyValue>,
    #[serde(default)]
    pub value_address: Option<AddressValue>,
    #[serde(default)]
    pub value_array: Option<Vec<DocumentField>>,
    #[serde(default)]
    pub value_object: Option<HashMap<String, DocumentField>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyValue {
    #[serde(default)]
    pub currency_symbol: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressValue {
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_region: Option<String>,
    #[serde(default)]
    pub street_address: Option<String>,
}

impl AnalyzedDocument {
    pub fn is_invoice(&self) -> bool {
        self.doc_type == DOC_TYPE_INVOICE
    }

    pub fn field(&self, name: &str) -> Option<&DocumentField> {
        self.fields.get(name)
    }

    /// Content of a field, empty when the field was not extracted
    pub fn content(&self, name: &str) -> &str {
        self.field(name).map(|f| f.content.as_str()).unwrap_or("")
    }
}

impl DocumentField {
    /// Items of an array field; empty when the field carries no array
    pub fn items(&self) -> &[DocumentField] {
        self.value_array.as_deref().unwrap_or(&[])
    }

    /// Member of an object field
    pub fn member(&self, name: &str) -> Option<&DocumentField> {
        self.value_object.as_ref().and_then(|object| object.get(name))
    }
}
