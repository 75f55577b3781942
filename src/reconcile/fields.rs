//! Derivation of beleg values from an analyzed invoice

use crate::analysis::AnalyzedDocument;
use crate::store::BelegValues;
use tracing::debug;

pub const FIELD_INVOICE_ID: &str = "InvoiceId";
pub const FIELD_INVOICE_DATE: &str = "InvoiceDate";
pub const FIELD_INVOICE_TOTAL: &str = "InvoiceTotal";
pub const FIELD_VENDOR_NAME: &str = "VendorName";
pub const FIELD_CUSTOMER_NAME: &str = "CustomerName";
pub const FIELD_ITEMS: &str = "Items";
pub const FIELD_TAX_DETAILS: &str = "TaxDetails";
const ITEM_DESCRIPTION: &str = "Description";
const TAX_RATE: &str = "Rate";

/// Fields whose content becomes a linked category
pub const CATEGORY_FIELDS: [&str; 2] = [FIELD_CUSTOMER_NAME, FIELD_VENDOR_NAME];

const MAX_ITEM_NAME_CHARS: usize = 40;
const TRUNCATED_ITEM_NAME_CHARS: usize = 37;

fn single_line(text: &str) -> String {
    text.replace('\n', " ")
}

fn item_descriptions(doc: &AnalyzedDocument) -> Vec<String> {
    doc.field(FIELD_ITEMS)
        .map(|items| items.items())
        .unwrap_or_default()
        .iter()
        .map(|item| {
            let description = item
                .member(ITEM_DESCRIPTION)
                .map(|d| d.content.as_str())
                .unwrap_or("");
            single_line(description)
        })
        .collect()
}

/// Display name of the beleg
///
/// A single line item names the beleg after its description, anything
/// else falls back to invoice id and both parties.
pub fn invoice_name(doc: &AnalyzedDocument) -> String {
    let vendor = single_line(doc.content(FIELD_VENDOR_NAME));

    let descriptions = item_descriptions(doc);
    if let [description] = descriptions.as_slice() {
        let description = if description.chars().count() > MAX_ITEM_NAME_CHARS {
            let head: String = description.chars().take(TRUNCATED_ITEM_NAME_CHARS).collect();
            format!("{head}...")
        } else {
            description.clone()
        };
        return format!("{description} from {vendor}");
    }

    let customer = single_line(doc.content(FIELD_CUSTOMER_NAME));
    format!(
        "Invoice {} from {} to {}",
        doc.content(FIELD_INVOICE_ID),
        vendor,
        customer
    )
}

/// Bulleted item list followed by the confidence of the invoice total
pub fn comment(doc: &AnalyzedDocument) -> String {
    let items = item_descriptions(doc)
        .into_iter()
        .map(|description| format!("- {description}"))
        .collect::<Vec<_>>()
        .join("\n");

    let confidence = gross_confidence(doc)
        .map(|c| format!("{c:.2}"))
        .unwrap_or_else(|| "-".to_string());

    format!("{items}\n\nInvoiceTotal confidence: {confidence}")
}

/// Gross amount from the invoice total
pub fn gross(doc: &AnalyzedDocument) -> Option<f64> {
    let Some(total) = doc.field(FIELD_INVOICE_TOTAL) else {
        debug!("Field 'InvoiceTotal' not found in document analysis for gross");
        return None;
    };
    total.value_currency.as_ref().map(|currency| currency.amount)
}

pub fn gross_confidence(doc: &AnalyzedDocument) -> Option<f64> {
    doc.field(FIELD_INVOICE_TOTAL).map(|total| total.confidence)
}

/// VAT rate in percent, only when exactly one tax detail was extracted
pub fn vat(doc: &AnalyzedDocument) -> Option<f64> {
    let details = doc.field(FIELD_TAX_DETAILS)?.items();
    let [detail] = details else {
        debug!("Not exactly one but {} TaxDetails from analysis", details.len());
        return None;
    };

    let raw = detail.member(TAX_RATE).map(|r| r.content.as_str()).unwrap_or("");
    parse_percentage(raw)
}

/// Parse "19%" or "19,5%" into a number
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    match number.replace(',', ".").parse::<f64>() {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Cannot parse VAT rate {:?}: {}", raw, e);
            None
        }
    }
}

/// Category name for a field: lines joined by ", " without trailing separators
pub fn category_name(doc: &AnalyzedDocument, field_name: &str) -> String {
    doc.content(field_name)
        .replace('\n', ", ")
        .trim_end_matches([',', ' '])
        .to_string()
}

/// All values written to the beleg on create and on update
pub fn beleg_values(doc: &AnalyzedDocument) -> BelegValues {
    BelegValues {
        name: invoice_name(doc),
        number: doc.field(FIELD_INVOICE_ID).map(|id| id.content.clone()),
        amount: gross(doc),
        vat: vat(doc),
        comment: comment(doc),
        beleg_date: doc
            .field(FIELD_INVOICE_DATE)
            .and_then(|date| date.value_date.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(fields: serde_json::Value) -> AnalyzedDocument {
        serde_json::from_value(json!({
            "docType": "invoice",
            "confidence": 1.0,
            "fields": fields
        }))
        .unwrap()
    }

    fn items(descriptions: &[&str]) -> serde_json::Value {
        let entries: Vec<_> = descriptions
            .iter()
            .map(|d| json!({"type": "object", "valueObject": {"Description": {"type": "string", "content": d}}}))
            .collect();
        json!({"type": "array", "valueArray": entries})
    }

    fn tax_details(rates: &[&str]) -> serde_json::Value {
        let entries: Vec<_> = rates
            .iter()
            .map(|r| json!({"type": "object", "valueObject": {"Rate": {"type": "string", "content": r}}}))
            .collect();
        json!({"type": "array", "valueArray": entries})
    }

    #[test]
    fn test_invoice_name_single_item() {
        let doc = document(json!({
            "VendorName": {"content": "Acme"},
            "Items": items(&["Printer toner cartridge"])
        }));
        assert_eq!(invoice_name(&doc), "Printer toner cartridge from Acme");
    }

    #[test]
    fn test_invoice_name_truncates_long_description() {
        let description = "A".repeat(50);
        let doc = document(json!({
            "VendorName": {"content": "CONTOSO\nLTD."},
            "Items": items(&[description.as_str()])
        }));
        let expected = format!("{}... from CONTOSO LTD.", "A".repeat(37));
        assert_eq!(invoice_name(&doc), expected);

        let exactly_forty = "B".repeat(40);
        let doc = document(json!({
            "VendorName": {"content": "Acme"},
            "Items": items(&[exactly_forty.as_str()])
        }));
        assert_eq!(invoice_name(&doc), format!("{exactly_forty} from Acme"));
    }

    #[test]
    fn test_invoice_name_counts_characters() {
        let description = "Ü".repeat(45);
        let doc = document(json!({
            "VendorName": {"content": "Bäckerei"},
            "Items": items(&[description.as_str()])
        }));
        assert_eq!(
            invoice_name(&doc),
            format!("{}... from Bäckerei", "Ü".repeat(37))
        );
    }

    #[test]
    fn test_invoice_name_multiple_items() {
        let doc = document(json!({
            "InvoiceId": {"content": "INV-100"},
            "VendorName": {"content": "Acme"},
            "CustomerName": {"content": "Jane\nDoe"},
            "Items": items(&["one", "two"])
        }));
        assert_eq!(invoice_name(&doc), "Invoice INV-100 from Acme to Jane Doe");

        let empty = document(json!({}));
        assert_eq!(invoice_name(&empty), "Invoice  from  to ");
    }

    #[test]
    fn test_comment() {
        let doc = document(json!({
            "Items": items(&["Test item\ndescription", "Second"]),
            "InvoiceTotal": {"confidence": 0.954}
        }));
        assert_eq!(
            comment(&doc),
            "- Test item description\n- Second\n\nInvoiceTotal confidence: 0.95"
        );

        let doc = document(json!({
            "Items": items(&[]),
            "InvoiceTotal": {"confidence": 1.0}
        }));
        assert_eq!(comment(&doc), "\n\nInvoiceTotal confidence: 1.00");
    }

    #[test]
    fn test_comment_without_total_uses_dash() {
        let doc = document(json!({"Items": items(&["Item without confidence"])}));
        assert_eq!(
            comment(&doc),
            "- Item without confidence\n\nInvoiceTotal confidence: -"
        );
    }

    #[test]
    fn test_gross() {
        let doc = document(json!({
            "InvoiceTotal": {
                "type": "currency",
                "confidence": 0.9,
                "valueCurrency": {"amount": 118368.0, "currencyCode": "USD"}
            }
        }));
        assert_eq!(gross(&doc), Some(118368.0));
        assert_eq!(gross_confidence(&doc), Some(0.9));

        let missing = document(json!({}));
        assert_eq!(gross(&missing), None);
        assert_eq!(gross_confidence(&missing), None);

        let no_currency = document(json!({"InvoiceTotal": {"content": "n/a"}}));
        assert_eq!(gross(&no_currency), None);
    }

    #[test]
    fn test_vat() {
        let doc = document(json!({"TaxDetails": tax_details(&["19%"])}));
        assert_eq!(vat(&doc), Some(19.0));

        let doc = document(json!({"TaxDetails": tax_details(&["19,5%"])}));
        assert_eq!(vat(&doc), Some(19.5));

        let doc = document(json!({"TaxDetails": tax_details(&["19%", "7%"])}));
        assert_eq!(vat(&doc), None);

        let doc = document(json!({"TaxDetails": tax_details(&[])}));
        assert_eq!(vat(&doc), None);

        let doc = document(json!({"TaxDetails": tax_details(&["nineteen"])}));
        assert_eq!(vat(&doc), None);

        assert_eq!(vat(&document(json!({}))), None);
    }

    #[test]
    fn test_category_name() {
        let doc = document(json!({
            "VendorName": {"content": "Line 1\nLine 2\nLine 3"},
            "CustomerName": {"content": "Line 1\n"}
        }));
        assert_eq!(category_name(&doc, FIELD_VENDOR_NAME), "Line 1, Line 2, Line 3");
        assert_eq!(category_name(&doc, FIELD_CUSTOMER_NAME), "Line 1");
        assert_eq!(category_name(&doc, "MissingField"), "");
    }

    #[test]
    fn test_beleg_values() {
        let doc = document(json!({
            "InvoiceId": {"content": "654123"},
            "InvoiceDate": {"type": "date", "content": "15.01.2023", "valueDate": "2023-01-15"},
            "VendorName": {"content": "CONTOSO"},
            "Items": items(&["Video production"]),
            "InvoiceTotal": {"confidence": 0.95, "valueCurrency": {"amount": 100.0}},
            "TaxDetails": tax_details(&["20%"])
        }));

        let values = beleg_values(&doc);
        assert_eq!(values.name, "Video production from CONTOSO");
        assert_eq!(values.number.as_deref(), Some("654123"));
        assert_eq!(values.amount, Some(100.0));
        assert_eq!(values.vat, Some(20.0));
        assert_eq!(values.beleg_date.as_deref(), Some("2023-01-15"));
        assert_eq!(
            values.comment,
            "- Video production\n\nInvoiceTotal confidence: 0.95"
        );
    }
}
