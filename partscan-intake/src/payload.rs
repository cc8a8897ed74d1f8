//! Payload parser
//!
//! Part labels carry a brace-delimited, comma-separated, colon-keyed record:
//! `{pm:R1-100K,qty:10}`. `pm` is the part number and `qty` the quantity;
//! other keys are kept but unused by the pipeline.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Field holding the part number
pub const PART_NUMBER_KEY: &str = "pm";

/// Field holding the quantity
pub const QUANTITY_KEY: &str = "qty";

/// Parsed payload fields, keyed by field name
pub type PayloadFields = BTreeMap<String, String>;

/// Payload grammar errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Payload is empty")]
    Empty,

    #[error("Payload is not brace-delimited: {0}")]
    NotBraced(String),
}

/// Parse a raw payload into its key/value fields
///
/// One pair of enclosing braces is stripped, the rest is split on commas and
/// each segment split on its first colon. Keys and values are trimmed.
/// Segments without a colon are skipped with a warning; a later duplicate key
/// replaces an earlier one.
pub fn parse(raw: &str) -> Result<PayloadFields, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let inner = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| ParseError::NotBraced(trimmed.to_string()))?;

    let mut fields = PayloadFields::new();
    for segment in inner.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        match segment.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => {
                warn!(segment = %segment, "Skipping malformed payload segment");
            }
        }
    }

    Ok(fields)
}

/// Part lookup request derived from a parsed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartQuery {
    pub part_number: String,
    pub quantity: Option<String>,
}

impl PartQuery {
    /// Extract the part query, or `None` when there is no usable part number
    pub fn from_fields(fields: &PayloadFields) -> Option<Self> {
        let part_number = fields
            .get(PART_NUMBER_KEY)
            .filter(|pn| !pn.is_empty())?
            .clone();
        let quantity = fields
            .get(QUANTITY_KEY)
            .filter(|qty| !qty.is_empty())
            .cloned();

        Some(Self {
            part_number,
            quantity,
        })
    }

    /// Quantity as stored in the parts table (empty when absent)
    pub fn quantity_or_empty(&self) -> &str {
        self.quantity.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> PayloadFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_well_formed() {
        let parsed = parse("{pm:R1-100K,qty:10}").unwrap();
        assert_eq!(parsed, fields(&[("pm", "R1-100K"), ("qty", "10")]));
    }

    #[test]
    fn test_parse_skips_malformed_segment() {
        let parsed = parse("{pm:123,garbage,qty:5}").unwrap();
        assert_eq!(parsed, fields(&[("pm", "123"), ("qty", "5")]));
    }

    #[test]
    fn test_parse_trims_and_splits_on_first_colon() {
        let parsed = parse("  { pm : LM317:TO220 , qty: 3 }  ").unwrap();
        assert_eq!(parsed, fields(&[("pm", "LM317:TO220"), ("qty", "3")]));
    }

    #[test]
    fn test_parse_empty_record() {
        assert!(parse("{}").unwrap().is_empty());
        assert!(parse("{,,}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_empty_key_is_skipped() {
        let parsed = parse("{:orphan,pm:X}").unwrap();
        assert_eq!(parsed, fields(&[("pm", "X")]));
    }

    #[test]
    fn test_parse_rejects_unbraced() {
        assert_eq!(
            parse("pm:123,qty:5"),
            Err(ParseError::NotBraced("pm:123,qty:5".to_string()))
        );
        assert!(matches!(parse("{pm:123"), Err(ParseError::NotBraced(_))));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let parsed = parse("{pm:A,pm:B}").unwrap();
        assert_eq!(parsed.get("pm").map(String::as_str), Some("B"));
    }

    #[test]
    fn test_part_query_from_fields() {
        let query = PartQuery::from_fields(&fields(&[("pm", "R1-100K"), ("qty", "10")])).unwrap();
        assert_eq!(query.part_number, "R1-100K");
        assert_eq!(query.quantity.as_deref(), Some("10"));

        let no_qty = PartQuery::from_fields(&fields(&[("pm", "R1-100K")])).unwrap();
        assert_eq!(no_qty.quantity, None);
        assert_eq!(no_qty.quantity_or_empty(), "");

        assert!(PartQuery::from_fields(&fields(&[("qty", "10")])).is_none());
        assert!(PartQuery::from_fields(&fields(&[("pm", ""), ("qty", "10")])).is_none());
    }
}
