//! Form and query-string parsing shared by the module routes.
//!
//! Browsers submit everything as strings and submit empty strings for
//! untouched fields, so every parser here treats blank as absent rather
//! than as a parse error.

use std::collections::HashMap;

use axum::extract::Multipart;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use opsdesk_core::{OpsError, Result};

use crate::uploads::UploadedFile;

/// The filter menu every index/export route accepts. Module routes read the
/// fields that apply to them and ignore the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub assigned_to: Option<String>,
    pub outcome: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub method: Option<String>,
    pub category: Option<String>,
}

pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    non_empty(value).and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
}

pub fn parse_i64(value: Option<&str>) -> Option<i64> {
    non_empty(value).and_then(|v| v.parse().ok())
}

pub fn parse_decimal(value: Option<&str>) -> Option<Decimal> {
    non_empty(value).and_then(|v| v.parse().ok())
}

/// Checkbox semantics: present (any value) means checked.
pub fn checkbox(value: Option<&str>) -> bool {
    value.is_some()
}

/// Drain a multipart submission into text fields plus at most one file.
/// A file part with an empty client filename counts as "no file supplied".
pub async fn collect_multipart(
    mut multipart: Multipart,
) -> Result<(HashMap<String, String>, Option<UploadedFile>)> {
    let mut values = HashMap::new();
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_err(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name() {
            Some(original) => {
                let original_name = original.to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_err(e.to_string()))?
                    .to_vec();
                if !original_name.is_empty() {
                    file = Some(UploadedFile {
                        original_name,
                        bytes,
                    });
                }
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_err(e.to_string()))?;
                values.insert(name, text);
            }
        }
    }
    Ok((values, file))
}

fn multipart_err(detail: String) -> OpsError {
    OpsError::storage("The submitted form could not be read.", Some(detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_missing_are_both_absent() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x".to_string()));
    }

    #[test]
    fn date_parsing_is_iso_only() {
        assert_eq!(
            parse_date(Some("2026-08-20")),
            NaiveDate::from_ymd_opt(2026, 8, 20)
        );
        assert_eq!(parse_date(Some("20/08/2026")), None);
        assert_eq!(parse_date(Some("")), None);
    }

    #[test]
    fn numeric_parsing_tolerates_garbage() {
        assert_eq!(parse_i64(Some("42")), Some(42));
        assert_eq!(parse_i64(Some("forty-two")), None);
        assert_eq!(parse_decimal(Some("45.50")), Some(Decimal::new(4550, 2)));
        assert_eq!(parse_decimal(Some("")), None);
    }

    #[test]
    fn checkbox_presence_is_checked() {
        assert!(checkbox(Some("on")));
        assert!(checkbox(Some("")));
        assert!(!checkbox(None));
    }
}
