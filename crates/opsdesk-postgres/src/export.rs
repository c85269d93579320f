//! CSV assembly for the per-module export routes.

use opsdesk_core::{OpsError, Result};

/// UTF-8 byte-order mark. Spreadsheet applications use it to detect the
/// encoding; without it non-ASCII names render as mojibake.
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Render one header row plus data rows as RFC 4180 CSV, BOM-prefixed.
pub fn csv_bytes(header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(BOM.to_vec());
    writer
        .write_record(header)
        .map_err(|e| export_err(e.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| export_err(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| export_err(e.to_string()))
}

fn export_err(detail: String) -> OpsError {
    OpsError::storage("The export could not be generated.", Some(detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn output_is_bom_prefixed() {
        let bytes = csv_bytes(&header(&["id", "title"]), &[]).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&bytes[3..], b"id,title\n");
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        let rows = vec![vec![
            "1".to_string(),
            "Smith, \"Roofing\" & Sons".to_string(),
        ]];
        let bytes = csv_bytes(&header(&["id", "title"]), &rows).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "id,title\n1,\"Smith, \"\"Roofing\"\" & Sons\"\n");
    }

    #[test]
    fn embedded_newlines_stay_quoted() {
        let rows = vec![vec!["1".to_string(), "line one\nline two".to_string()]];
        let bytes = csv_bytes(&header(&["id", "notes"]), &rows).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "id,notes\n1,\"line one\nline two\"\n");
    }
}
