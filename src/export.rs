//! Tabular export of extracted records.

use std::fmt::Write;

use crate::models::ExtractedRecord;

/// Column headers, in output order.
pub const HEADER: [&str; 4] = ["Parcel", "Owner 1", "Address", "Square Footage"];

/// Render records as CSV: one header line, then one line per record.
pub fn to_csv(records: &[ExtractedRecord]) -> String {
    let mut output = String::new();
    writeln!(output, "{}", HEADER.join(",")).ok();

    for record in records {
        writeln!(
            output,
            "{},{},{},{}",
            escape_csv(&record.id),
            escape_csv(&record.owner),
            escape_csv(&record.address),
            record.total_area
        )
        .ok();
    }

    output
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Make a caller-supplied name safe to use as a download filename.
///
/// Path components are stripped and `.csv` is appended when missing.
pub fn normalize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .replace('"', "");
    let base = if base.is_empty() || base == "." || base == ".." {
        "parcels".to_string()
    } else {
        base
    };

    if base.to_ascii_lowercase().ends_with(".csv") {
        base
    } else {
        format!("{base}.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, owner: &str, address: &str, area: u64) -> ExtractedRecord {
        ExtractedRecord {
            id: id.into(),
            owner: owner.into(),
            address: address.into(),
            total_area: area,
        }
    }

    #[test]
    fn header_then_one_line_per_record() {
        let records = vec![
            record("01-001", "Smith", "1 Main St", 1200),
            record("01-002", "Jones", "2 Main St", 0),
            record("01-003", "Brown", "N/A", 640),
        ];
        let csv = to_csv(&records);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), records.len() + 1);
        assert_eq!(lines[0], "Parcel,Owner 1,Address,Square Footage");
        assert_eq!(lines[1], "01-001,Smith,1 Main St,1200");
        assert_eq!(lines[3], "01-003,Brown,N/A,640");
    }

    #[test]
    fn empty_record_set_is_header_only() {
        assert_eq!(to_csv(&[]).lines().count(), 1);
    }

    #[test]
    fn fields_with_commas_and_quotes_are_quoted() {
        let csv = to_csv(&[record("01-001", "Smith, John \"Jack\"", "1 Main St", 5)]);
        assert_eq!(
            csv.lines().nth(1),
            Some("01-001,\"Smith, John \"\"Jack\"\"\",1 Main St,5")
        );
    }

    #[test]
    fn filenames_get_csv_extension() {
        assert_eq!(normalize_filename("parcels"), "parcels.csv");
        assert_eq!(normalize_filename("report.CSV"), "report.CSV");
        assert_eq!(normalize_filename("../../etc/passwd"), "passwd.csv");
        assert_eq!(normalize_filename("  "), "parcels.csv");
        assert_eq!(normalize_filename("a\"b"), "ab.csv");
    }
}
