//! CSV and JSON export of job offers.

use std::io::Write;

use serde::Serialize;

use crate::error::AppError;
use crate::models::JobOffer;

/// Column order of the CSV export.
pub const CSV_COLUMNS: [&str; 7] = [
    "job_title",
    "company",
    "location",
    "salary",
    "tags",
    "apply_link",
    "source",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    job_title: &'a str,
    company: &'a str,
    location: &'a str,
    salary: &'a str,
    tags: String,
    apply_link: &'a str,
    source: &'a str,
}

impl<'a> From<&'a JobOffer> for CsvRow<'a> {
    fn from(offer: &'a JobOffer) -> Self {
        Self {
            job_title: &offer.title,
            company: &offer.company,
            location: &offer.location,
            salary: offer.salary.as_deref().unwrap_or_default(),
            tags: offer.tags.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
            apply_link: &offer.apply_link,
            source: &offer.source,
        }
    }
}

/// Write offers as CSV with a header row. Tags are joined with ", ".
pub fn write_csv<W: Write>(offers: &[JobOffer], writer: W) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if offers.is_empty() {
        wtr.write_record(CSV_COLUMNS).map_err(csv_error)?;
    }
    for offer in offers {
        wtr.serialize(CsvRow::from(offer)).map_err(csv_error)?;
    }
    wtr.flush()
        .map_err(|e| AppError::Generic(format!("failed to flush CSV: {e}")))?;
    Ok(())
}

/// Write offers as a pretty-printed JSON array.
pub fn write_json<W: Write>(offers: &[JobOffer], writer: W) -> Result<(), AppError> {
    serde_json::to_writer_pretty(writer, offers)?;
    Ok(())
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Generic(format!("CSV export failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::offer;

    #[test]
    fn test_csv_has_header_and_rows() {
        let mut first = offer("remoteok", "Rust Dev", "1");
        first.salary = Some("$50,000 - $80,000".into());
        first.tags = ["rust", "tokio"].iter().map(|t| t.to_string()).collect();
        let second = offer("indeed", "Go, Senior", "2");

        let mut buf = Vec::new();
        write_csv(&[first, second], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], CSV_COLUMNS.join(","));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("\"$50,000 - $80,000\""));
        assert!(lines[1].contains("\"rust, tokio\""));
        assert!(lines[2].starts_with("\"Go, Senior\""));
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim(), CSV_COLUMNS.join(","));
    }

    #[test]
    fn test_json_export_parses_back() {
        let mut buf = Vec::new();
        write_json(&[offer("remoteok", "Rust Dev", "1")], &mut buf).unwrap();
        let parsed: Vec<JobOffer> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed[0].title, "Rust Dev");
    }

    #[test]
    fn test_csv_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        let file = std::fs::File::create(&path).unwrap();
        write_csv(&[offer("remoteok", "Rust Dev", "1")], file).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("https://remoteok.test/jobs/1"));
    }
}
