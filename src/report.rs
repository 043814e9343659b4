use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::roster::SnapshotEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Registration Number")]
    pub reg_no: String,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Registration Number")]
    pub reg_no: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

const FULL_HEADERS: &[&str] = &["Name", "Registration Number", "Status", "Timestamp"];
const PRESENT_HEADERS: &[&str] = &["Name", "Registration Number", "Timestamp"];

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn full_report(snapshot: &[SnapshotEntry]) -> Vec<FullRow> {
    snapshot
        .iter()
        .map(|entry| FullRow {
            name: entry.record.name.clone(),
            reg_no: entry.record.reg_no.clone(),
            status: if entry.present { Status::Present } else { Status::Absent },
            timestamp: entry.timestamp.map(format_timestamp).unwrap_or_default(),
        })
        .collect()
}

pub fn present_only_report(snapshot: &[SnapshotEntry]) -> Vec<PresentRow> {
    snapshot
        .iter()
        .filter_map(|entry| {
            let at = entry.timestamp?;
            Some(PresentRow {
                name: entry.record.name.clone(),
                reg_no: entry.record.reg_no.clone(),
                timestamp: format_timestamp(at),
            })
        })
        .collect()
}

/// Serialize report rows, always emitting the header row.
fn to_csv<T: Serialize>(headers: &[&str], rows: &[T]) -> Result<String, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::ExportFailed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::ExportFailed(e.to_string()))
}

pub fn full_report_csv(snapshot: &[SnapshotEntry]) -> Result<String, AppError> {
    to_csv(FULL_HEADERS, &full_report(snapshot)).map_err(export_failed)
}

pub fn present_only_csv(snapshot: &[SnapshotEntry]) -> Result<String, AppError> {
    to_csv(PRESENT_HEADERS, &present_only_report(snapshot)).map_err(export_failed)
}

fn export_failed(e: AppError) -> AppError {
    match e {
        AppError::ExportFailed(_) => e,
        other => AppError::ExportFailed(other.to_string()),
    }
}

pub fn full_report_filename(date: NaiveDate) -> String {
    format!("attendance_{}.csv", date.format("%Y-%m-%d"))
}

pub fn present_report_filename(date: NaiveDate) -> String {
    format!("present_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RegistrationRecord;
    use chrono::TimeZone;

    fn snapshot() -> (Vec<SnapshotEntry>, DateTime<Utc>) {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let entry = |reg: &str, name: &str, ts: Option<DateTime<Utc>>| SnapshotEntry {
            record: RegistrationRecord::new(reg, name),
            present: ts.is_some(),
            timestamp: ts,
        };
        (
            vec![
                entry("A1", "Asha", None),
                entry("B2", "Ravi, Jr.", Some(at)),
                entry("C3", "Meera", None),
            ],
            at,
        )
    }

    #[test]
    fn full_report_covers_every_record() {
        let (snap, at) = snapshot();
        let rows = full_report(&snap);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].status, Status::Present);
        assert_eq!(rows[1].timestamp, format_timestamp(at));
        assert_eq!(rows[0].status, Status::Absent);
        assert!(rows[0].timestamp.is_empty());
        assert!(rows[2].timestamp.is_empty());
    }

    #[test]
    fn present_only_filters() {
        let (snap, _) = snapshot();
        let rows = present_only_report(&snap);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reg_no, "B2");
        assert!(!rows[0].timestamp.is_empty());
    }

    #[test]
    fn csv_output_is_quoted_and_headed() {
        let (snap, _) = snapshot();
        let csv = full_report_csv(&snap).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Name,Registration Number,Status,Timestamp"));
        assert_eq!(lines.next(), Some("Asha,A1,Absent,"));
        assert_eq!(lines.next(), Some("\"Ravi, Jr.\",B2,Present,2026-03-01T09:30:00.000Z"));
    }

    #[test]
    fn empty_present_report_still_has_header() {
        let csv = present_only_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), "Name,Registration Number,Timestamp");
    }

    #[test]
    fn filenames_embed_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(full_report_filename(date), "attendance_2026-10-18.csv");
        assert_eq!(present_report_filename(date), "present_2026-10-18.csv");
    }
}
