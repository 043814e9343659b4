use std::collections::HashSet;

use csv::ReaderBuilder;

use super::{RegistrationRecord, UNKNOWN_NAME, normalize_reg_no};
use crate::errors::AppError;

const REG_HEADER_HINTS: &[&str] = &["Reg", "Registration"];
const NAME_HEADERS: &[&str] = &["Name", "Name.1"];
const ATTENDANCE_HEADER: &str = "ATTENDANCE";

#[derive(Debug, Clone, Default)]
pub struct ParsedRoster {
    pub records: Vec<RegistrationRecord>,
    /// Normalized registration numbers seen more than once, in first-repeat order.
    pub duplicates: Vec<String>,
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    reg_no: usize,
    name: Option<usize>,
    attendance: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, AppError> {
        let reg_no = headers
            .iter()
            .position(|h| REG_HEADER_HINTS.iter().any(|hint| h.contains(hint)))
            .ok_or(AppError::MissingColumn)?;
        let name = headers.iter().position(|h| NAME_HEADERS.contains(&h));
        let attendance = headers.iter().position(|h| h == ATTENDANCE_HEADER);
        Ok(Self { reg_no, name, attendance })
    }
}

/// Parse a roster CSV export into normalized registration records.
pub fn parse(raw: &str) -> Result<ParsedRoster, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(AppError::MissingColumn);
    }
    let columns = Columns::locate(&headers)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let reg_no = normalize_reg_no(row.get(columns.reg_no).unwrap_or_default());
        if reg_no.is_empty() {
            continue;
        }
        let name = columns
            .name
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NAME)
            .to_string();
        let attended = columns
            .attendance
            .and_then(|i| row.get(i))
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        records.push(RegistrationRecord { reg_no, name, attended });
    }

    if records.is_empty() {
        return Err(AppError::EmptyResult);
    }

    let duplicates = find_duplicates(&records);
    if !duplicates.is_empty() {
        log::warn!("Found {} duplicate registration numbers: {}", duplicates.len(), duplicates.join(", "));
    }

    Ok(ParsedRoster { records, duplicates })
}

fn find_duplicates(records: &[RegistrationRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for record in records {
        if !seen.insert(record.reg_no.as_str()) && reported.insert(record.reg_no.as_str()) {
            duplicates.push(record.reg_no.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sheet_export_headers() {
        let csv = "Timestamp,Name,Reg. No.,ATTENDANCE\n\
                   2026-01-01,Asha, ab-123 ,TRUE\n\
                   2026-01-01,Ravi,b2,false\n";
        let parsed = parse(csv).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].reg_no, "AB-123");
        assert_eq!(parsed.records[0].name, "Asha");
        assert!(parsed.records[0].attended);
        assert!(!parsed.records[1].attended);
        assert!(parsed.duplicates.is_empty());
    }

    #[test]
    fn name_defaults_to_unknown() {
        let parsed = parse("Registration Number\nX1\n").unwrap();
        assert_eq!(parsed.records[0].name, UNKNOWN_NAME);
        assert!(!parsed.records[0].attended);
    }

    #[test]
    fn accepts_name_dot_one_header() {
        let parsed = parse("Name.1,RegNo\nMeera,m3\n").unwrap();
        assert_eq!(parsed.records[0].name, "Meera");
        assert_eq!(parsed.records[0].reg_no, "M3");
    }

    #[test]
    fn missing_reg_column_fails() {
        let err = parse("Name,Email\nAsha,a@x.org\n").unwrap_err();
        assert!(matches!(err, AppError::MissingColumn));
    }

    #[test]
    fn blank_reg_numbers_are_dropped() {
        let parsed = parse("Name,Reg\nAsha,A1\nNobody,   \nRavi,B2\n").unwrap();
        assert_eq!(parsed.records.len(), 2);
    }

    #[test]
    fn only_blank_rows_is_empty_result() {
        let err = parse("Name,Reg\nAsha,\nRavi, \n").unwrap_err();
        assert!(matches!(err, AppError::EmptyResult));
    }

    #[test]
    fn duplicates_reported_not_fatal() {
        let parsed = parse("Name,Reg\nAsha,a1\nAsha again, A1 \nRavi,B2\nThird,a1\n").unwrap();
        assert_eq!(parsed.records.len(), 4);
        assert_eq!(parsed.duplicates, vec!["A1".to_string()]);
    }

    #[test]
    fn short_rows_are_tolerated() {
        let parsed = parse("Reg,Name,ATTENDANCE\nA1\nB2,Ravi\n").unwrap();
        assert_eq!(parsed.records[0].name, UNKNOWN_NAME);
        assert_eq!(parsed.records[1].name, "Ravi");
    }
}
