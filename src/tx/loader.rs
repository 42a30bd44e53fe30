use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::config::MalformedPolicy;
use crate::error::{Result, RiskError};

use super::types::{TransactionRecord, TxType};

/// Columns every input table must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "blockNumber",
    "timestamp",
    "from",
    "to",
    "value",
    "gasUsed",
    "tx_type",
    "contract_deploy",
    "hash",
];

/// Timestamp layouts accepted besides RFC 3339 and unix seconds. Naive values are UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Output timestamp layout, matching what the input tables use.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw CSV row; every field is parsed by hand so failures name the column.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "blockNumber")]
    block_number: String,
    timestamp: String,
    from: String,
    #[serde(default)]
    to: Option<String>,
    value: String,
    #[serde(rename = "gasUsed")]
    gas_used: String,
    tx_type: String,
    contract_deploy: String,
    hash: String,
}

/// Outcome of loading a transaction table.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<TransactionRecord>,
    pub skipped: Vec<RiskError>,
}

/// Load a transaction table from a CSV file.
pub fn load_transactions(path: impl AsRef<Path>, policy: MalformedPolicy) -> Result<LoadReport> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let report = read_transactions(file, policy)?;
    tracing::info!(
        path = %path.display(),
        records = report.records.len(),
        skipped = report.skipped.len(),
        "Loaded transaction table"
    );
    Ok(report)
}

/// Read a transaction table from any CSV source.
pub fn read_transactions<R: Read>(source: R, policy: MalformedPolicy) -> Result<LoadReport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(RiskError::malformed(1, column, "column is missing from header"));
        }
    }

    let mut report = LoadReport::default();

    // Byte records so a row with invalid UTF-8 is a row-level failure, not a read failure
    let mut bytes = csv::ByteRecord::new();
    while reader.read_byte_record(&mut bytes)? {
        let line = bytes.position().map(|p| p.line()).unwrap_or(0);
        let parsed = csv::StringRecord::from_byte_record(bytes.clone())
            .map_err(|e| RiskError::malformed(line, "row", format!("is not valid UTF-8: {}", e.utf8_error())))
            .and_then(|row| {
                row.deserialize::<RawRow>(Some(&headers))
                    .map_err(|e| RiskError::malformed(line, "row", e.to_string()))
            })
            .and_then(|raw| parse_row(raw, line));

        match parsed {
            Ok(record) => report.records.push(record),
            Err(e) if e.is_row_level() && policy == MalformedPolicy::Skip => {
                tracing::warn!(error = %e, "Skipping malformed transaction row");
                report.skipped.push(e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

fn parse_row(raw: RawRow, line: u64) -> Result<TransactionRecord> {
    let block_number = parse_count(&raw.block_number, line, "blockNumber")?;
    let timestamp = parse_timestamp(&raw.timestamp)
        .ok_or_else(|| RiskError::malformed(line, "timestamp", format!("is not a date-time: '{}'", raw.timestamp)))?;

    if raw.from.is_empty() {
        return Err(RiskError::malformed(line, "from", "is empty"));
    }

    let value: f64 = raw
        .value
        .parse()
        .map_err(|_| RiskError::malformed(line, "value", format!("is not a number: '{}'", raw.value)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(RiskError::malformed(
            line,
            "value",
            format!("must be a finite non-negative amount, got '{}'", raw.value),
        ));
    }

    let gas_used = parse_count(&raw.gas_used, line, "gasUsed")?;
    let contract_deploy = parse_flag(&raw.contract_deploy)
        .ok_or_else(|| RiskError::malformed(line, "contract_deploy", format!("is not a boolean: '{}'", raw.contract_deploy)))?;

    let to_address = raw.to.filter(|to| !to.is_empty());
    if contract_deploy != to_address.is_none() {
        tracing::debug!(
            line,
            hash = %raw.hash,
            contract_deploy,
            "contract_deploy flag disagrees with recipient presence"
        );
    }

    Ok(TransactionRecord {
        block_number,
        timestamp,
        from_address: raw.from,
        to_address,
        value,
        gas_used,
        tx_type: TxType::from_code(&raw.tx_type),
        contract_deploy,
        hash: raw.hash,
    })
}

/// Non-negative integer, tolerating integral floats such as "21000.0".
fn parse_count(text: &str, line: u64, field: &'static str) -> Result<u64> {
    if let Ok(n) = text.parse::<u64>() {
        return Ok(n);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(RiskError::malformed(
            line,
            field,
            format!("is not a non-negative integer: '{}'", text),
        )),
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(true),
        "0" | "0.0" | "false" => Some(false),
        _ => None,
    }
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    text.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Write any serializable rows as a CSV table with a header line.
///
/// Serde derives the header from the first row, so `header` is written
/// explicitly only when there are no rows.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, header: &[&str], rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Wrote CSV table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const HEADER: &str = "blockNumber,timestamp,from,to,value,gasUsed,tx_type,contract_deploy,hash\n";

    fn read(body: &str, policy: MalformedPolicy) -> Result<LoadReport> {
        read_transactions(format!("{HEADER}{body}").as_bytes(), policy)
    }

    #[test]
    fn test_parse_well_formed_rows() {
        let report = read(
            "100,2024-03-01 14:05:00,0xAa,0xbb,6.5,21000,0x2,0,0xh1\n\
             101,2024-03-01T15:00:00Z,0xcc,,0,300000.0,0x9,1,0xh2\n",
            MalformedPolicy::Abort,
        )
        .unwrap();

        assert_eq!(report.records.len(), 2);
        assert!(report.skipped.is_empty());

        let first = &report.records[0];
        assert_eq!(first.block_number, 100);
        assert_eq!(first.timestamp.hour(), 14);
        assert_eq!(first.to_address.as_deref(), Some("0xbb"));
        assert_eq!(first.tx_type, TxType::DynamicFee);
        assert!(!first.contract_deploy);

        let second = &report.records[1];
        assert_eq!(second.to_address, None);
        assert_eq!(second.gas_used, 300_000);
        assert!(second.contract_deploy);
        assert_eq!(second.tx_type, TxType::Unknown("0x9".to_string()));
    }

    #[test]
    fn test_skip_policy_drops_bad_rows() {
        let report = read(
            "100,not-a-date,0xaa,0xbb,1,21000,0x0,0,0xh1\n\
             101,2024-03-01 10:00:00,0xaa,0xbb,NaN,21000,0x0,0,0xh2\n\
             102,2024-03-01 10:00:00,0xaa,0xbb,1,21000,0x0,0,0xh3\n",
            MalformedPolicy::Skip,
        )
        .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].hash, "0xh3");
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(
            report.skipped[1],
            RiskError::MalformedRecord { field: "value", .. }
        ));
    }

    #[test]
    fn test_abort_policy_fails_on_first_bad_row() {
        let err = read(
            "100,2024-03-01 10:00:00,0xaa,0xbb,1,lots,0x0,0,0xh1\n",
            MalformedPolicy::Abort,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RiskError::MalformedRecord { field: "gasUsed", .. }
        ));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let err = read_transactions(
            "blockNumber,timestamp,from,to,value\n1,2024-03-01 10:00:00,0xaa,0xbb,1\n".as_bytes(),
            MalformedPolicy::Skip,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RiskError::MalformedRecord { field: "gasUsed", .. }
        ));
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let mut table = HEADER.as_bytes().to_vec();
        table.extend_from_slice(b"100,2024-03-01 10:00:00,0xaa,0xbb,1,21000,0x0,0,0xh1\n");
        table.extend_from_slice(b"101,2024-03-01 10:00:00,0x\xff\xfe,0xbb,1,21000,0x0,0,0xh2\n");
        table.extend_from_slice(b"102,2024-03-01 10:00:00,0xcc,0xbb,1,21000,0x0,0,0xh3\n");

        let report = read_transactions(table.as_slice(), MalformedPolicy::Skip).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].hash, "0xh3");
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0],
            RiskError::MalformedRecord { line: 3, field: "row", .. }
        ));

        let err = read_transactions(table.as_slice(), MalformedPolicy::Abort).unwrap_err();
        assert!(err.is_row_level());
    }

    #[test]
    fn test_empty_table_keeps_header() {
        #[derive(Serialize)]
        struct Row {
            a: u8,
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv::<Row>(&path, &["a"], &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01 10:00:00").is_some());
        assert!(parse_timestamp("2024-03-01 10:00:00.250").is_some());
        // offsets are normalized to UTC before the hour is taken
        assert_eq!(parse_timestamp("2024-03-01T10:00:00+02:00").map(|t| t.hour()), Some(8));
        assert_eq!(parse_timestamp("0").map(|t| t.hour()), Some(0));
        assert!(parse_timestamp("yesterday").is_none());
    }
}
