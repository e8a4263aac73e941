//! Reads listing records from a JSONL export and normalizes them for
//! indexing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::property::PropertyRecord;
use crate::error::{Error, Result};

static NON_DIGITS: OnceLock<Regex> = OnceLock::new();

/// Derives the numeric point id from an upstream listing id by stripping
/// every non-digit character. Returns `None` when nothing numeric remains.
pub fn derive_id(listing_id: &str) -> Option<u64> {
    let re = NON_DIGITS.get_or_init(|| Regex::new(r"[^0-9]").expect("static pattern"));
    let digits = re.replace_all(listing_id, "");
    match digits.parse::<u64>() {
        Ok(id) if id > 0 => Some(id),
        _ => None,
    }
}

/// Fills the numeric id from the listing id when absent and lowercases the
/// address and city, matching how records are keyed and compared downstream.
pub fn normalize_record(mut record: PropertyRecord) -> Result<PropertyRecord> {
    if record.id == 0 {
        record.id = derive_id(&record.listing_id).ok_or_else(|| {
            Error::Validation(format!(
                "listing '{}' has no usable numeric identifier",
                record.listing_id
            ))
        })?;
    }
    record.full_address = record.full_address.to_lowercase();
    record.city = record.city.map(|city| city.to_lowercase());
    Ok(record)
}

/// Reads one record per line. Unparseable or unidentifiable lines are
/// logged and skipped so one bad record never sinks the batch.
pub fn read_jsonl(path: &Path) -> Result<Vec<PropertyRecord>> {
    let file = File::open(path)
        .map_err(|e| Error::TransientIo(format!("open {}: {e}", path.display())))?;

    let mut records = Vec::new();
    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::TransientIo(format!("read {}: {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PropertyRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping line {} of {}: {e}", line_number + 1, path.display());
                continue;
            }
        };
        match normalize_record(record) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping line {} of {}: {e}", line_number + 1, path.display()),
        }
    }

    log::info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{derive_id, normalize_record, read_jsonl};
    use crate::domain::property::PropertyRecord;

    #[test]
    fn derive_id_keeps_only_digits() {
        assert_eq!(derive_id("NYC-12345-B7"), Some(123_457));
        assert_eq!(derive_id("X334228797Z20"), Some(33_422_879_720));
        assert_eq!(derive_id("no digits"), None);
        assert_eq!(derive_id("000"), None);
    }

    #[test]
    fn normalization_lowercases_address_and_city() {
        let record = PropertyRecord {
            listing_id: "A17".into(),
            full_address: "12 Main ST".into(),
            city: Some("Brooklyn".into()),
            ..Default::default()
        };

        let normalized = normalize_record(record).expect("normalizes");
        assert_eq!(normalized.id, 17);
        assert_eq!(normalized.full_address, "12 main st");
        assert_eq!(normalized.city.as_deref(), Some("brooklyn"));
    }

    #[test]
    fn explicit_ids_are_left_alone() {
        let record = PropertyRecord {
            id: 99,
            listing_id: "A17".into(),
            ..Default::default()
        };
        assert_eq!(normalize_record(record).expect("normalizes").id, 99);
    }

    #[test]
    fn jsonl_reader_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"listing_id": "L1", "full_address": "1 Elm St"}}"#).expect("write");
        writeln!(file, "not json").expect("write");
        writeln!(file, r#"{{"listing_id": "no-digits", "full_address": "2 Elm St"}}"#)
            .expect("write");
        writeln!(file, r#"{{"id": 4, "listing_id": "L4", "full_address": "4 Elm St"}}"#)
            .expect("write");

        let records = read_jsonl(file.path()).expect("reads");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 4);
    }
}
