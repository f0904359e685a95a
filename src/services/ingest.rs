//! Log-export ingestion.
//!
//! Container traversal (ZIP/RAR) is an external collaborator behind
//! [`ArchiveOpener`]; this module consumes decoded (sub-path, text) entries,
//! extracts the crane id and report date from the path, parses the
//! tab-delimited rows and writes resolved records to storage.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{FaultReference, RawEvent};
use crate::repository::{FaultRepository, MaintenanceRepository};

/// Crane id inside a sub-path: digits following the `fc` prefix,
/// case-insensitive, optional separating space, optional leading zeros.
/// Matches `fc01`, `FC 01`, `fc 001`, `3. March/FC 12`.
static CRANE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)fc\s*0*(\d+)").unwrap());

/// Report date in a filename stem: 8-digit year-month-day.
static FILE_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());

/// Columns emitted by the crane PLC log exporter. Header names are part of
/// the wire format.
const COL_TIME: &str = "waktu";
const COL_ACT: &str = "act";
const COL_FAULT: &str = "fault_name";

/// One decoded file from a compressed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Sub-path inside the container, `/`-separated.
    pub path: String,
    /// Decoded text content.
    pub text: String,
}

/// Container format, chosen by the upload MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
}

/// Decodes a compressed container into its file entries. External
/// collaborator; tests use an in-memory fake.
pub trait ArchiveOpener: Send + Sync {
    fn entries(&self, bytes: &[u8], kind: ArchiveKind) -> anyhow::Result<Vec<ArchiveEntry>>;
}

/// Decode raw export bytes to text. The PLC exports are UTF-16 with a BOM;
/// anything else is treated as UTF-8.
pub fn decode_export_bytes(bytes: &[u8]) -> String {
    let utf16 = |chunks: &mut dyn Iterator<Item = u16>| {
        let units: Vec<u16> = chunks.collect();
        String::from_utf16_lossy(&units)
    };
    match bytes {
        [0xFF, 0xFE, rest @ ..] => {
            utf16(&mut rest.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]])))
        }
        [0xFE, 0xFF, rest @ ..] => {
            utf16(&mut rest.chunks_exact(2).map(|b| u16::from_be_bytes([b[0], b[1]])))
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Extract the crane id from the folder portion of a container sub-path.
pub fn extract_crane_id(path: &str) -> Option<i32> {
    let (folder, _file) = path.rsplit_once('/')?;
    let caps = CRANE_ID.captures(folder)?;
    caps[1].parse().ok()
}

/// Extract the report date from the filename stem (`YYYYMMDD.csv`).
pub fn extract_file_date(path: &str) -> Option<NaiveDate> {
    let file = path.rsplit_once('/').map_or(path, |(_, f)| f);
    let stem = file.rsplit_once('.').map_or(file, |(s, _)| s);
    let caps = FILE_DATE.captures(stem)?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files that produced at least one parsed row.
    pub files: usize,
    /// Rows written to storage.
    pub rows: usize,
    /// Rows or files skipped as malformed.
    pub skipped: usize,
}

/// Ingestion pipeline: entries in, resolved maintenance records out.
#[derive(Clone)]
pub struct Ingestor {
    faults: FaultRepository,
    records: MaintenanceRepository,
}

impl Ingestor {
    pub fn new(faults: FaultRepository, records: MaintenanceRepository) -> Self {
        Self { faults, records }
    }

    /// Ingest every CSV entry of a decoded container.
    ///
    /// Entries whose path yields no crane id or report date are skipped with
    /// a warning; a malformed row never aborts its file.
    pub async fn ingest_entries(&self, entries: &[ArchiveEntry]) -> anyhow::Result<IngestReport> {
        let mut report = IngestReport::default();

        for entry in entries {
            if !entry.path.to_ascii_lowercase().ends_with(".csv") {
                continue;
            }
            let Some(crane_id) = extract_crane_id(&entry.path) else {
                warn!(path = %entry.path, "no crane id in sub-path, skipping file");
                report.skipped += 1;
                continue;
            };
            let Some(event_date) = extract_file_date(&entry.path) else {
                warn!(path = %entry.path, "no report date in filename, skipping file");
                report.skipped += 1;
                continue;
            };

            let (rows, skipped) = self
                .ingest_file(crane_id, event_date, &entry.text)
                .await?;
            debug!(path = %entry.path, crane_id, rows, skipped, "ingested file");
            if rows > 0 {
                report.files += 1;
            }
            report.rows += rows;
            report.skipped += skipped;
        }

        Ok(report)
    }

    /// Parse and store the rows of one export file.
    ///
    /// The first line is either a named header (`waktu`/`act`/`fault_name`
    /// in any column order) or discarded, with the positional layout
    /// time/act/fault assumed for the rest.
    async fn ingest_file(
        &self,
        crane_id: i32,
        event_date: NaiveDate,
        text: &str,
    ) -> anyhow::Result<(usize, usize)> {
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
        let Some(first) = lines.next() else {
            return Ok((0, 0));
        };

        let header: Vec<&str> = first.split('\t').map(str::trim).collect();
        let named = header.contains(&COL_TIME)
            && header.contains(&COL_ACT)
            && header.contains(&COL_FAULT);
        let column = |name: &str| header.iter().position(|&h| h == name);
        let (time_col, act_col, fault_col) = if named {
            // Header order is not fixed across export versions.
            (
                column(COL_TIME).unwrap_or(0),
                column(COL_ACT).unwrap_or(1),
                column(COL_FAULT).unwrap_or(2),
            )
        } else {
            (0, 1, 2)
        };

        // Per-file resolution cache: one get-or-create round trip per
        // distinct fault name, owned by this run rather than shared state.
        let mut resolved: HashMap<String, FaultReference> = HashMap::new();
        let mut batch: Vec<(RawEvent, i32)> = Vec::new();
        let mut skipped = 0usize;

        for line in lines {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let get = |idx: usize| fields.get(idx).map(|f| f.trim()).unwrap_or("");

            let event_time = get(time_col);
            let fault_name = get(fault_col);
            let act: i32 = match get(act_col).parse() {
                Ok(value) => value,
                Err(_) => {
                    warn!(line, "unparsable activity code, skipping row");
                    skipped += 1;
                    continue;
                }
            };
            if event_time.is_empty() || fault_name.is_empty() {
                warn!(line, "missing time or fault name, skipping row");
                skipped += 1;
                continue;
            }

            let reference = match resolved.get(fault_name) {
                Some(reference) => reference.clone(),
                None => {
                    let reference = self.faults.get_or_create(fault_name).await?;
                    resolved.insert(fault_name.to_string(), reference.clone());
                    reference
                }
            };

            batch.push((
                RawEvent {
                    event_date,
                    event_time: event_time.to_string(),
                    act,
                    fault_name: fault_name.to_string(),
                    crane_id,
                },
                reference.fault_id,
            ));
        }

        let written = self.records.insert_events(&batch).await?;
        Ok((written, skipped))
    }

    /// Import a fault library export: tab-delimited, data rows from index 2,
    /// column 7 holds the `(code)name` entry. Returns the number of entries
    /// processed; duplicates are ignored by the store.
    pub async fn import_fault_library(&self, text: &str) -> anyhow::Result<usize> {
        let mut imported = 0usize;

        for line in text.lines().skip(2) {
            let fields: Vec<&str> = line.split('\t').collect();
            let Some(raw) = fields.get(6).map(|f| f.trim()) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let (code, name) = FaultReference::normalize(raw);
            self.faults
                .import_reference(code.as_deref(), &name)
                .await?;
            imported += 1;
        }

        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{migrations, AsyncSqlitePool};
    use tempfile::tempdir;

    #[test]
    fn crane_id_pattern_variants() {
        assert_eq!(extract_crane_id("load/fc01/20240301.csv"), Some(1));
        assert_eq!(extract_crane_id("3. March/FC 12/20240301.csv"), Some(12));
        assert_eq!(extract_crane_id("backup/fc 001/20240301.csv"), Some(1));
        assert_eq!(extract_crane_id("misc/crane5/20240301.csv"), None);
        // Bare filename has no folder to search.
        assert_eq!(extract_crane_id("20240301.csv"), None);
    }

    #[test]
    fn file_date_from_stem() {
        assert_eq!(
            extract_file_date("load/fc01/20240301.csv"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(extract_file_date("load/fc01/notes.csv"), None);
        assert_eq!(extract_file_date("load/fc01/2024030.csv"), None);
    }

    #[test]
    fn utf16_bom_decoding() {
        let text = "waktu\tact\tfault_name";
        let mut le = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_export_bytes(&le), text);
        assert_eq!(decode_export_bytes(text.as_bytes()), text);
    }

    async fn setup() -> (Ingestor, MaintenanceRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = AsyncSqlitePool::from_path(&dir.path().join("test.db"));
        migrations::run(&pool).await.unwrap();
        let records = MaintenanceRepository::new(pool.clone());
        (
            Ingestor::new(FaultRepository::new(pool), records.clone()),
            records,
            dir,
        )
    }

    fn march() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn ingest_with_named_header() {
        let (ingestor, records, _dir) = setup().await;

        let entry = ArchiveEntry {
            path: "load/fc02/20240301.csv".to_string(),
            text: "fault_name\twaktu\tact\n(175)Brake Fail\t10:00:00\t1\n(175)Brake Fail\t10:00:30\t1\n"
                .to_string(),
        };
        let report = ingestor.ingest_entries(&[entry]).await.unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.rows, 2);
        assert_eq!(report.skipped, 0);

        let (start, end) = march();
        let stored = records
            .records_in_range(start, end, Some(2), None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].fault.name, "Brake Fail");
        assert_eq!(stored[0].fault.code.as_deref(), Some("175"));
        // Both rows resolve to the same surrogate key.
        assert_eq!(stored[0].fault.fault_id, stored[1].fault.fault_id);
    }

    #[tokio::test]
    async fn ingest_positional_skips_first_line_and_bad_rows() {
        let (ingestor, records, _dir) = setup().await;

        let entry = ArchiveEntry {
            path: "FC 01/20240302.csv".to_string(),
            text: "time\tcode\tfault\n08:00:00\t1\tHoist Overload\n08:05:00\tnan\tHoist Overload\n\n08:10:00\t2\tHoist Overload\n"
                .to_string(),
        };
        let report = ingestor.ingest_entries(&[entry]).await.unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.skipped, 1);

        let (start, end) = march();
        let stored = records
            .records_in_range(start, end, Some(1), None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn non_csv_and_unmatched_paths_are_skipped() {
        let (ingestor, _records, _dir) = setup().await;

        let report = ingestor
            .ingest_entries(&[
                ArchiveEntry {
                    path: "load/fc01/readme.txt".to_string(),
                    text: String::new(),
                },
                ArchiveEntry {
                    path: "load/nodigits/20240301.csv".to_string(),
                    text: String::new(),
                },
                ArchiveEntry {
                    path: "load/fc01/undated.csv".to_string(),
                    text: String::new(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(report.files, 0);
        assert_eq!(report.rows, 0);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn fault_library_import() {
        let (ingestor, _records, _dir) = setup().await;

        let text = "title row\nunits row\n\
            a\tb\tc\td\te\tf\t(175)Brake Fail\n\
            a\tb\tc\td\te\tf\t(201)Hoist Overload\n\
            a\tb\tc\td\te\tf\t(175)Brake Fail\n\
            short\trow\n";
        let imported = ingestor.import_fault_library(text).await.unwrap();
        assert_eq!(imported, 3);

        let matches = ingestor.faults.search("Brake").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].code.as_deref(), Some("175"));
    }
}
