//! Timestamped snapshot files.
//!
//! A raw backup is `raw_data_<stamp>.json`; reshaped tables are
//! `table_<name>_<stamp>.csv`. Files are never overwritten, so every run
//! leaves its own generation on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime, Timelike};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::record::{RawRow, Snapshot};

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const RAW_LOGICAL: &str = "raw_data";
pub const INDEX_COLUMN: &str = "char";

static FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<logical>.+)_(?P<stamp>\d{8}_\d{6})\.(?P<ext>[A-Za-z0-9]+)$").unwrap()
});

// ── Naming ──

/// Second-resolution generation stamp, `YYYYMMDD_HHMMSS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(NaiveDateTime);

impl Stamp {
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Stamp(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, STAMP_FORMAT).ok().map(Stamp)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(STAMP_FORMAT))
    }
}

pub fn file_name(logical: &str, ext: &str, stamp: Stamp) -> String {
    format!("{}_{}.{}", logical, stamp, ext)
}

/// Split `<logical>_<stamp>.<ext>` back into its parts.
pub fn parse_file_name(name: &str) -> Option<(&str, Stamp, &str)> {
    let caps = FILE_RE.captures(name)?;
    let stamp = Stamp::parse(caps.name("stamp")?.as_str())?;
    Some((caps.name("logical")?.as_str(), stamp, caps.name("ext")?.as_str()))
}

/// Open a fresh file for writing; an existing file is an error.
fn create_new(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_path_buf()),
            _ => StoreError::Io(e),
        })
}

// ── Raw backups ──

pub fn create_backup(dir: &Path, snapshot: &Snapshot) -> StoreResult<PathBuf> {
    create_backup_at(dir, snapshot, Stamp::now())
}

/// Write `snapshot` as `raw_data_<stamp>.json` in `dir`.
pub fn create_backup_at(dir: &Path, snapshot: &Snapshot, stamp: Stamp) -> StoreResult<PathBuf> {
    let path = dir.join(file_name(RAW_LOGICAL, "json", stamp));
    let mut writer = BufWriter::new(create_new(&path)?);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;
    info!("Backup written: {} ({} characters)", path.display(), snapshot.len());
    Ok(path)
}

/// Read a raw backup as one row per character.
pub fn read_backup(path: &Path) -> StoreResult<Vec<RawRow>> {
    let reader = BufReader::new(File::open(path)?);
    let snapshot: Snapshot = serde_json::from_reader(reader)?;
    Ok(snapshot
        .into_iter()
        .map(|(name, record)| RawRow { name, record })
        .collect())
}

// ── Tables ──

/// A row of a reshaped table, in header order.
pub trait TableRow {
    fn headers() -> Vec<String>;
    fn cells(&self) -> Vec<String>;
}

/// Write rows as `<logical>_<stamp>.csv` with a header line.
pub fn write_table<R: TableRow>(
    dir: &Path,
    logical: &str,
    stamp: Stamp,
    rows: &[R],
) -> StoreResult<PathBuf> {
    let path = dir.join(file_name(logical, "csv", stamp));
    let mut writer = csv::Writer::from_writer(create_new(&path)?);
    writer.write_record(R::headers())?;
    for row in rows {
        writer.write_record(row.cells())?;
    }
    writer.flush()?;
    debug!("Table written: {} ({} rows)", path.display(), rows.len());
    Ok(path)
}

/// A table loaded back from CSV, indexed by its `char` column.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    index: usize,
}

impl Frame {
    pub fn read_csv(path: &Path) -> StoreResult<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let index = columns
            .iter()
            .position(|c| c == INDEX_COLUMN)
            .ok_or_else(|| StoreError::MissingColumn {
                path: path.to_path_buf(),
                column: INDEX_COLUMN.to_string(),
            })?;
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Frame {
            columns,
            rows,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Character key of every row, in file order.
    pub fn index(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r[self.index].as_str())
    }

    /// All rows belonging to one character.
    pub fn rows_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [String]> {
        self.rows
            .iter()
            .filter(move |r| r[self.index] == name)
            .map(Vec::as_slice)
    }

    /// First value of `column` for `name`; empty cells read as `None`.
    pub fn get(&self, name: &str, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r[self.index] == name)
            .map(|r| r[col].as_str())
            .filter(|v| !v.is_empty())
    }
}

// ── Latest generation ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Table,
    Raw,
}

impl SnapshotKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SnapshotKind::Table => "table",
            SnapshotKind::Raw => "raw",
        }
    }

    fn accepts(self, logical: &str, ext: &str) -> bool {
        match self {
            SnapshotKind::Table => logical.starts_with("table_") && ext == "csv",
            SnapshotKind::Raw => logical == RAW_LOGICAL && ext == "json",
        }
    }
}

impl FromStr for SnapshotKind {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(SnapshotKind::Table),
            "raw" => Ok(SnapshotKind::Raw),
            _ => Err(StoreError::InvalidKind(s.to_string())),
        }
    }
}

/// The newest snapshot generation of one kind.
#[derive(Debug)]
pub enum Generation {
    /// Tables keyed by `table_<name>`.
    Tables {
        stamp: Stamp,
        tables: BTreeMap<String, Frame>,
    },
    Raw {
        stamp: Stamp,
        rows: Vec<RawRow>,
    },
}

impl Generation {
    pub fn stamp(&self) -> Stamp {
        match self {
            Generation::Tables { stamp, .. } | Generation::Raw { stamp, .. } => *stamp,
        }
    }
}

/// Load the newest generation of `kind` ("table" or "raw") from `dir`.
///
/// The kind is validated before the directory is touched. The newest
/// generation is the greatest stamp; files sharing a stamp are broken by
/// creation time.
pub fn resolve_latest(dir: &Path, kind: &str) -> StoreResult<Generation> {
    let kind: SnapshotKind = kind.parse()?;

    let mut candidates: Vec<(Stamp, SystemTime, String)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(kind.prefix()) {
            continue;
        }
        let Some((logical, stamp, ext)) = parse_file_name(&name) else {
            debug!("Skipping unstamped file: {}", name);
            continue;
        };
        if !kind.accepts(logical, ext) {
            continue;
        }
        let meta = entry.metadata()?;
        let created = meta.created().or_else(|_| meta.modified())?;
        candidates.push((stamp, created, name));
    }

    let (stamp, _, _) = candidates
        .iter()
        .max_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)))
        .cloned()
        .ok_or_else(|| StoreError::NoSnapshot {
            kind: kind.prefix(),
            dir: dir.to_path_buf(),
        })?;
    info!("Latest {} snapshot: {}", kind.prefix(), stamp);

    match kind {
        SnapshotKind::Table => {
            let mut tables = BTreeMap::new();
            for (_, _, name) in candidates.iter().filter(|c| c.0 == stamp) {
                if let Some((logical, _, _)) = parse_file_name(name) {
                    tables.insert(logical.to_string(), Frame::read_csv(&dir.join(name))?);
                }
            }
            Ok(Generation::Tables { stamp, tables })
        }
        SnapshotKind::Raw => {
            let path = dir.join(file_name(RAW_LOGICAL, "json", stamp));
            let rows = read_backup(&path)?;
            Ok(Generation::Raw { stamp, rows })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::record::{Field, Record};

    fn stamp(s: &str) -> Stamp {
        Stamp::parse(s).unwrap()
    }

    fn record(url: &str) -> Record {
        let scanned =
            NaiveDateTime::parse_from_str("2024-05-01T12:30:00.250", "%Y-%m-%dT%H:%M:%S%.f")
                .unwrap();
        let mut record = Record::from_fields(url, scanned, &HashMap::new());
        record.char_type = Field::Value("攻擊型".into());
        record.s1 = Field::Value("火球\n敵方\n造成傷害".into());
        record
    }

    fn snapshot() -> Snapshot {
        Snapshot::from([
            ("魯迪".to_string(), record("https://wiki.example/c/1")),
            ("卡林".to_string(), record("https://wiki.example/c/2")),
        ])
    }

    struct Pair(&'static str, &'static str);

    impl TableRow for Pair {
        fn headers() -> Vec<String> {
            vec!["char".into(), "value".into()]
        }
        fn cells(&self) -> Vec<String> {
            vec![self.0.into(), self.1.into()]
        }
    }

    #[test]
    fn stamp_format() {
        let s = stamp("20240501_123000");
        assert_eq!(s.to_string(), "20240501_123000");
        assert_eq!(file_name("raw_data", "json", s), "raw_data_20240501_123000.json");
        assert!(Stamp::parse("2024-05-01").is_none());
        assert!(stamp("20240501_123000") < stamp("20240501_123001"));
    }

    #[test]
    fn file_name_parts() {
        let (logical, s, ext) = parse_file_name("table_skills_20240501_123000.csv").unwrap();
        assert_eq!(logical, "table_skills");
        assert_eq!(s, stamp("20240501_123000"));
        assert_eq!(ext, "csv");
        assert!(parse_file_name("notes.txt").is_none());
    }

    #[test]
    fn backup_round_trip() {
        let dir = TempDir::new().unwrap();
        let original = snapshot();
        let path = create_backup(dir.path(), &original).unwrap();

        let rows = read_backup(&path).unwrap();
        assert_eq!(rows.len(), original.len());
        for row in rows {
            assert_eq!(&row.record, &original[&row.name]);
        }
    }

    #[test]
    fn backup_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let s = stamp("20240501_123000");
        let path = create_backup_at(dir.path(), &snapshot(), s).unwrap();
        let before = fs::read(&path).unwrap();

        let err = create_backup_at(dir.path(), &Snapshot::new(), s).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(p) if p == path));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn invalid_kind_before_io() {
        let missing = Path::new("/definitely/not/a/real/dir");
        let err = resolve_latest(missing, "invalid").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKind(k) if k == "invalid"));
    }

    #[test]
    fn kind_is_case_insensitive() {
        assert_eq!("TABLE".parse::<SnapshotKind>().unwrap(), SnapshotKind::Table);
        assert_eq!("raw".parse::<SnapshotKind>().unwrap(), SnapshotKind::Raw);
    }

    #[test]
    fn no_snapshot() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let err = resolve_latest(dir.path(), "raw").unwrap_err();
        assert!(matches!(err, StoreError::NoSnapshot { kind: "raw", .. }));
    }

    #[test]
    fn latest_raw_by_stamp() {
        let dir = TempDir::new().unwrap();
        let newer = stamp("20240502_080000");
        create_backup_at(dir.path(), &snapshot(), newer).unwrap();
        // Written later, stamped earlier.
        create_backup_at(dir.path(), &Snapshot::new(), stamp("20240501_235959")).unwrap();

        match resolve_latest(dir.path(), "raw").unwrap() {
            Generation::Raw { stamp, rows } => {
                assert_eq!(stamp, newer);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected raw generation, got {:?}", other),
        }
    }

    #[test]
    fn latest_tables_share_a_stamp() {
        let dir = TempDir::new().unwrap();
        let old = stamp("20240501_120000");
        let new = stamp("20240501_130000");
        write_table(dir.path(), "table_char", old, &[Pair("舊", "0")]).unwrap();
        write_table(dir.path(), "table_char", new, &[Pair("魯迪", "1")]).unwrap();
        write_table(
            dir.path(),
            "table_skills",
            new,
            &[Pair("魯迪", "s1"), Pair("魯迪", "s2")],
        )
        .unwrap();

        let generation = resolve_latest(dir.path(), "table").unwrap();
        assert_eq!(generation.stamp(), new);
        let Generation::Tables { tables, .. } = generation else {
            panic!("expected tables");
        };
        assert_eq!(
            tables.keys().cloned().collect::<Vec<_>>(),
            vec!["table_char", "table_skills"]
        );
        assert_eq!(tables["table_char"].get("魯迪", "value"), Some("1"));
        assert_eq!(tables["table_skills"].rows_for("魯迪").count(), 2);
        assert_eq!(tables["table_skills"].index().collect::<Vec<_>>(), vec!["魯迪", "魯迪"]);
    }

    #[test]
    fn stray_table_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let real = stamp("20240501_130000");
        write_table(dir.path(), "table_char", real, &[Pair("魯迪", "1")]).unwrap();
        // Newer stamps, but not table CSVs.
        fs::write(dir.path().join("table_notes_20240601_000000.txt"), "x").unwrap();
        fs::write(dir.path().join("table_draft.csv"), "char\n").unwrap();
        fs::write(dir.path().join("raw_data_20240601_000000.json"), "{}").unwrap();

        let generation = resolve_latest(dir.path(), "table").unwrap();
        assert_eq!(generation.stamp(), real);
        let Generation::Tables { tables, .. } = generation else {
            panic!("expected tables");
        };
        assert_eq!(tables.keys().cloned().collect::<Vec<_>>(), vec!["table_char"]);
    }

    #[test]
    fn same_stamp_files_form_one_generation() {
        let dir = TempDir::new().unwrap();
        let s = stamp("20240501_130000");
        // Written out of name order; creation time must not split them.
        write_table(dir.path(), "table_skills", s, &[Pair("魯迪", "s1")]).unwrap();
        write_table(dir.path(), "table_ascent", s, &[Pair("魯迪", "a1")]).unwrap();
        write_table(dir.path(), "table_char", s, &[Pair("魯迪", "c")]).unwrap();
        write_table(dir.path(), "table_char", stamp("20240501_125959"), &[Pair("舊", "0")])
            .unwrap();

        let Generation::Tables { stamp: got, tables } = resolve_latest(dir.path(), "TABLE").unwrap()
        else {
            panic!("expected tables");
        };
        assert_eq!(got, s);
        assert_eq!(
            tables.keys().cloned().collect::<Vec<_>>(),
            vec!["table_ascent", "table_char", "table_skills"]
        );
        assert_eq!(tables["table_char"].get("魯迪", "value"), Some("c"));
        assert!(tables["table_char"].get("舊", "value").is_none());
    }

    #[test]
    fn empty_cells_and_frames() {
        let dir = TempDir::new().unwrap();
        let s = stamp("20240501_130000");
        let path = write_table(dir.path(), "table_char", s, &[Pair("魯迪", "")]).unwrap();
        let frame = Frame::read_csv(&path).unwrap();
        assert!(!frame.is_empty());
        assert_eq!(frame.get("魯迪", "value"), None);
        assert_eq!(frame.get("魯迪", "missing"), None);

        let path = write_table::<Pair>(dir.path(), "table_ascent", s, &[]).unwrap();
        assert!(Frame::read_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn table_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let s = stamp("20240501_120000");
        write_table(dir.path(), "table_char", s, &[Pair("a", "1")]).unwrap();
        let err = write_table(dir.path(), "table_char", s, &[Pair("b", "2")]).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }
}
