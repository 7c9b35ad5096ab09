//! Durable CSV price history.
//!
//! `CsvStore` exclusively owns two files: the append-only record store and
//! the grouped view derived from it. Rewrites go through a sibling temporary
//! file that is renamed into place, so a reader sees either the old or the
//! new contents, never a partial file.

use crate::aggregate::group_records;
use crate::config::Config;
use crate::error::StoreError;
use crate::types::{PricePoint, PriceRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const STORE_HEADER: [&str; 4] = ["product_name", "price", "timestamp", "source_url"];
pub const GROUPED_HEADER: [&str; 3] = ["product_name", "timestamp", "price"];

/// The full price history, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<PriceRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    /// Drops exact duplicate rows, keeping the first occurrence of each.
    pub fn deduplicated(&self) -> RecordSet {
        let mut seen = HashSet::with_capacity(self.records.len());
        let records = self
            .records
            .iter()
            .filter(|r| seen.insert(DedupeKey::of(r)))
            .cloned()
            .collect();
        RecordSet { records }
    }
}

// Full-row identity; price compared bitwise since it is never NaN here.
#[derive(Hash, PartialEq, Eq)]
struct DedupeKey<'a> {
    product_name: &'a str,
    price: u64,
    timestamp: DateTime<Utc>,
    source_url: &'a str,
}

impl<'a> DedupeKey<'a> {
    fn of(r: &'a PriceRecord) -> Self {
        Self {
            product_name: &r.product_name,
            price: r.price.to_bits(),
            timestamp: r.timestamp,
            source_url: &r.source_url,
        }
    }
}

#[derive(Serialize)]
struct GroupedRow<'a> {
    product_name: &'a str,
    timestamp: DateTime<Utc>,
    price: f64,
}

pub struct CsvStore {
    path: PathBuf,
    grouped_path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>, grouped_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            grouped_path: grouped_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store_path(), config.grouped_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn grouped_path(&self) -> &Path {
        &self.grouped_path
    }

    /// Appends `records`, creating the file with its header row if it is
    /// absent or empty. Returns the number of rows written.
    ///
    /// The batch is encoded up front and written in one call. If the write
    /// fails the file is cut back to its previous length, so a failed append
    /// leaves no rows behind.
    #[instrument(skip(self, records), fields(path = %self.path.display(), count = records.len()))]
    pub fn append(&self, records: &[PriceRecord]) -> Result<usize, StoreError> {
        ensure_parent(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        let start = file.metadata().map_err(|e| io_err(&self.path, e))?.len();

        let batch = encode_batch(&self.path, records, start == 0)?;
        write_batch(&mut file, start, &batch).map_err(|e| io_err(&self.path, e))?;

        debug!("appended {} rows ({} bytes)", records.len(), batch.len());
        Ok(records.len())
    }

    /// Reads the whole store. A store that does not exist yet is empty.
    ///
    /// Every row ends with a newline, so a file whose last row is cut off is
    /// reported as corrupt rather than read as a shorter record.
    pub fn load_all(&self) -> Result<RecordSet, StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RecordSet::default()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        if data.is_empty() {
            return Ok(RecordSet::default());
        }
        if data.last() != Some(&b'\n') {
            let line = data.iter().filter(|&&b| b == b'\n').count() as u64 + 1;
            return Err(StoreError::Corrupt {
                path: self.path.clone(),
                line,
                message: "last row is incomplete".to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data.as_slice());
        let headers = reader.headers().map_err(|e| self.read_err(e))?.clone();
        if headers.iter().ne(STORE_HEADER) {
            return Err(StoreError::Corrupt {
                path: self.path.clone(),
                line: 1,
                message: format!("unexpected header {:?}", headers.iter().collect::<Vec<_>>()),
            });
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| self.read_err(e))?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let record: PriceRecord = row.deserialize(Some(&headers)).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                line,
                message: e.to_string(),
            })?;
            if !record.is_valid() {
                return Err(StoreError::Corrupt {
                    path: self.path.clone(),
                    line,
                    message: format!("invalid record for '{}'", record.product_name),
                });
            }
            records.push(record);
        }
        Ok(RecordSet::new(records))
    }

    /// Removes exact duplicate rows and rewrites the store in place.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn dedupe(&self) -> Result<RecordSet, StoreError> {
        let all = self.load_all()?;
        let deduped = all.deduplicated();
        rewrite(&self.path, &STORE_HEADER, deduped.records().iter())?;
        info!(
            "dedupe kept {} of {} rows ({} duplicates removed)",
            deduped.len(),
            all.len(),
            all.len() - deduped.len()
        );
        Ok(deduped)
    }

    /// Groups the stored records by product, each history ordered by
    /// timestamp, and overwrites the grouped output file with the result.
    /// Call after [`CsvStore::dedupe`] so grouping never sees raw duplicates.
    #[instrument(skip(self), fields(path = %self.grouped_path.display()))]
    pub fn group_by_product(&self) -> Result<BTreeMap<String, Vec<PricePoint>>, StoreError> {
        let records = self.load_all()?;
        let grouped = group_records(records.records());

        let rows = grouped.iter().flat_map(|(name, points)| {
            points.iter().map(move |p| GroupedRow {
                product_name: name,
                timestamp: p.timestamp,
                price: p.price,
            })
        });
        rewrite(&self.grouped_path, &GROUPED_HEADER, rows)?;

        info!("grouped {} rows into {} products", records.len(), grouped.len());
        Ok(grouped)
    }

    fn read_err(&self, e: csv::Error) -> StoreError {
        if e.is_io_error() {
            return csv_err(&self.path, e);
        }
        StoreError::Corrupt {
            path: self.path.clone(),
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

/// CSV bytes for one appended batch, with the header row when `with_header`.
fn encode_batch(path: &Path, records: &[PriceRecord], with_header: bool) -> Result<Vec<u8>, StoreError> {
    let mut batch = Vec::new();
    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(&mut batch);
        if with_header {
            wtr.write_record(STORE_HEADER).map_err(|e| csv_err(path, e))?;
        }
        for record in records {
            wtr.serialize(record).map_err(|e| csv_err(path, e))?;
        }
        wtr.flush().map_err(|e| io_err(path, e))?;
    }
    Ok(batch)
}

/// Append target that can be cut back after a failed write.
trait AppendTarget: Write {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes all of `batch` or rolls `target` back to `start` bytes.
fn write_batch<T: AppendTarget>(target: &mut T, start: u64, batch: &[u8]) -> io::Result<()> {
    if let Err(e) = target.write_all(batch).and_then(|_| target.sync()) {
        if let Err(undo) = target.truncate_to(start) {
            warn!("could not roll back partial append to {} bytes: {}", start, undo);
        }
        return Err(e);
    }
    Ok(())
}

/// Writes header plus rows to `<path>.tmp`, then renames it over `path`.
fn rewrite<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = T>,
) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);

    let written = (|| -> Result<(), StoreError> {
        let file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        wtr.write_record(header).map_err(|e| csv_err(&tmp, e))?;
        for row in rows {
            wtr.serialize(row).map_err(|e| csv_err(&tmp, e))?;
        }
        wtr.flush().map_err(|e| io_err(&tmp, e))
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(path, e)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
        }
        _ => Ok(()),
    }
}

fn io_err(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path, source: csv::Error) -> StoreError {
    StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn rec(name: &str, price: f64, at: &str, url: &str) -> PriceRecord {
        PriceRecord::new(name, price, ts(at), url).unwrap()
    }

    fn store(dir: &TempDir) -> CsvStore {
        CsvStore::new(
            dir.path().join("results").join("product_price.csv"),
            dir.path().join("results").join("grouped_product_prices.csv"),
        )
    }

    fn as_sorted(set: &RecordSet) -> Vec<String> {
        let mut rows: Vec<_> = set
            .records()
            .iter()
            .map(|r| format!("{}|{}|{}|{}", r.product_name, r.price, r.timestamp, r.source_url))
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn append_creates_file_with_header_once() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.append(&[rec("P1", 10.0, "2024-01-01T00:00:00Z", "u1")]).unwrap();
        store.append(&[rec("P2", 20.5, "2024-01-02T00:00:00Z", "u2")]).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "product_name,price,timestamp,source_url");
        assert_eq!(lines.len(), 3);
        assert_eq!(text.matches("product_name").count(), 1);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn empty_append_still_creates_store_with_header() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.append(&[]).unwrap(), 0);
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.trim_end(), "product_name,price,timestamp,source_url");
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn missing_store_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load_all().unwrap().is_empty());
    }

    #[test]
    fn round_trips_unicode_names_and_urls_with_commas() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let r = rec("เนื้อสันคอ, Pro Butcher", 1299.0, "2024-01-01T10:15:30Z", "https://x/?q=a,b");
        store.append(std::slice::from_ref(&r)).unwrap();
        assert_eq!(store.load_all().unwrap().records(), &[r]);
    }

    #[test]
    fn exact_duplicates_collapse_to_one() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let r = rec("P1", 10.0, "2024-01-01T00:00:00Z", "u1");
        store.append(&[r.clone(), r.clone()]).unwrap();

        let deduped = store.dedupe().unwrap();
        assert_eq!(deduped.len(), 1);
        assert_eq!(store.load_all().unwrap().records(), &[r]);
    }

    #[test]
    fn rows_differing_in_any_column_are_kept() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .append(&[
                rec("P1", 10.0, "2024-01-01T00:00:00Z", "u1"),
                rec("P1", 11.0, "2024-01-01T00:00:00Z", "u1"),
                rec("P1", 10.0, "2024-01-01T00:00:01Z", "u1"),
                rec("P1", 10.0, "2024-01-01T00:00:00Z", "u2"),
                rec("P2", 10.0, "2024-01-01T00:00:00Z", "u1"),
            ])
            .unwrap();
        assert_eq!(store.dedupe().unwrap().len(), 5);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let a = rec("A", 1.0, "2024-01-01T00:00:00Z", "u");
        let b = rec("B", 2.0, "2024-01-01T00:00:00Z", "u");
        store.append(&[a.clone(), b.clone(), a.clone(), b, a]).unwrap();

        let once = store.dedupe().unwrap();
        let on_disk = fs::read_to_string(store.path()).unwrap();
        let twice = store.dedupe().unwrap();

        assert_eq!(once, twice);
        assert_eq!(on_disk, fs::read_to_string(store.path()).unwrap());
        assert_eq!(once.deduplicated(), once);
    }

    #[test]
    fn batch_boundaries_do_not_change_the_result() {
        let records = vec![
            rec("A", 1.0, "2024-01-01T00:00:00Z", "u1"),
            rec("B", 2.0, "2024-01-01T00:00:00Z", "u1"),
            rec("A", 1.0, "2024-01-01T00:00:00Z", "u1"),
            rec("A", 1.5, "2024-01-02T00:00:00Z", "u2"),
        ];

        let one_dir = TempDir::new().unwrap();
        let one = store(&one_dir);
        one.append(&records).unwrap();
        let single = one.dedupe().unwrap();

        let two_dir = TempDir::new().unwrap();
        let two = store(&two_dir);
        two.append(&records[..1]).unwrap();
        two.append(&records[1..]).unwrap();
        let split = two.dedupe().unwrap();

        assert_eq!(as_sorted(&single), as_sorted(&split));
    }

    #[test]
    fn grouping_keeps_every_record_in_time_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .append(&[
                rec("P1", 12.0, "2024-01-02T00:00:00Z", "u"),
                rec("P2", 20.0, "2024-01-01T00:00:00Z", "u"),
                rec("P1", 10.0, "2024-01-01T00:00:00Z", "u"),
                rec("P1", 10.0, "2024-01-01T00:00:00Z", "u"),
            ])
            .unwrap();
        let deduped = store.dedupe().unwrap();
        let grouped = store.group_by_product().unwrap();

        let total: usize = grouped.values().map(Vec::len).sum();
        assert_eq!(total, deduped.len());
        for points in grouped.values() {
            assert!(points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }

        let text = fs::read_to_string(store.grouped_path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "product_name,timestamp,price",
                "P1,2024-01-01T00:00:00Z,10.0",
                "P1,2024-01-02T00:00:00Z,12.0",
                "P2,2024-01-01T00:00:00Z,20.0",
            ]
        );
    }

    #[test]
    fn grouped_file_is_overwritten_each_time() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.append(&[rec("Old", 5.0, "2024-01-01T00:00:00Z", "u")]).unwrap();
        store.group_by_product().unwrap();

        fs::write(store.path(), "product_name,price,timestamp,source_url\n").unwrap();
        store.append(&[rec("New", 6.0, "2024-01-02T00:00:00Z", "u")]).unwrap();
        store.group_by_product().unwrap();

        let text = fs::read_to_string(store.grouped_path()).unwrap();
        assert!(!text.contains("Old"));
        assert!(text.contains("New"));
        assert!(!tmp_path(store.grouped_path()).exists());
    }

    #[test]
    fn unexpected_header_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "Name,Price,Brand,Date\nA,1,B,2024-01-01\n").unwrap();

        let err = store.load_all().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 1, .. }), "got {err:?}");
        assert!(store.dedupe().is_err());
    }

    #[test]
    fn undecodable_row_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "product_name,price,timestamp,source_url\n\
             A,1.0,2024-01-01T00:00:00Z,u\n\
             B,cheap,2024-01-01T00:00:00Z,u\n",
        )
        .unwrap();

        match store.load_all().unwrap_err() {
            StoreError::Corrupt { line, .. } => assert_eq!(line, 3),
            other => panic!("expected corrupt store, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_price_row_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "product_name,price,timestamp,source_url\nA,0,2024-01-01T00:00:00Z,u\n",
        )
        .unwrap();
        assert!(matches!(store.load_all(), Err(StoreError::Corrupt { .. })));
    }

    /// Accepts bytes up to `cap`, then fails like a full disk.
    struct CappedFile {
        data: Vec<u8>,
        cap: usize,
    }

    impl Write for CappedFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.cap.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::new(ErrorKind::Other, "File too large"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for CappedFile {
        fn sync(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn failed_append_rolls_back_to_previous_contents() {
        let path = Path::new("product_price.csv");
        let existing = encode_batch(path, &[rec("Kept", 1.0, "2024-01-01T00:00:00Z", "u")], true).unwrap();
        let records: Vec<_> = (0..50)
            .map(|i| {
                let name = format!("Product number {i}");
                rec(&name, 100.0 + i as f64, "2024-01-01T00:00:00Z", "https://shop.example/p")
            })
            .collect();
        let batch = encode_batch(path, &records, false).unwrap();

        let mut target = CappedFile {
            data: existing.clone(),
            cap: existing.len() + batch.len() / 2,
        };
        let err = write_batch(&mut target, existing.len() as u64, &batch).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(target.data, existing);
    }

    #[test]
    fn cut_off_last_row_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .append(&[
                rec("A", 1.0, "2024-01-01T00:00:00Z", "https://shop.example/a"),
                rec("B", 2.0, "2024-01-01T00:00:00Z", "https://shop.example/b"),
            ])
            .unwrap();
        let full = fs::metadata(store.path()).unwrap().len();
        OpenOptions::new().write(true).open(store.path()).unwrap().set_len(full - 8).unwrap();

        match store.load_all().unwrap_err() {
            StoreError::Corrupt { line, .. } => assert_eq!(line, 3),
            other => panic!("expected corrupt store, got {other:?}"),
        }
        assert!(store.dedupe().is_err());
    }
}
