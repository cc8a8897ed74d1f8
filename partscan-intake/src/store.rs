//! Cache store
//!
//! In-memory view of the two durable tables, mirrored to append-only CSV
//! files inside the root folder:
//!
//! - `seen_codes.csv`: one row per admitted payload, header `Code`
//! - `parts.csv`: one row per resolved part number, header
//!   `PartNumber,Quantity,ImagePath,DataSheet,Description,Found`
//!
//! Both tables are read in full at startup and only ever appended to. Every
//! append is flushed before the call returns, so a crash loses at most the
//! record in flight. Appends go through a single writer lock even when
//! enrichment tasks complete on different worker threads.

use partscan_common::config::{PARTS_FILE, SEEN_CODES_FILE};
use partscan_common::{ResolvedPart, Result};
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Header of the seen-codes table
pub const SEEN_CODES_HEADER: [&str; 1] = ["Code"];

/// Header of the resolved-parts table
pub const PARTS_HEADER: [&str; 6] = [
    "PartNumber",
    "Quantity",
    "ImagePath",
    "DataSheet",
    "Description",
    "Found",
];

/// Locations of the durable tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub seen_codes: PathBuf,
    pub parts: PathBuf,
}

impl CachePaths {
    /// Standard table locations inside a root folder
    pub fn in_folder(root_folder: &Path) -> Self {
        Self {
            seen_codes: root_folder.join(SEEN_CODES_FILE),
            parts: root_folder.join(PARTS_FILE),
        }
    }
}

/// Outcome of [`CacheStore::append_resolved`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// The record now held for the part number
    pub record: ResolvedPart,
    /// False when another caller had already stored this part number
    pub inserted: bool,
}

/// Resolved parts in insertion order, indexed by part number
#[derive(Debug, Default)]
struct PartIndex {
    order: Vec<ResolvedPart>,
    by_number: HashMap<String, usize>,
}

impl PartIndex {
    fn get(&self, part_number: &str) -> Option<&ResolvedPart> {
        self.by_number
            .get(part_number)
            .and_then(|&idx| self.order.get(idx))
    }

    /// Insert unless the part number is already present
    fn insert(&mut self, part: ResolvedPart) -> bool {
        if self.by_number.contains_key(&part.part_number) {
            return false;
        }
        self.by_number
            .insert(part.part_number.clone(), self.order.len());
        self.order.push(part);
        true
    }
}

/// Session cache backed by the durable tables
#[derive(Debug)]
pub struct CacheStore {
    paths: CachePaths,
    seen: RwLock<HashSet<String>>,
    parts: RwLock<PartIndex>,
    /// Serializes file appends
    writer: Mutex<()>,
    last_error: RwLock<Option<String>>,
}

impl CacheStore {
    /// Load both tables, creating header-only files for any that are missing
    pub fn load(paths: CachePaths) -> Result<Self> {
        ensure_table(&paths.seen_codes, &SEEN_CODES_HEADER)?;
        ensure_table(&paths.parts, &PARTS_HEADER)?;

        let seen = read_seen_codes(&paths.seen_codes)?;
        let parts = read_parts(&paths.parts)?;

        info!(
            seen_codes = seen.len(),
            parts = parts.order.len(),
            "Cache store loaded"
        );

        Ok(Self {
            paths,
            seen: RwLock::new(seen),
            parts: RwLock::new(parts),
            writer: Mutex::new(()),
            last_error: RwLock::new(None),
        })
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Snapshot of every payload ever admitted
    pub fn seen_payloads(&self) -> HashSet<String> {
        read_lock(&self.seen).clone()
    }

    pub fn contains_seen(&self, payload: &str) -> bool {
        read_lock(&self.seen).contains(payload)
    }

    pub fn seen_count(&self) -> usize {
        read_lock(&self.seen).len()
    }

    /// Record an admitted payload
    ///
    /// Returns false (and writes nothing) if the payload is blank or already
    /// stored. Blank payloads are refused because reload skips blank rows.
    /// A failed file append is logged; the payload stays in memory for the
    /// rest of the session.
    pub fn append_seen(&self, payload: &str) -> bool {
        if payload.trim().is_empty() {
            return false;
        }
        if !write_lock(&self.seen).insert(payload.to_string()) {
            return false;
        }

        if let Err(e) = self.append_row(&self.paths.seen_codes, &[payload]) {
            self.record_failure(format!("Failed to persist seen code: {}", e));
        }
        true
    }

    /// Cached record for a part number
    pub fn get_part(&self, part_number: &str) -> Option<ResolvedPart> {
        read_lock(&self.parts).get(part_number).cloned()
    }

    /// Every resolved part, in insertion order
    pub fn parts(&self) -> Vec<ResolvedPart> {
        read_lock(&self.parts).order.clone()
    }

    pub fn part_count(&self) -> usize {
        read_lock(&self.parts).order.len()
    }

    /// Store a resolved part unless its part number is already cached
    ///
    /// Check and insert happen under one lock, so concurrent callers for the
    /// same part number produce exactly one record and one file row.
    pub fn append_resolved(&self, part: ResolvedPart) -> AppendOutcome {
        {
            let mut parts = write_lock(&self.parts);
            if let Some(existing) = parts.get(&part.part_number) {
                debug!(part_number = %part.part_number, "Part already cached, keeping existing record");
                return AppendOutcome {
                    record: existing.clone(),
                    inserted: false,
                };
            }
            parts.insert(part.clone());
        }

        let row = part_row(&part);
        let fields: Vec<&str> = row.iter().map(String::as_str).collect();
        if let Err(e) = self.append_row(&self.paths.parts, &fields) {
            self.record_failure(format!(
                "Failed to persist part {}: {}",
                part.part_number, e
            ));
        }

        AppendOutcome {
            record: part,
            inserted: true,
        }
    }

    /// Most recent durable append failure, if any
    pub fn last_error(&self) -> Option<String> {
        read_lock(&self.last_error).clone()
    }

    fn append_row(&self, path: &Path, fields: &[&str]) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        append_record(path, fields)
    }

    fn record_failure(&self, message: String) {
        error!("{}", message);
        *write_lock(&self.last_error) = Some(message);
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Create the table with only its header if it is missing or empty
fn ensure_table(path: &Path, header: &[&str]) -> Result<()> {
    let needs_header = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    if needs_header {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Creating table {}", path.display());
        append_record(path, header)?;
    }
    Ok(())
}

/// Append one row and flush it to the OS
fn append_record(path: &Path, fields: &[&str]) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(fields)?;
    writer.flush()?;
    Ok(())
}

fn table_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?)
}

fn read_seen_codes(path: &Path) -> Result<HashSet<String>> {
    let mut seen = HashSet::new();
    for (row, record) in table_reader(path)?.records().enumerate() {
        match record {
            Ok(record) => {
                let code = record.get(0).unwrap_or("");
                if !code.trim().is_empty() {
                    seen.insert(code.to_string());
                }
            }
            Err(e) => warn!(row = row + 1, "Skipping unreadable seen-code row: {}", e),
        }
    }
    Ok(seen)
}

fn read_parts(path: &Path) -> Result<PartIndex> {
    let mut index = PartIndex::default();
    for (row, record) in table_reader(path)?.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(row = row + 1, "Skipping unreadable part row: {}", e);
                continue;
            }
        };

        let Some(part) = part_from_record(&record) else {
            continue;
        };
        let part_number = part.part_number.clone();
        if !index.insert(part) {
            warn!(part_number = %part_number, "Duplicate part row ignored, keeping first");
        }
    }
    Ok(index)
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Decode a parts row; `None` for blank rows
///
/// Rows written before the `Description`/`Found` columns existed are
/// accepted; for those, `found` is inferred from any descriptive field.
fn part_from_record(record: &csv::StringRecord) -> Option<ResolvedPart> {
    let part_number = optional(record.get(0))?;
    let quantity = record.get(1).map(str::trim).unwrap_or("").to_string();
    let image_path = optional(record.get(2));
    let datasheet_url = optional(record.get(3));
    let description = optional(record.get(4));

    let found = match record.get(5).map(|f| f.trim().to_ascii_lowercase()) {
        Some(flag) if flag == "true" || flag == "1" => true,
        Some(flag) if flag == "false" || flag == "0" => false,
        _ => description.is_some() || datasheet_url.is_some() || image_path.is_some(),
    };

    Some(ResolvedPart {
        part_number,
        quantity,
        description,
        datasheet_url,
        image_path,
        found,
    })
}

fn part_row(part: &ResolvedPart) -> [String; 6] {
    [
        part.part_number.clone(),
        part.quantity.clone(),
        part.image_path.clone().unwrap_or_default(),
        part.datasheet_url.clone().unwrap_or_default(),
        part.description.clone().unwrap_or_default(),
        part.found.to_string(),
    ]
}
