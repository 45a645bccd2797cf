use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{error, warn};

use crate::slot::{decode_slot, encode_slot, CatalogItem, SlotError, SLOT_SIZE};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("slot error: {0}")]
    Slot(#[from] SlotError),
}

/// Slot-addressed catalog store over one binary file.
///
/// The file handle is scoped to a single operation — every call opens
/// the file, works, and closes it before returning. A coarse per-store
/// mutex serializes operations within the process; the on-disk format
/// carries no coordination of its own.
///
/// # Failure Semantics
///
/// The public API never surfaces an I/O error: failures are logged and
/// the operation degrades to `None` / empty / no-op. Undecodable slots
/// are reported and skipped; a trailing partial slot ends the scan.
pub struct CatalogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CatalogStore {
    /// Opens a store over `path`. The file is created lazily on the
    /// first write; a missing file reads as an empty catalog.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one live slot at end-of-file. Tombstoned slots are never
    /// reused.
    pub fn create(&self, item: &CatalogItem) {
        let _guard = self.guard();
        if let Err(err) = self.append_slot(item) {
            error!(%err, code = item.code, "catalog create failed");
        }
    }

    /// Scans from slot 0 and returns the first record whose code
    /// matches, if it is live.
    ///
    /// A tombstoned match reports not-found: callers cannot distinguish
    /// "deleted" from "never existed".
    pub fn find_by_code(&self, code: i32) -> Option<CatalogItem> {
        let _guard = self.guard();
        match self.scan() {
            Ok(slots) => slots
                .into_iter()
                .map(|(_, item)| item)
                .find(|item| item.code == code)
                .filter(|item| item.live),
            Err(err) => {
                error!(%err, code, "catalog lookup failed");
                None
            }
        }
    }

    /// Case-insensitive exact-match name search over live slots. The
    /// query is trimmed before comparison.
    pub fn find_by_name(&self, name: &str) -> Vec<CatalogItem> {
        let _guard = self.guard();
        let query = name.trim().to_lowercase();
        match self.scan() {
            Ok(slots) => slots
                .into_iter()
                .map(|(_, item)| item)
                .filter(|item| item.live && item.name.to_lowercase() == query)
                .collect(),
            Err(err) => {
                error!(%err, "catalog name search failed");
                Vec::new()
            }
        }
    }

    /// Overwrites the first slot matching `item.code` in place, forcing
    /// `live = true` — updating a tombstoned slot resurrects it. No
    /// match is a silent no-op.
    pub fn update(&self, item: &CatalogItem) {
        let _guard = self.guard();
        let result = self
            .find_offset(item.code)
            .and_then(|offset| match offset {
                Some(offset) => self.overwrite_slot(offset, item),
                None => Ok(()),
            });
        if let Err(err) = result {
            error!(%err, code = item.code, "catalog update failed");
        }
    }

    /// Tombstones the first slot matching `code` by writing `false`
    /// into the liveness byte only; every other byte of the slot is
    /// left untouched. No match is a silent no-op.
    pub fn delete(&self, code: i32) {
        let _guard = self.guard();
        let result = self.find_offset(code).and_then(|offset| match offset {
            Some(offset) => self.clear_live_flag(offset),
            None => Ok(()),
        });
        if let Err(err) = result {
            error!(%err, code, "catalog delete failed");
        }
    }

    /// All live records, in physical (creation) order.
    pub fn list_all(&self) -> Vec<CatalogItem> {
        let _guard = self.guard();
        match self.scan() {
            Ok(slots) => slots
                .into_iter()
                .map(|(_, item)| item)
                .filter(|item| item.live)
                .collect(),
            Err(err) => {
                error!(%err, "catalog list failed");
                Vec::new()
            }
        }
    }

    /// Physical slot count (`file length / SLOT_SIZE`), tombstones
    /// included. Zero for a missing file.
    pub fn slot_count(&self) -> u64 {
        match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() / SLOT_SIZE,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => {
                error!(%err, "catalog stat failed");
                0
            }
        }
    }

    fn append_slot(&self, item: &CatalogItem) -> Result<(), StoreError> {
        let mut live = item.clone();
        live.live = true;
        let bytes = encode_slot(&live)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    fn overwrite_slot(&self, offset: u64, item: &CatalogItem) -> Result<(), StoreError> {
        let mut live = item.clone();
        live.live = true;
        let bytes = encode_slot(&live)?;

        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    fn clear_live_flag(&self, offset: u64) -> Result<(), StoreError> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset + SLOT_SIZE - 1))?;
        file.write_all(&[0])?;
        file.flush()?;
        Ok(())
    }

    /// Byte offset of the first slot whose code matches, live or not.
    fn find_offset(&self, code: i32) -> Result<Option<u64>, StoreError> {
        Ok(self
            .scan()?
            .into_iter()
            .find(|(_, item)| item.code == code)
            .map(|(offset, _)| offset))
    }

    /// Reads every decodable slot as `(byte_offset, item)` pairs.
    fn scan(&self) -> Result<Vec<(u64, CatalogItem)>, StoreError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len % SLOT_SIZE != 0 {
            warn!(
                len,
                slot_size = SLOT_SIZE,
                path = %self.path.display(),
                "ignoring trailing partial slot"
            );
        }

        let total = len / SLOT_SIZE;
        let mut slots = Vec::with_capacity(total as usize);
        let mut buf = vec![0u8; SLOT_SIZE as usize];

        for index in 0..total {
            file.read_exact(&mut buf)?;
            match decode_slot(&buf) {
                Ok(item) => slots.push((index * SLOT_SIZE, item)),
                Err(err) => warn!(%err, index, "skipping undecodable slot"),
            }
        }
        Ok(slots)
    }
}
