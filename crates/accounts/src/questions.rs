//! Binary fixed-slot store for security questions.
//!
//! Same slot discipline as the product catalog: append-only growth,
//! in-place overwrite on update, one-byte tombstone on delete, linear
//! scan for lookups. Slot layout:
//!
//! ```text
//! [id: i32 LE][text: u16 LE x QUESTION_TEXT_CAP][live: u8]
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use tracing::{error, warn};

/// Capacity of the question text, in UTF-16 code units.
pub const QUESTION_TEXT_CAP: usize = 60;

/// Bytes per slot: `i32` id + text units + liveness byte.
pub const QUESTION_SLOT_SIZE: u64 = 4 + (QUESTION_TEXT_CAP as u64 * 2) + 1;

/// One security question. Identity is `id`; accounts reference it by
/// `question_id` in their answer list (the reference is not enforced).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityQuestion {
    pub id: i32,
    pub text: String,
    pub live: bool,
}

impl SecurityQuestion {
    pub fn new(id: i32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            live: true,
        }
    }
}

#[derive(Debug, Error)]
enum QuestionError {
    #[error("slot has {0} bytes, expected {QUESTION_SLOT_SIZE}")]
    WrongLength(usize),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

fn encode(question: &SecurityQuestion) -> Result<Vec<u8>, QuestionError> {
    let mut buf = Vec::with_capacity(QUESTION_SLOT_SIZE as usize);
    buf.write_i32::<LittleEndian>(question.id)?;
    let mut units: Vec<u16> = question.text.encode_utf16().take(QUESTION_TEXT_CAP).collect();
    units.resize(QUESTION_TEXT_CAP, 0);
    for unit in units {
        buf.write_u16::<LittleEndian>(unit)?;
    }
    buf.write_u8(u8::from(question.live))?;
    Ok(buf)
}

fn decode(slot: &[u8]) -> Result<SecurityQuestion, QuestionError> {
    if slot.len() != QUESTION_SLOT_SIZE as usize {
        return Err(QuestionError::WrongLength(slot.len()));
    }
    let mut rdr = slot;
    let id = rdr.read_i32::<LittleEndian>()?;
    let mut units = [0u16; QUESTION_TEXT_CAP];
    rdr.read_u16_into::<LittleEndian>(&mut units)?;
    let end = units.iter().position(|&u| u == 0).unwrap_or(QUESTION_TEXT_CAP);
    let text = String::from_utf16_lossy(&units[..end]);
    let live = rdr.read_u8()? != 0;
    Ok(SecurityQuestion { id, text, live })
}

/// Fixed-slot store of [`SecurityQuestion`] records.
pub struct QuestionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl QuestionStore {
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

    pub fn create(&self, question: &SecurityQuestion) {
        let _guard = self.guard();
        if let Err(err) = self.append_slot(question) {
            error!(%err, id = question.id, "question create failed");
        }
    }

    /// First id match, returned only if live.
    pub fn find_by_id(&self, id: i32) -> Option<SecurityQuestion> {
        let _guard = self.guard();
        match self.scan() {
            Ok(slots) => slots
                .into_iter()
                .map(|(_, q)| q)
                .find(|q| q.id == id)
                .filter(|q| q.live),
            Err(err) => {
                error!(%err, id, "question lookup failed");
                None
            }
        }
    }

    /// Overwrites the first id match in place, forcing `live = true`.
    pub fn update(&self, question: &SecurityQuestion) {
        let _guard = self.guard();
        let result = self
            .find_offset(question.id)
            .and_then(|offset| match offset {
                Some(offset) => self.overwrite_slot(offset, question),
                None => Ok(()),
            });
        if let Err(err) = result {
            error!(%err, id = question.id, "question update failed");
        }
    }

    /// Tombstones the first id match by clearing its liveness byte.
    pub fn delete(&self, id: i32) {
        let _guard = self.guard();
        let result = self.find_offset(id).and_then(|offset| match offset {
            Some(offset) => {
                let mut file = OpenOptions::new().write(true).open(&self.path)?;
                file.seek(SeekFrom::Start(offset + QUESTION_SLOT_SIZE - 1))?;
                file.write_all(&[0])?;
                file.flush()?;
                Ok(())
            }
            None => Ok(()),
        });
        if let Err(err) = result {
            error!(%err, id, "question delete failed");
        }
    }

    pub fn list_all(&self) -> Vec<SecurityQuestion> {
        let _guard = self.guard();
        match self.scan() {
            Ok(slots) => slots
                .into_iter()
                .map(|(_, q)| q)
                .filter(|q| q.live)
                .collect(),
            Err(err) => {
                error!(%err, "question list failed");
                Vec::new()
            }
        }
    }

    pub fn slot_count(&self) -> u64 {
        match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() / QUESTION_SLOT_SIZE,
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => {
                error!(%err, "question stat failed");
                0
            }
        }
    }

    fn append_slot(&self, question: &SecurityQuestion) -> Result<(), QuestionError> {
        let mut live = question.clone();
        live.live = true;
        let bytes = encode(&live)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    fn overwrite_slot(&self, offset: u64, question: &SecurityQuestion) -> Result<(), QuestionError> {
        let mut live = question.clone();
        live.live = true;
        let bytes = encode(&live)?;
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    fn find_offset(&self, id: i32) -> Result<Option<u64>, QuestionError> {
        Ok(self
            .scan()?
            .into_iter()
            .find(|(_, q)| q.id == id)
            .map(|(offset, _)| offset))
    }

    fn scan(&self) -> Result<Vec<(u64, SecurityQuestion)>, QuestionError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len % QUESTION_SLOT_SIZE != 0 {
            warn!(len, path = %self.path.display(), "ignoring trailing partial slot");
        }

        let total = len / QUESTION_SLOT_SIZE;
        let mut slots = Vec::with_capacity(total as usize);
        let mut buf = vec![0u8; QUESTION_SLOT_SIZE as usize];
        for index in 0..total {
            file.read_exact(&mut buf)?;
            match decode(&buf) {
                Ok(question) => slots.push((index * QUESTION_SLOT_SIZE, question)),
                Err(err) => warn!(%err, index, "skipping undecodable slot"),
            }
        }
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> QuestionStore {
        QuestionStore::open(dir.path().join("questions.dat"))
    }

    #[test]
    fn codec_roundtrip() {
        let q = SecurityQuestion::new(1, "What was your first pet's name?");
        let bytes = encode(&q).unwrap();
        assert_eq!(bytes.len(), QUESTION_SLOT_SIZE as usize);
        assert_eq!(decode(&bytes).unwrap(), q);
    }

    #[test]
    fn overlong_text_truncates() {
        let q = SecurityQuestion::new(1, "q".repeat(QUESTION_TEXT_CAP + 5));
        let decoded = decode(&encode(&q).unwrap()).unwrap();
        assert_eq!(decoded.text.len(), QUESTION_TEXT_CAP);
    }

    #[test]
    fn create_find_list() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.create(&SecurityQuestion::new(1, "First pet?"));
        store.create(&SecurityQuestion::new(2, "Mother's maiden name?"));

        assert_eq!(store.find_by_id(2).unwrap().text, "Mother's maiden name?");
        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn delete_tombstones_without_compaction() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.create(&SecurityQuestion::new(1, "First pet?"));
        store.create(&SecurityQuestion::new(2, "Favorite color?"));
        store.delete(1);

        assert!(store.find_by_id(1).is_none());
        assert_eq!(store.list_all().len(), 1);
        assert_eq!(store.slot_count(), 2);
    }

    #[test]
    fn update_resurrects() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.create(&SecurityQuestion::new(1, "First pet?"));
        store.delete(1);
        store.update(&SecurityQuestion::new(1, "First pet's name?"));

        assert_eq!(store.find_by_id(1).unwrap().text, "First pet's name?");
        assert_eq!(store.slot_count(), 1);
    }
}
