//! Fixed-slot binary codec for catalog records.
//!
//! One slot is always [`SLOT_SIZE`] bytes:
//!
//! ```text
//! [code: i32 LE][name: u16 LE x NAME_CAP][price: f64 LE][live: u8]
//! ```
//!
//! No header, no footer, no checksum. The name field holds exactly
//! [`NAME_CAP`] UTF-16 code units, right-padded with null units.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

use thiserror::Error;

/// Capacity of the name field, in UTF-16 code units.
pub const NAME_CAP: usize = 30;

/// Size of one slot in bytes: `i32` code + name units + `f64` price +
/// one liveness byte.
pub const SLOT_SIZE: u64 = 4 + (NAME_CAP as u64 * 2) + 8 + 1;

/// One product record in the catalog.
///
/// Identity is `code`. `live == false` marks a tombstoned slot: the
/// record stays on disk but is excluded from every read path.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub code: i32,
    pub name: String,
    pub price: f64,
    pub live: bool,
}

impl CatalogItem {
    /// Creates a live catalog item.
    pub fn new(code: i32, name: impl Into<String>, price: f64) -> Self {
        Self {
            code,
            name: name.into(),
            price,
            live: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot has {0} bytes, expected {SLOT_SIZE}")]
    WrongLength(usize),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Encodes one item into exactly [`SLOT_SIZE`] bytes.
///
/// Names longer than [`NAME_CAP`] UTF-16 units are silently truncated —
/// fixed-width policy, not an error.
pub fn encode_slot(item: &CatalogItem) -> Result<Vec<u8>, SlotError> {
    let mut buf = Vec::with_capacity(SLOT_SIZE as usize);
    buf.write_i32::<LittleEndian>(item.code)?;

    let mut units: Vec<u16> = item.name.encode_utf16().take(NAME_CAP).collect();
    units.resize(NAME_CAP, 0);
    for unit in units {
        buf.write_u16::<LittleEndian>(unit)?;
    }

    buf.write_f64::<LittleEndian>(item.price)?;
    buf.write_u8(u8::from(item.live))?;
    Ok(buf)
}

/// Decodes one [`SLOT_SIZE`]-byte slot.
///
/// The name is read as [`NAME_CAP`] code units and truncated at the
/// first null unit (or at capacity if none is present).
pub fn decode_slot(slot: &[u8]) -> Result<CatalogItem, SlotError> {
    if slot.len() != SLOT_SIZE as usize {
        return Err(SlotError::WrongLength(slot.len()));
    }

    let mut rdr = slot;
    let code = rdr.read_i32::<LittleEndian>()?;

    let mut units = [0u16; NAME_CAP];
    rdr.read_u16_into::<LittleEndian>(&mut units)?;
    let end = units.iter().position(|&u| u == 0).unwrap_or(NAME_CAP);
    let name = String::from_utf16_lossy(&units[..end]);

    let price = rdr.read_f64::<LittleEndian>()?;
    let live = rdr.read_u8()? != 0;

    Ok(CatalogItem {
        code,
        name,
        price,
        live,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_within_capacity() {
        let item = CatalogItem::new(42, "Rice", 15.0);
        let bytes = encode_slot(&item).unwrap();
        assert_eq!(bytes.len(), SLOT_SIZE as usize);
        assert_eq!(decode_slot(&bytes).unwrap(), item);
    }

    #[test]
    fn roundtrip_name_at_exact_capacity() {
        let name: String = "x".repeat(NAME_CAP);
        let item = CatalogItem::new(1, name.clone(), 1.0);
        let decoded = decode_slot(&encode_slot(&item).unwrap()).unwrap();
        assert_eq!(decoded.name, name);
    }

    #[test]
    fn overlong_name_truncates_to_capacity() {
        let item = CatalogItem::new(1, "y".repeat(NAME_CAP + 10), 1.0);
        let decoded = decode_slot(&encode_slot(&item).unwrap()).unwrap();
        assert_eq!(decoded.name, "y".repeat(NAME_CAP));
    }

    #[test]
    fn non_ascii_name_survives() {
        let item = CatalogItem::new(7, "Açaí", 9.5);
        let decoded = decode_slot(&encode_slot(&item).unwrap()).unwrap();
        assert_eq!(decoded.name, "Açaí");
    }

    #[test]
    fn tombstone_flag_roundtrips() {
        let mut item = CatalogItem::new(3, "Banana", 12.0);
        item.live = false;
        let decoded = decode_slot(&encode_slot(&item).unwrap()).unwrap();
        assert!(!decoded.live);
    }

    #[test]
    fn liveness_byte_is_last() {
        let item = CatalogItem::new(1, "a", 1.0);
        let bytes = encode_slot(&item).unwrap();
        assert_eq!(bytes[SLOT_SIZE as usize - 1], 1);
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(matches!(
            decode_slot(&[0u8; 10]),
            Err(SlotError::WrongLength(10))
        ));
    }
}
