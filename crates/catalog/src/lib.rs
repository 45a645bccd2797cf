//! # catalog
//!
//! The product catalog store for FlatShop: a fixed-slot binary file of
//! [`CatalogItem`] records.
//!
//! Each record occupies exactly [`SLOT_SIZE`] bytes at offset
//! `index * SLOT_SIZE`. Creation appends a slot, updates overwrite a
//! slot in place, and deletion flips a one-byte liveness flag without
//! ever removing or compacting the slot ("tombstoning"). Slot positions
//! are never reused.
//!
//! ## Example
//! ```no_run
//! use catalog::{CatalogItem, CatalogStore};
//!
//! let store = CatalogStore::open("catalog.dat");
//! store.create(&CatalogItem::new(1, "Rice", 15.0));
//! assert_eq!(store.find_by_code(1).unwrap().name, "Rice");
//!
//! store.delete(1);
//! assert!(store.find_by_code(1).is_none());
//! ```

mod slot;
mod store;

pub use slot::{decode_slot, encode_slot, CatalogItem, SlotError, NAME_CAP, SLOT_SIZE};
pub use store::{CatalogStore, StoreError};
