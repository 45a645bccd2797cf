//! # carts
//!
//! The shopping-cart store for FlatShop. A cart line persists only raw
//! keys — the owner's username and each item's product code — so a cart
//! can never be decoded standalone: reading the file resolves those
//! keys against the account store and the product catalog, and monetary
//! totals always re-derive from the *current* catalog prices rather
//! than from a stored snapshot.

mod line;
mod model;
mod store;

pub use line::{encode_cart, parse_cart_line, CartLineError, RawCart};
pub use model::{Cart, CartItem};
pub use store::{CartStore, StoreError};
