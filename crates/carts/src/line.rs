//! Delimited line codec for cart records.
//!
//! One line per cart:
//!
//! ```text
//! code;ownerUsername;items
//! ```
//!
//! where `items` is a `,`-joined list of `productCode:quantity` pairs
//! (an empty segment means an empty cart). Parsing here is purely
//! syntactic and yields a [`RawCart`] of keys; resolving those keys
//! into an owner and products is the store's job.

use std::num::ParseIntError;

use lineio::{DETAIL_DELIMITER, FIELD_DELIMITER, ITEM_DELIMITER};
use thiserror::Error;

use crate::model::Cart;

#[derive(Debug, Error)]
pub enum CartLineError {
    #[error("record has {0} fields, need at least 2")]
    TooFewFields(usize),
    #[error("malformed item pair {0:?}")]
    BadItemPair(String),
    #[error("malformed number: {0}")]
    BadNumber(#[from] ParseIntError),
}

/// A syntactically parsed cart line: raw keys, nothing resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCart {
    pub code: i32,
    pub owner: String,
    /// `(product_code, quantity)` pairs in line order.
    pub items: Vec<(i32, i32)>,
}

/// Encodes a resolved cart back into its line form. Price and any item
/// identity beyond the product code are never persisted.
pub fn encode_cart(cart: &Cart) -> String {
    let item_sep = ITEM_DELIMITER.to_string();
    let items = cart
        .items
        .iter()
        .map(|item| format!("{}{}{}", item.product.code, DETAIL_DELIMITER, item.quantity))
        .collect::<Vec<_>>()
        .join(item_sep.as_str());

    format!(
        "{}{}{}{}{}",
        cart.code, FIELD_DELIMITER, cart.owner.username, FIELD_DELIMITER, items
    )
}

/// Splits one cart line into its raw keys.
///
/// Fewer than two fields, or any number that fails to parse, makes the
/// whole record corrupt. Readers skip a corrupt line and keep going —
/// one bad record never aborts the read of the rest of the file.
pub fn parse_cart_line(line: &str) -> Result<RawCart, CartLineError> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < 2 {
        return Err(CartLineError::TooFewFields(fields.len()));
    }

    let code = fields[0].parse::<i32>()?;
    let owner = fields[1].to_string();

    let mut items = Vec::new();
    if let Some(segment) = fields.get(2) {
        if !segment.is_empty() {
            for pair in segment.split(ITEM_DELIMITER) {
                let (product_code, quantity) = pair
                    .split_once(DETAIL_DELIMITER)
                    .ok_or_else(|| CartLineError::BadItemPair(pair.to_string()))?;
                items.push((product_code.parse()?, quantity.parse()?));
            }
        }
    }

    Ok(RawCart { code, owner, items })
}
