use accounts::Account;
use catalog::CatalogItem;

/// One resolved cart line item. Only `product.code` and `quantity` are
/// persisted; the product itself is materialized from the catalog at
/// decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product: CatalogItem,
    pub quantity: i32,
}

impl CartItem {
    pub fn subtotal(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

/// One resolved shopping cart. Identity is `code`.
///
/// `owner` is always a live account found by username, and `items`
/// contains only entries whose product code resolved to a live catalog
/// record — the store guarantees both at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    pub code: i32,
    pub owner: Account,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of item subtotals at current catalog prices.
    pub fn total(&self) -> f64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }
}
