//! Facade tying together the FlatShop stores.
//!
//! [`Shop::open`] wires the four repositories over one data directory:
//! the binary product catalog, the binary security-question store, the
//! account text store (which seeds its two default accounts on first
//! open), and the cart text store with its resolution collaborators.
//!
//! Every repository call is synchronous and blocks on the caller's
//! thread; file handles live only for the duration of one operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use accounts::{AccountStore, QuestionStore};
use carts::{Cart, CartItem, CartStore};
use catalog::CatalogStore;

/// Data-directory configuration. Each store gets one file inside it.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub data_dir: PathBuf,
}

impl ShopConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.dat")
    }

    pub fn questions_path(&self) -> PathBuf {
        self.data_dir.join("questions.dat")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.txt")
    }

    pub fn carts_path(&self) -> PathBuf {
        self.data_dir.join("carts.txt")
    }
}

/// The wired-up repository layer.
pub struct Shop {
    pub catalog: Arc<CatalogStore>,
    pub accounts: Arc<AccountStore>,
    pub questions: QuestionStore,
    pub carts: CartStore,
}

impl Shop {
    /// Opens every store under the configured data directory.
    ///
    /// Account bootstrap and cart-sequence recovery run here. Fails
    /// only if the data directory cannot be created.
    pub fn open(config: &ShopConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let catalog = Arc::new(CatalogStore::open(config.catalog_path()));
        let accounts = Arc::new(AccountStore::open(config.accounts_path()));
        let questions = QuestionStore::open(config.questions_path());
        let carts = CartStore::open(
            config.carts_path(),
            Arc::clone(&accounts),
            Arc::clone(&catalog),
        );

        Ok(Self {
            catalog,
            accounts,
            questions,
            carts,
        })
    }

    /// Builds and persists a cart for `owner_username` from
    /// `(product_code, quantity)` pairs, allocating the code from the
    /// cart store's sequence.
    ///
    /// Returns `None` when the owner does not resolve. Unknown product
    /// codes are dropped from the cart, matching the store's own
    /// resolution policy.
    pub fn new_cart(&self, owner_username: &str, items: &[(i32, i32)]) -> Option<Cart> {
        let owner = self.accounts.find_by_username(owner_username)?;

        let mut resolved = Vec::new();
        for &(product_code, quantity) in items {
            match self.catalog.find_by_code(product_code) {
                Some(product) => resolved.push(CartItem { product, quantity }),
                None => warn!(product_code, "ignoring unknown product while building cart"),
            }
        }

        let cart = Cart {
            code: self.carts.allocate_code(),
            owner,
            items: resolved,
        };
        self.carts.create(&cart);
        Some(cart)
    }
}
