use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use accounts::AccountStore;
use catalog::CatalogStore;
use lineio::{LineFileError, FIELD_DELIMITER};
use thiserror::Error;
use tracing::{error, warn};

use crate::line::{encode_cart, parse_cart_line, RawCart};
use crate::model::{Cart, CartItem};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file error: {0}")]
    File(#[from] LineFileError),
}

/// Line-oriented cart store with cross-store reference resolution.
///
/// Decoding a cart is a two-step protocol:
///
/// 1. [`parse_cart_line`] splits the line into raw keys.
/// 2. The owner username is resolved through the account store and each
///    product code through the catalog. A cart whose owner does not
///    resolve is dropped entirely; an item whose product does not
///    resolve is dropped alone, keeping the cart.
///
/// A syntactically corrupt line is skipped and reported; it never
/// aborts the read of the remaining lines.
///
/// The store owns the cart-code sequence: at open it recovers
/// "max code on disk + 1" from the raw first fields (no resolution
/// needed) and [`allocate_code`](CartStore::allocate_code) hands out
/// the next value. `create` never checks uniqueness.
pub struct CartStore {
    path: PathBuf,
    accounts: Arc<AccountStore>,
    catalog: Arc<CatalogStore>,
    next_code: AtomicI32,
    lock: Mutex<()>,
}

impl CartStore {
    /// Opens a store over `path`, wiring the two stores the decode
    /// protocol resolves against, and recovers the code sequence.
    pub fn open<P: AsRef<Path>>(
        path: P,
        accounts: Arc<AccountStore>,
        catalog: Arc<CatalogStore>,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        let next_code = match lineio::read_lines(&path) {
            Ok(lines) => lines
                .iter()
                .filter_map(|line| line.split(FIELD_DELIMITER).next())
                .filter_map(|field| field.parse::<i32>().ok())
                .max()
                .map_or(1, |max| max + 1),
            Err(err) => {
                error!(%err, "cart sequence recovery failed, starting at 1");
                1
            }
        };
        Self {
            path,
            accounts,
            catalog,
            next_code: AtomicI32::new(next_code),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out the next cart code. Survives restarts because the
    /// sequence is recovered from disk at open.
    pub fn allocate_code(&self) -> i32 {
        self.next_code.fetch_add(1, Ordering::SeqCst)
    }

    /// Appends one cart record. The caller must have assigned `code`
    /// already (normally via [`allocate_code`](CartStore::allocate_code));
    /// the store does not check uniqueness, but it does advance the
    /// sequence past caller-assigned codes.
    pub fn create(&self, cart: &Cart) {
        let _guard = self.guard();
        self.next_code.fetch_max(cart.code + 1, Ordering::SeqCst);
        if let Err(err) = lineio::append_line(&self.path, &encode_cart(cart)) {
            error!(%err, code = cart.code, "cart create failed");
        }
    }

    pub fn find_by_code(&self, code: i32) -> Option<Cart> {
        self.list_all().into_iter().find(|cart| cart.code == code)
    }

    /// All carts belonging to `username`. Ownership is compared by the
    /// username key, never by instance identity — every decode produces
    /// a fresh `Account`.
    pub fn find_by_owner(&self, username: &str) -> Vec<Cart> {
        self.list_all()
            .into_iter()
            .filter(|cart| cart.owner.username == username)
            .collect()
    }

    pub fn find_by_code_and_owner(&self, code: i32, username: &str) -> Option<Cart> {
        self.list_all()
            .into_iter()
            .find(|cart| cart.code == code && cart.owner.username == username)
    }

    /// Every resolvable cart, in file order.
    pub fn list_all(&self) -> Vec<Cart> {
        let _guard = self.guard();
        match self.load_all() {
            Ok(carts) => carts,
            Err(err) => {
                error!(%err, "cart list failed");
                Vec::new()
            }
        }
    }

    /// Replaces the cart whose code matches, then rewrites the whole
    /// file from the decoded set. Records that no longer resolve are
    /// pruned by the rewrite.
    pub fn update(&self, cart: &Cart) {
        let _guard = self.guard();
        if let Err(err) = self.try_update(cart) {
            error!(%err, code = cart.code, "cart update failed");
        }
    }

    /// Drops the cart whose code matches, then rewrites the whole file.
    pub fn delete(&self, code: i32) {
        let _guard = self.guard();
        if let Err(err) = self.try_delete(code) {
            error!(%err, code, "cart delete failed");
        }
    }

    fn try_update(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut carts = self.load_all()?;
        for existing in &mut carts {
            if existing.code == cart.code {
                *existing = cart.clone();
            }
        }
        self.rewrite(&carts)
    }

    fn try_delete(&self, code: i32) -> Result<(), StoreError> {
        let mut carts = self.load_all()?;
        carts.retain(|cart| cart.code != code);
        self.rewrite(&carts)
    }

    fn load_all(&self) -> Result<Vec<Cart>, StoreError> {
        let mut carts = Vec::new();
        for line in lineio::read_lines(&self.path)? {
            match parse_cart_line(&line) {
                Ok(raw) => {
                    if let Some(cart) = self.resolve(raw) {
                        carts.push(cart);
                    }
                }
                Err(err) => warn!(%err, "skipping corrupt cart record"),
            }
        }
        Ok(carts)
    }

    /// Materializes a [`RawCart`] against the collaborating stores.
    ///
    /// Owner missing ⇒ the whole cart is discarded. Item missing ⇒ only
    /// that item is discarded.
    fn resolve(&self, raw: RawCart) -> Option<Cart> {
        let Some(owner) = self.accounts.find_by_username(&raw.owner) else {
            warn!(code = raw.code, owner = %raw.owner, "dropping cart with unresolvable owner");
            return None;
        };

        let mut items = Vec::new();
        for (product_code, quantity) in raw.items {
            match self.catalog.find_by_code(product_code) {
                Some(product) => items.push(CartItem { product, quantity }),
                None => {
                    warn!(cart = raw.code, product_code, "skipping unresolvable cart item");
                }
            }
        }

        Some(Cart {
            code: raw.code,
            owner,
            items,
        })
    }

    fn rewrite(&self, carts: &[Cart]) -> Result<(), StoreError> {
        let lines: Vec<String> = carts.iter().map(encode_cart).collect();
        lineio::rewrite_atomic(&self.path, &lines)?;
        Ok(())
    }
}
