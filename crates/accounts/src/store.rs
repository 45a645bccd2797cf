use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lineio::{LineFileError, FIELD_DELIMITER};
use thiserror::Error;
use tracing::{error, warn};

use crate::line::{decode_account, encode_account};
use crate::model::{Account, Role, ValidationError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file error: {0}")]
    File(#[from] LineFileError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Line-oriented account store over one text file.
///
/// Creation appends a line; update and delete load every record into
/// memory, mutate the set keyed on `username`, and rewrite the whole
/// file through an atomic temp-file rename. After any successful
/// update/delete the file never contains two lines with the same
/// username.
///
/// Like every FlatShop store, the public API degrades failures to
/// `None`/empty/no-op and reports them through `tracing`; a corrupt
/// line is skipped, never fatal to the read.
pub struct AccountStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AccountStore {
    /// Opens a store over `path`, seeding two default accounts when the
    /// backing file is absent or zero-length.
    ///
    /// Seeding goes through the normal `create` path, so the hard-coded
    /// defaults are subject to the same validation as any account; a
    /// rejection there is fatal only to seeding, not to the store.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };
        store.bootstrap();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bootstrap(&self) {
        match lineio::read_lines(&self.path) {
            Ok(lines) if lines.is_empty() => self.seed_defaults(),
            Ok(_) => {}
            Err(err) => error!(%err, "account bootstrap read failed"),
        }
    }

    fn seed_defaults(&self) {
        let defaults = [
            ("admin", "admin123", Role::Admin),
            ("customer", "customer123", Role::User),
        ];
        for (username, password, role) in defaults {
            match Account::new(username, password, role) {
                Ok(account) => self.create(&account),
                Err(err) => error!(%err, username, "default account rejected"),
            }
        }
    }

    /// Appends one account record.
    pub fn create(&self, account: &Account) {
        let _guard = self.guard();
        if let Err(err) = self.try_create(account) {
            error!(%err, username = %account.username, "account create failed");
        }
    }

    /// Finds a record by username.
    ///
    /// Each line's raw prefix (up to the first field delimiter) is
    /// compared before decoding; a hit is then decoded fully.
    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        let _guard = self.guard();
        match self.try_find(username) {
            Ok(hit) => hit,
            Err(err) => {
                error!(%err, username, "account lookup failed");
                None
            }
        }
    }

    /// Username + exact password check.
    ///
    /// Unknown username and wrong password collapse into the same
    /// `None` — callers learn only that authentication failed.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Account> {
        self.find_by_username(username)
            .filter(|account| account.password == password)
    }

    /// Replaces the record whose username matches, then rewrites the
    /// whole file. No match leaves the set unchanged.
    pub fn update(&self, account: &Account) {
        let _guard = self.guard();
        if let Err(err) = self.try_update(account) {
            error!(%err, username = %account.username, "account update failed");
        }
    }

    /// Drops the record whose username matches, then rewrites the whole
    /// file.
    pub fn delete(&self, username: &str) {
        let _guard = self.guard();
        if let Err(err) = self.try_delete(username) {
            error!(%err, username, "account delete failed");
        }
    }

    /// Every decodable record, in file order.
    pub fn list_all(&self) -> Vec<Account> {
        let _guard = self.guard();
        match self.load_all() {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(%err, "account list failed");
                Vec::new()
            }
        }
    }

    fn try_create(&self, account: &Account) -> Result<(), StoreError> {
        account.validate_encodable()?;
        lineio::append_line(&self.path, &encode_account(account))?;
        Ok(())
    }

    fn try_find(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let prefix = format!("{}{}", username, FIELD_DELIMITER);
        for line in lineio::read_lines(&self.path)? {
            if !line.starts_with(&prefix) {
                continue;
            }
            match decode_account(&line) {
                Ok(account) => return Ok(Some(account)),
                Err(err) => warn!(%err, "skipping corrupt account record"),
            }
        }
        Ok(None)
    }

    fn try_update(&self, account: &Account) -> Result<(), StoreError> {
        account.validate_encodable()?;
        let mut accounts = self.load_all()?;
        for existing in &mut accounts {
            if existing.username == account.username {
                *existing = account.clone();
            }
        }
        self.rewrite(&accounts)
    }

    fn try_delete(&self, username: &str) -> Result<(), StoreError> {
        let mut accounts = self.load_all()?;
        accounts.retain(|account| account.username != username);
        self.rewrite(&accounts)
    }

    fn load_all(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts = Vec::new();
        for line in lineio::read_lines(&self.path)? {
            match decode_account(&line) {
                Ok(account) => accounts.push(account),
                Err(err) => warn!(%err, "skipping corrupt account record"),
            }
        }
        Ok(accounts)
    }

    fn rewrite(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let lines: Vec<String> = accounts.iter().map(encode_account).collect();
        lineio::rewrite_atomic(&self.path, &lines)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SecurityAnswer;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> AccountStore {
        AccountStore::open(dir.path().join("accounts.txt"))
    }

    // -------------------- Bootstrap --------------------

    #[test]
    fn open_seeds_two_default_accounts() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let all = store.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(store.find_by_username("admin").unwrap().role, Role::Admin);
        assert_eq!(store.find_by_username("customer").unwrap().role, Role::User);
    }

    #[test]
    fn reopen_does_not_reseed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.txt");

        let store = AccountStore::open(&path);
        store.delete("customer");
        drop(store);

        let store = AccountStore::open(&path);
        assert_eq!(store.list_all().len(), 1);
        assert!(store.find_by_username("customer").is_none());
    }

    // -------------------- Create / find --------------------

    #[test]
    fn create_and_find() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let account = Account::new("alice", "secret1", Role::User).unwrap();
        store.create(&account);

        assert_eq!(store.find_by_username("alice").unwrap(), account);
    }

    #[test]
    fn find_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.find_by_username("nobody").is_none());
    }

    #[test]
    fn prefix_probe_does_not_match_username_prefixes() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.create(&Account::new("alice123", "secret1", Role::User).unwrap());

        // "alice" is a prefix of "alice123" but not a key match
        assert!(store.find_by_username("alice").is_none());
    }

    #[test]
    fn create_rejects_delimiter_in_profile() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut account = Account::new("alice", "secret1", Role::User).unwrap();
        account.email = Some("a;b@example.com".to_string());
        store.create(&account);

        assert!(store.find_by_username("alice").is_none());
    }

    // -------------------- Authenticate --------------------

    #[test]
    fn authenticate_success() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.authenticate("admin", "admin123").is_some());
    }

    #[test]
    fn authenticate_is_uniform_on_failure() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        // wrong password and unknown user are indistinguishable
        assert!(store.authenticate("admin", "wrong").is_none());
        assert!(store.authenticate("ghost", "admin123").is_none());
    }

    // -------------------- Update / delete --------------------

    #[test]
    fn update_rewrites_matching_record() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut account = store.find_by_username("admin").unwrap();
        account.email = Some("admin@example.com".to_string());
        account.answers.push(SecurityAnswer {
            question_id: 2,
            answer: "tabby".to_string(),
        });
        store.update(&account);

        let reread = store.find_by_username("admin").unwrap();
        assert_eq!(reread.email.as_deref(), Some("admin@example.com"));
        assert_eq!(reread.answers.len(), 1);
        // no duplicate key at rest
        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn update_unknown_username_leaves_set_unchanged() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let before = store.list_all();
        store.update(&Account::new("ghost", "pass1234", Role::User).unwrap());
        assert_eq!(store.list_all(), before);
    }

    #[test]
    fn delete_removes_record() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.delete("customer");
        assert!(store.find_by_username("customer").is_none());
        assert_eq!(store.list_all().len(), 1);
    }

    #[test]
    fn rewrite_is_idempotent_on_content() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let before = store.list_all();
        // rewrite with an unchanged set
        let admin = store.find_by_username("admin").unwrap();
        store.update(&admin);
        assert_eq!(store.list_all(), before);
    }

    // -------------------- Corrupt records --------------------

    #[test]
    fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        lineio::append_line(store.path(), "broken").unwrap();
        store.create(&Account::new("alice", "secret1", Role::User).unwrap());

        let all = store.list_all();
        assert_eq!(all.len(), 3); // 2 defaults + alice, corrupt line skipped
        assert!(store.find_by_username("alice").is_some());
    }
}
