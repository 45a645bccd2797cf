//! # accounts
//!
//! The account store for FlatShop: one delimited text line per account,
//! with append-only creation and read-all/atomic-rewrite updates. Also
//! hosts the binary fixed-slot store for security questions, which
//! account records reference by question id.

mod line;
mod model;
mod questions;
mod store;

pub use line::{decode_account, encode_account, LineError};
pub use model::{Account, Role, SecurityAnswer, ValidationError};
pub use questions::{QuestionStore, SecurityQuestion, QUESTION_SLOT_SIZE, QUESTION_TEXT_CAP};
pub use store::{AccountStore, StoreError};
