//! Delimited line codec for account records.
//!
//! One line, `;`-joined, fields in fixed order:
//!
//! ```text
//! username;role;password;full_name;age;gender;phone;email;answers
//! ```
//!
//! `answers` is a `,`-joined list of `questionId:answerText` pairs.
//! Optional fields encode as empty segments. Decoding is strict
//! positional parsing: fewer than [`MIN_FIELDS`] fields is a corrupt
//! record.

use std::num::ParseIntError;

use lineio::{DETAIL_DELIMITER, FIELD_DELIMITER, ITEM_DELIMITER};
use thiserror::Error;

use crate::model::{Account, Role, SecurityAnswer};

/// username, role and password must always be present.
pub const MIN_FIELDS: usize = 3;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("record has {0} fields, need at least {MIN_FIELDS}")]
    TooFewFields(usize),
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    #[error("malformed security answer pair {0:?}")]
    BadAnswerPair(String),
    #[error("malformed number: {0}")]
    BadNumber(#[from] ParseIntError),
}

/// Encodes one account as a single record line.
pub fn encode_account(account: &Account) -> String {
    let item_sep = ITEM_DELIMITER.to_string();
    let field_sep = FIELD_DELIMITER.to_string();

    let answers = account
        .answers
        .iter()
        .map(|a| format!("{}{}{}", a.question_id, DETAIL_DELIMITER, a.answer))
        .collect::<Vec<_>>()
        .join(item_sep.as_str());

    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    [
        account.username.clone(),
        account.role.as_str().to_string(),
        account.password.clone(),
        opt(&account.full_name),
        account.age.map(|a| a.to_string()).unwrap_or_default(),
        opt(&account.gender),
        opt(&account.phone),
        opt(&account.email),
        answers,
    ]
    .join(field_sep.as_str())
}

/// Decodes one record line back into an [`Account`].
pub fn decode_account(line: &str) -> Result<Account, LineError> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_FIELDS {
        return Err(LineError::TooFewFields(fields.len()));
    }

    let role =
        Role::parse(fields[1]).ok_or_else(|| LineError::UnknownRole(fields[1].to_string()))?;

    let get = |index: usize| fields.get(index).copied().unwrap_or("");
    let non_empty = |s: &str| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    };

    let age = match get(4) {
        "" => None,
        s => Some(s.parse::<u32>()?),
    };

    let mut answers = Vec::new();
    let segment = get(8);
    if !segment.is_empty() {
        for pair in segment.split(ITEM_DELIMITER) {
            let (question_id, answer) = pair
                .split_once(DETAIL_DELIMITER)
                .ok_or_else(|| LineError::BadAnswerPair(pair.to_string()))?;
            answers.push(SecurityAnswer {
                question_id: question_id.parse()?,
                answer: answer.to_string(),
            });
        }
    }

    Ok(Account {
        username: fields[0].to_string(),
        role,
        password: fields[2].to_string(),
        full_name: non_empty(get(3)),
        age,
        gender: non_empty(get(5)),
        phone: non_empty(get(6)),
        email: non_empty(get(7)),
        answers,
    })
}
