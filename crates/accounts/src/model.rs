use lineio::{DETAIL_DELIMITER, FIELD_DELIMITER, ITEM_DELIMITER};
use thiserror::Error;

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

/// One answered security question: the question's id in the question
/// store plus the free-text answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityAnswer {
    pub question_id: i32,
    pub answer: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username must be 3-20 characters of [A-Za-z0-9_], got {0:?}")]
    BadUsername(String),
    #[error("password must be 4-20 characters without whitespace")]
    BadPassword,
    #[error("{field} contains a delimiter character")]
    DelimiterInField { field: &'static str },
}

/// One account record. Identity is `username`.
///
/// The password is stored verbatim and compared by exact equality — no
/// hashing. Profile fields are optional and encode as empty segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub role: Role,
    pub password: String,
    pub full_name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub answers: Vec<SecurityAnswer>,
}

impl Account {
    /// Constructs an account, validating the username and password
    /// formats. Profile fields start empty.
    pub fn new(username: &str, password: &str, role: Role) -> Result<Self, ValidationError> {
        if !valid_username(username) {
            return Err(ValidationError::BadUsername(username.to_string()));
        }
        if !valid_password(password) {
            return Err(ValidationError::BadPassword);
        }
        Ok(Self {
            username: username.to_string(),
            role,
            password: password.to_string(),
            full_name: None,
            age: None,
            gender: None,
            phone: None,
            email: None,
            answers: Vec::new(),
        })
    }

    /// Checks that no field would corrupt the delimited line format.
    ///
    /// The line format has no escaping, so delimiter characters are
    /// forbidden in every value that lands in a text file. The stores
    /// call this before encoding.
    pub fn validate_encodable(&self) -> Result<(), ValidationError> {
        let free_text = [
            ("username", Some(&self.username)),
            ("password", Some(&self.password)),
            ("full_name", self.full_name.as_ref()),
            ("gender", self.gender.as_ref()),
            ("phone", self.phone.as_ref()),
            ("email", self.email.as_ref()),
        ];
        for (field, value) in free_text {
            if let Some(value) = value {
                if contains_delimiter(value) {
                    return Err(ValidationError::DelimiterInField { field });
                }
            }
        }
        for answer in &self.answers {
            if contains_delimiter(&answer.answer) {
                return Err(ValidationError::DelimiterInField { field: "answer" });
            }
        }
        Ok(())
    }
}

fn valid_username(s: &str) -> bool {
    (3..=20).contains(&s.chars().count())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn valid_password(s: &str) -> bool {
    (4..=20).contains(&s.chars().count()) && !s.chars().any(char::is_whitespace)
}

fn contains_delimiter(s: &str) -> bool {
    s.contains(FIELD_DELIMITER) || s.contains(ITEM_DELIMITER) || s.contains(DETAIL_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_well_formed_credentials() {
        let account = Account::new("admin", "admin123", Role::Admin).unwrap();
        assert_eq!(account.username, "admin");
        assert_eq!(account.role, Role::Admin);
        assert!(account.answers.is_empty());
    }

    #[test]
    fn new_rejects_short_username() {
        assert_eq!(
            Account::new("ab", "goodpass", Role::User),
            Err(ValidationError::BadUsername("ab".to_string()))
        );
    }

    #[test]
    fn new_rejects_username_with_symbols() {
        assert!(Account::new("bad;name", "goodpass", Role::User).is_err());
        assert!(Account::new("bad name", "goodpass", Role::User).is_err());
    }

    #[test]
    fn new_rejects_short_or_spaced_password() {
        assert_eq!(
            Account::new("alice", "abc", Role::User),
            Err(ValidationError::BadPassword)
        );
        assert_eq!(
            Account::new("alice", "has space", Role::User),
            Err(ValidationError::BadPassword)
        );
    }

    #[test]
    fn validate_encodable_rejects_delimiters_in_profile() {
        let mut account = Account::new("alice", "secret1", Role::User).unwrap();
        account.full_name = Some("Alice; Smith".to_string());
        assert_eq!(
            account.validate_encodable(),
            Err(ValidationError::DelimiterInField { field: "full_name" })
        );
    }

    #[test]
    fn validate_encodable_rejects_delimiters_in_answers() {
        let mut account = Account::new("alice", "secret1", Role::User).unwrap();
        account.answers.push(SecurityAnswer {
            question_id: 1,
            answer: "blue, maybe green".to_string(),
        });
        assert!(account.validate_encodable().is_err());
    }

    #[test]
    fn role_string_forms_roundtrip() {
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
        assert_eq!(Role::parse(Role::User.as_str()), Some(Role::User));
        assert_eq!(Role::parse("ROOT"), None);
    }
}
