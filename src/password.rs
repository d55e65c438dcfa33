//! Password strength validation.
//!
//! A password is checked against an ordered list of [`Rule`]s and the first
//! rule it breaks is reported. Validation is pure: no I/O, no logging.

use thiserror::Error;

use crate::config::PASSWORD_MIN_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must be at least {0} characters long")]
    TooShort(usize),

    #[error("password cannot contain NUL characters")]
    ContainsNul,

    #[error("password cannot contain whitespace")]
    ContainsWhitespace,

    #[error("password must contain at least one letter")]
    MissingLetter,

    #[error("password must contain at least one digit")]
    MissingDigit,

    #[error("password must contain at least one symbol")]
    MissingSymbol,
}

/// A single strength requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    MinLength(usize),
    NoNul,
    NoWhitespace,
    Letter,
    Digit,
    Symbol,
}

impl Rule {
    pub fn check(self, password: &str) -> Result<(), PasswordError> {
        let ok = match self {
            Self::MinLength(min) => password.chars().count() >= min,
            Self::NoNul => !password.contains('\0'),
            Self::NoWhitespace => !password.chars().any(char::is_whitespace),
            Self::Letter => password.chars().any(char::is_alphabetic),
            Self::Digit => password.chars().any(|c| c.is_ascii_digit()),
            Self::Symbol => password.chars().any(is_symbol),
        };

        if ok { Ok(()) } else { Err(self.error()) }
    }

    fn error(self) -> PasswordError {
        match self {
            Self::MinLength(min) => PasswordError::TooShort(min),
            Self::NoNul => PasswordError::ContainsNul,
            Self::NoWhitespace => PasswordError::ContainsWhitespace,
            Self::Letter => PasswordError::MissingLetter,
            Self::Digit => PasswordError::MissingDigit,
            Self::Symbol => PasswordError::MissingSymbol,
        }
    }
}

/// Punctuation or symbol: printable, not a letter, digit or whitespace.
fn is_symbol(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

/// Ordered rule set; the first failing rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    rules: Vec<Rule>,
}

impl PasswordPolicy {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, password: &str) -> Result<(), PasswordError> {
        self.rules.iter().try_for_each(|rule| rule.check(password))
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(vec![Rule::MinLength(PASSWORD_MIN_LENGTH), Rule::NoNul, Rule::NoWhitespace, Rule::Letter, Rule::Digit, Rule::Symbol])
    }
}

/// Validates `password` against the default policy.
pub fn validate(password: &str) -> Result<(), PasswordError> {
    PasswordPolicy::default().validate(password)
}
