//! Opaque inline-button tokens
//!
//! Tokens round-trip through the transport untouched, so they only need to be
//! short (transports cap callback data at 64 bytes) and unambiguous.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Transport limit for callback data.
pub const MAX_TOKEN_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("callback token exceeds 64 bytes: {0}")]
    TooLong(String),

    #[error("malformed callback token: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Next,
    Previous,
}

/// The option a user picked on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// An entry of a listed result set, by id.
    Select(String),
    Page(PageDirection),
    Confirm(bool),
    /// A musical key, for transposition.
    Key(String),
}

impl Callback {
    pub fn select(id: impl Into<String>) -> Self {
        Callback::Select(id.into())
    }

    /// Encode for the transport, enforcing the length limit.
    pub fn encode(&self) -> Result<String, TokenError> {
        let token = self.to_string();
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::TooLong(token));
        }
        Ok(token)
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Select(id) => write!(f, "sel:{id}"),
            Callback::Page(PageDirection::Next) => f.write_str("pg:next"),
            Callback::Page(PageDirection::Previous) => f.write_str("pg:prev"),
            Callback::Confirm(true) => f.write_str("ok:y"),
            Callback::Confirm(false) => f.write_str("ok:n"),
            Callback::Key(key) => write!(f, "key:{key}"),
        }
    }
}

impl FromStr for Callback {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TokenError::Malformed(s.to_string());
        let (kind, value) = s.split_once(':').ok_or_else(malformed)?;

        match (kind, value) {
            ("sel", id) if !id.is_empty() => Ok(Callback::Select(id.to_string())),
            ("pg", "next") => Ok(Callback::Page(PageDirection::Next)),
            ("pg", "prev") => Ok(Callback::Page(PageDirection::Previous)),
            ("ok", "y") => Ok(Callback::Confirm(true)),
            ("ok", "n") => Ok(Callback::Confirm(false)),
            ("key", key) if !key.is_empty() => Ok(Callback::Key(key.to_string())),
            _ => Err(malformed()),
        }
    }
}
