//! Validated postal inputs: six-digit pincodes and locality search text.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CourierError;

const PINCODE_LENGTH: usize = 6;

/// Reasons a raw pincode is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PincodeValidationError {
    /// Nothing was supplied.
    #[error("pincode must not be empty")]
    Empty,
    /// Supplied value is not six characters long.
    #[error("pincode must be exactly 6 digits, got {length} characters")]
    WrongLength { length: usize },
    /// Supplied value contains something other than ASCII digits.
    #[error("pincode must contain only digits 0-9")]
    NonDigit,
}

impl From<PincodeValidationError> for CourierError {
    fn from(error: PincodeValidationError) -> Self {
        Self::validation(error.to_string())
    }
}

/// Six-digit Indian postal code.
///
/// # Examples
/// ```
/// use courier::domain::Pincode;
///
/// let pincode = Pincode::parse("400001").expect("six digits");
/// assert_eq!(pincode.as_str(), "400001");
/// assert!(Pincode::parse("40001").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

impl Pincode {
    /// Validate `raw` as exactly six ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, PincodeValidationError> {
        if raw.is_empty() {
            return Err(PincodeValidationError::Empty);
        }
        let length = raw.chars().count();
        if length != PINCODE_LENGTH {
            return Err(PincodeValidationError::WrongLength { length });
        }
        if !raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(PincodeValidationError::NonDigit);
        }
        Ok(Self(raw.to_owned()))
    }

    /// Borrow the digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Pincode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Pincode {
    type Error = PincodeValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pincode> for String {
    fn from(value: Pincode) -> Self {
        value.0
    }
}

/// Free-text area or city fragment used for locality search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalityQuery {
    text: String,
    folded: String,
}

impl LocalityQuery {
    /// Trim `raw` and reject it when nothing remains.
    pub fn parse(raw: &str) -> Result<Self, CourierError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(CourierError::validation("locality query must not be empty"));
        }
        Ok(Self {
            text: text.to_owned(),
            folded: text.to_lowercase(),
        })
    }

    /// Trimmed query text as sent to the vendor.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Case-insensitive substring match against an area or city name.
    pub fn matches(&self, area: &str, city: &str) -> bool {
        area.to_lowercase().contains(&self.folded) || city.to_lowercase().contains(&self.folded)
    }
}

impl fmt::Display for LocalityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
