//! Validated instance identifiers.
//!
//! Every process in an SMP group reports the same instance identifier. The
//! identifier is stored in a fixed-size field on the wire, so it is limited to
//! [`MAX_INSTANCE_ID_LEN`] bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an instance identifier, in bytes.
pub const MAX_INSTANCE_ID_LEN: usize = 31;

/// Instance identifier accepted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Validates `raw` and wraps it as an instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceIdError::Empty`] for an empty value and
    /// [`InstanceIdError::TooLong`] when the value exceeds
    /// [`MAX_INSTANCE_ID_LEN`] bytes.
    pub fn new(raw: impl Into<String>) -> Result<Self, InstanceIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InstanceIdError::Empty);
        }
        if raw.len() > MAX_INSTANCE_ID_LEN {
            return Err(InstanceIdError::TooLong {
                length: raw.len(),
                max: MAX_INSTANCE_ID_LEN,
            });
        }
        Ok(Self(raw))
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for InstanceId {
    type Err = InstanceIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::new(input)
    }
}

impl TryFrom<String> for InstanceId {
    type Error = InstanceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceId> for String {
    fn from(value: InstanceId) -> Self {
        value.0
    }
}

/// Reasons an instance identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceIdError {
    /// The identifier was empty.
    #[error("instance id must not be empty")]
    Empty,
    /// The identifier does not fit the fixed-size field.
    #[error("instance id is {length} bytes long; at most {max} bytes are allowed")]
    TooLong { length: usize, max: usize },
}
