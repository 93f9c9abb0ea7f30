//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Stable identifier of a user on the chat platform.
///
/// Stored as the string form of the platform's numeric id so the store stays
/// agnostic of the platform's integer width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalUserId(String);

impl ExternalUserId {
    /// Creates an ExternalUserId, rejecting blank input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("external_user_id"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Creates an ExternalUserId from a numeric chat platform id.
    pub fn from_numeric(id: u64) -> Self {
        Self(id.to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id back into the platform's numeric form.
    pub fn as_numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExternalUserId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Customer identifier in the payment gateway's namespace (cus_...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentCustomerId(String);

impl PaymentCustomerId {
    /// Creates a PaymentCustomerId, rejecting blank input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::empty_field("payment_customer_id"));
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentCustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentCustomerId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_user_id_trims_whitespace() {
        let id = ExternalUserId::new("  123456 ").unwrap();
        assert_eq!(id.as_str(), "123456");
    }

    #[test]
    fn external_user_id_rejects_blank() {
        assert!(ExternalUserId::new("   ").is_err());
        assert!("".parse::<ExternalUserId>().is_err());
    }

    #[test]
    fn external_user_id_numeric_roundtrip() {
        let id = ExternalUserId::from_numeric(987654321);
        assert_eq!(id.as_str(), "987654321");
        assert_eq!(id.as_numeric(), Some(987654321));
    }

    #[test]
    fn external_user_id_non_numeric_has_no_numeric_form() {
        let id = ExternalUserId::new("alice").unwrap();
        assert_eq!(id.as_numeric(), None);
    }

    #[test]
    fn payment_customer_id_rejects_blank() {
        assert!(PaymentCustomerId::new("").is_err());
    }

    #[test]
    fn payment_customer_id_serializes_transparently() {
        let id = PaymentCustomerId::new("cus_123").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cus_123\"");
    }
}
