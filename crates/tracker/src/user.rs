//! The acting user of an import.
//!
//! Authorization internals live elsewhere; the pipeline only asks whether the
//! user holds an authority and which organisation units it may capture data in.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identifier::Identifiable;

/// Superuser authority. Holders pass every authority check.
pub const AUTHORITY_ALL: &str = "ALL";

/// Authority that lifts the mandatory attribute check on enrollments.
pub const AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION: &str =
    "F_IGNORE_TRACKER_REQUIRED_VALUE_VALIDATION";

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub username: String,
    #[serde(default)]
    pub authorities: BTreeSet<String>,
    /// Capture scope: data may be entered in these units and their descendants.
    #[serde(default)]
    pub organisation_units: Vec<String>,
}

impl User {
    /// Creates a user without authorities or capture scope.
    pub fn new(uid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    /// Adds an authority.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    /// Adds an organisation unit to the capture scope.
    pub fn with_organisation_unit(mut self, uid: impl Into<String>) -> Self {
        self.organisation_units.push(uid.into());
        self
    }

    /// Returns `true` for superusers.
    pub fn is_super(&self) -> bool {
        self.authorities.contains(AUTHORITY_ALL)
    }

    /// Returns `true` if the user holds `authority` or is a superuser.
    pub fn is_authorized(&self, authority: &str) -> bool {
        self.is_super() || self.authorities.contains(authority)
    }
}

impl Identifiable for User {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn code(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn attribute_value(&self, _attribute: &str) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_checks() {
        let user = User::new("M5zQapPyTZI", "admin").with_authority("F_TRACKED_ENTITY_ADD");
        assert!(user.is_authorized("F_TRACKED_ENTITY_ADD"));
        assert!(!user.is_authorized(AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION));

        let superuser = User::new("xE7jOejl9FI", "system").with_authority(AUTHORITY_ALL);
        assert!(superuser.is_super());
        assert!(superuser.is_authorized(AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION));
    }
}
