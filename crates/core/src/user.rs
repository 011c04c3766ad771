//! Users and their roles.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::patch::Patch;
use crate::store::{eq_matches, require_text, text_matches, Entity};
use crate::types::{DbId, Timestamp};

string_enum! {
    /// Role of a user within the organisation.
    pub enum UserRole("user role") {
        Admin => "ADMIN",
        Manager => "MANAGER",
        Technician => "TECHNICIAN",
        Staff => "STAFF",
    }
}

/// A person who raises, works on, or manages tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: DbId,
    /// Home branch. Organisation-wide admins have none.
    pub branch_id: Option<DbId>,
    pub full_name: String,
    /// Stored lowercased; unique among live users.
    pub email: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

/// Query parameters for listing users.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub branch_id: Option<DbId>,
    /// Exact match, case-insensitive.
    pub email: Option<String>,
    /// Substring of the full name.
    pub name: Option<String>,
    pub active: Option<bool>,
}

impl Entity for User {
    const NAME: &'static str = "User";
    type Filter = UserFilter;

    fn id(&self) -> DbId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text(&self.full_name, "full_name")?;
        require_text(&self.email, "email")
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("uq_users_email", self.email.to_lowercase())]
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        eq_matches(&self.role, &filter.role)
            && filter.branch_id.map_or(true, |b| self.branch_id == Some(b))
            && filter
                .email
                .as_deref()
                .map_or(true, |e| self.email.eq_ignore_ascii_case(e))
            && text_matches(&self.full_name, &filter.name)
            && eq_matches(&self.active, &filter.active)
    }
}

/// DTO for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub role: UserRole,
    pub branch_id: Option<DbId>,
}

/// DTO for updating a user. The email address is fixed once registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    #[serde(default)]
    pub full_name: Patch<String>,
    #[serde(default)]
    pub role: Patch<UserRole>,
    #[serde(default)]
    pub active: Patch<bool>,
    #[serde(default)]
    pub branch_id: Patch<DbId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        let now = chrono::Utc::now();
        User {
            id: crate::types::new_id(),
            branch_id: None,
            full_name: "Dana Reyes".into(),
            email: email.into(),
            role: UserRole::Technician,
            active: true,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn role_round_trips_through_string() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::from_str(role.as_str()).unwrap(), *role);
        }
        assert!(UserRole::from_str("janitor").is_err());
    }

    #[test]
    fn email_filter_is_case_insensitive() {
        let u = user("dana@example.com");
        let filter = UserFilter {
            email: Some("DANA@example.com".into()),
            ..Default::default()
        };
        assert!(u.matches(&filter));
    }

    #[test]
    fn unique_key_is_lowercased_email() {
        let u = user("Dana@Example.com");
        assert_eq!(u.unique_keys(), vec![("uq_users_email", "dana@example.com".to_string())]);
    }

    #[test]
    fn blank_name_is_invalid() {
        let mut u = user("dana@example.com");
        u.full_name = "  ".into();
        assert!(matches!(u.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn create_user_rejects_bad_email() {
        let input = CreateUser {
            full_name: "Dana".into(),
            email: "not-an-email".into(),
            role: UserRole::Staff,
            branch_id: None,
        };
        assert!(input.validate().is_err());
    }
}
