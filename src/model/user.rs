use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub phone_number: u64,
    /// argon2 PHC string, never serialized
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            user_name: self.user_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number,
        }
    }
}

/// A validated sign-up, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub phone_number: u64,
    pub password_hash: String,
    pub role: Role,
}

/// The three values that must be unique across all users.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Identity {
    pub user_name: String,
    pub email: String,
    pub phone_number: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, AsRefStr, Serialize, ToSchema)]
pub enum UniqueField {
    #[strum(serialize = "userName")]
    #[serde(rename = "userName")]
    UserName,
    #[strum(serialize = "email")]
    #[serde(rename = "email")]
    Email,
    #[strum(serialize = "phoneNumber")]
    #[serde(rename = "phoneNumber")]
    PhoneNumber,
}

impl UniqueField {
    pub const ALL: [UniqueField; 3] = [
        UniqueField::UserName,
        UniqueField::Email,
        UniqueField::PhoneNumber,
    ];

    /// Canonical form used for uniqueness comparisons.
    pub fn normalize(self, value: &str) -> String {
        match self {
            UniqueField::UserName | UniqueField::Email => value.trim().to_lowercase(),
            UniqueField::PhoneNumber => {
                let value = value.trim();
                value
                    .parse::<u64>()
                    .map_or_else(|_| value.to_string(), |n| n.to_string())
            }
        }
    }

    pub fn value_of(self, identity: &Identity) -> String {
        match self {
            UniqueField::UserName => identity.user_name.clone(),
            UniqueField::Email => identity.email.clone(),
            UniqueField::PhoneNumber => identity.phone_number.to_string(),
        }
    }
}

/// Public projection of a user. The password hash never leaves the server.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "name": "Jane Doe",
    "userName": "jane",
    "email": "jane@company.com",
    "phoneNumber": 8801712345678u64,
    "role": "employee",
    "createdAt": "2026-01-01T00:00:00Z"
}))]
pub struct UserView {
    pub id: u64,
    pub name: String,
    pub user_name: String,
    pub email: String,
    pub phone_number: u64,
    pub role: Role,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_view_uses_camel_case_and_hides_password() {
        let user = User {
            id: 7,
            name: "Jane Doe".into(),
            user_name: "jane".into(),
            email: "jane@company.com".into(),
            phone_number: 5551234,
            password_hash: "$argon2id$secret".into(),
            role: Role::Employee,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(UserView::from(&user)).expect("serializable");
        assert_eq!(value["userName"], "jane");
        assert_eq!(value["phoneNumber"], 5551234);
        assert_eq!(value["role"], "employee");
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
    }

    #[test]
    fn normalize_lowercases_handles_only() {
        assert_eq!(UniqueField::Email.normalize(" Jane@X.io "), "jane@x.io");
        assert_eq!(UniqueField::UserName.normalize("Jane"), "jane");
        assert_eq!(UniqueField::PhoneNumber.normalize(" 42 "), "42");
        assert_eq!(UniqueField::PhoneNumber.normalize("0042"), "42");
    }
}
