//! User and role models
//!
//! Permissions are a pure function of the role: a fixed lookup table,
//! checked by set membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::{validate_password, validate_username, FieldError};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Superuser,
}

/// Actions a role may be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
    Create,
    Delete,
    Admin,
}

const USER_PERMISSIONS: &[Permission] = &[Permission::View, Permission::Edit, Permission::Create];

const SUPERUSER_PERMISSIONS: &[Permission] = &[
    Permission::View,
    Permission::Edit,
    Permission::Create,
    Permission::Delete,
    Permission::Admin,
];

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Superuser];

    /// Permission set granted to this role
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::User => USER_PERMISSIONS,
            Role::Superuser => SUPERUSER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Superuser => "superuser",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "superuser" => Some(Role::Superuser),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::User => "Standard access: view, create and edit records",
            Role::Superuser => "Full access including deletion and user management",
        }
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
            Permission::Create => "create",
            Permission::Delete => "delete",
            Permission::Admin => "admin",
        }
    }
}

/// Role listing entry
#[derive(Debug, Clone, Serialize)]
pub struct RoleInfo {
    pub role: Role,
    pub description: &'static str,
    pub permissions: &'static [Permission],
}

/// All roles with their permission sets
pub fn role_catalog() -> Vec<RoleInfo> {
    Role::ALL
        .iter()
        .map(|role| RoleInfo {
            role: *role,
            description: role.description(),
            permissions: role.permissions(),
        })
        .collect()
}

/// A user account. The password hash is never part of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub store_id: Option<i64>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(custom = "validate_username")]
    pub username: String,
    #[validate(custom = "validate_password")]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub store_id: Option<i64>,
}

impl CreateUserInput {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        crate::validation::collect(self, Vec::new())
    }
}

/// Partial update of a user
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub store_id: Option<i64>,
    pub is_active: Option<bool>,
    #[validate(custom = "validate_password")]
    pub password: Option<String>,
}

impl UpdateUserInput {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        crate::validation::collect(self, Vec::new())
    }
}

/// User listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
