use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String, // "STUDENT", "TEACHER" or "ADMIN"
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub stripe_customer_id: Option<String>,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.clone())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
pub enum UserRole {
    #[default]
    #[serde(rename = "STUDENT")]
    Student,
    #[serde(rename = "TEACHER")]
    Teacher,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "STUDENT",
            UserRole::Teacher => "TEACHER",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Teachers and admins may author courses.
    pub fn can_author(&self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for UserRole {
    fn from(role: String) -> Self {
        match role.to_uppercase().as_str() {
            "TEACHER" => UserRole::Teacher,
            "ADMIN" => UserRole::Admin,
            _ => UserRole::Student, // Default
        }
    }
}

/// Roles a visitor may pick when signing up. Admin accounts are provisioned
/// out of band.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationRole {
    #[default]
    Student,
    Teacher,
}

impl From<RegistrationRole> for UserRole {
    fn from(role: RegistrationRole) -> Self {
        match role {
            RegistrationRole::Student => UserRole::Student,
            RegistrationRole::Teacher => UserRole::Teacher,
        }
    }
}

// Registration request model with validation
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[schema(examples("jane.doe@email.com"))]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[schema(examples("password123"))]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(max = 50, message = "Last name cannot exceed 50 characters"))]
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: RegistrationRole,
}

// Login request model with validation
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[schema(examples("jane.doe@email.com"))]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[schema(examples("password123"))]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Last name cannot exceed 50 characters"))]
    pub last_name: Option<String>,
    #[validate(length(max = 500, message = "Bio cannot exceed 500 characters"))]
    pub bio: Option<String>,
    /// Stored path returned by the upload service.
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Data Transfer Object for User information
/// Contains only the non-sensitive user information
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDTO {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Model> for UserDTO {
    fn from(model: Model) -> Self {
        Self {
            role: model.role(),
            user_id: model.user_id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            profile_picture: model.profile_picture,
            bio: model.bio,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

/// Public view of an instructor, embedded in course payloads.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstructorDTO {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
}

impl From<Model> for InstructorDTO {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            first_name: model.first_name,
            last_name: model.last_name,
            profile_picture: model.profile_picture,
            bio: model.bio,
        }
    }
}
