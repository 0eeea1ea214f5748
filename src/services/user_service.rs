use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use uuid::Uuid;

use crate::auth::{jwt, password};
use crate::entities::user::{
    ActiveModel, Column, Entity as User, Model, RegisterRequest, UpdatePasswordRequest,
    UpdateProfileRequest, UserRole,
};
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("This email is already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Incorrect current password")]
    IncorrectPassword,
    #[error("User not found")]
    NotFound,
    #[error("Teacher not found")]
    TeacherNotFound,
    #[error("Account is disabled")]
    Inactive,
    #[error("Password hashing error: {0}")]
    Hash(String),
    #[error(transparent)]
    Token(#[from] jwt::JwtError),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken => AppError::Conflict(err.to_string()),
            UserError::InvalidCredentials => AppError::Unauthorized(err.to_string()),
            UserError::IncorrectPassword => AppError::Validation(err.to_string()),
            UserError::NotFound | UserError::TeacherNotFound => AppError::NotFound(err.to_string()),
            UserError::Inactive => AppError::Forbidden(err.to_string()),
            UserError::Hash(e) => AppError::Internal(e),
            UserError::Token(e) => AppError::Internal(e.to_string()),
            UserError::Db(e) => AppError::Database(e),
        }
    }
}

/// Emails are compared case-insensitively; they are stored in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_by_id(db: &DatabaseConnection, user_id: Uuid) -> Result<Option<Model>, DbErr> {
    User::find_by_id(user_id).one(db).await
}

pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<Model>, DbErr> {
    User::find()
        .filter(Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
}

pub async fn register(db: &DatabaseConnection, request: RegisterRequest) -> Result<Model, UserError> {
    let email = normalize_email(&request.email);

    if find_by_email(db, &email).await?.is_some() {
        return Err(UserError::EmailTaken);
    }

    let password_hash =
        password::hash_password(&request.password).map_err(|e| UserError::Hash(e.to_string()))?;

    let now = Utc::now();
    let role: UserRole = request.role.into();

    let user = ActiveModel {
        user_id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        first_name: Set(request.first_name.trim().to_string()),
        last_name: Set(request.last_name.trim().to_string()),
        role: Set(role.to_string()),
        profile_picture: Set(None),
        bio: Set(None),
        stripe_customer_id: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match user.insert(db).await {
        Ok(user) => {
            tracing::info!("Registered {} account {}", role, user.user_id);
            Ok(user)
        }
        // Lost a race against another registration with the same email
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(UserError::EmailTaken)
        }
        Err(e) => Err(e.into()),
    }
}

/// Checks the credentials and issues a bearer token.
pub async fn login(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<(Model, String), UserError> {
    let user = find_by_email(db, email)
        .await?
        .ok_or(UserError::InvalidCredentials)?;

    if !password::verify_password(password, &user.password_hash) {
        return Err(UserError::InvalidCredentials);
    }

    if !user.is_active {
        return Err(UserError::Inactive);
    }

    let token = jwt::create_token(user.user_id, &user.email, &user.role())?;
    Ok((user, token))
}

pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    request: UpdateProfileRequest,
) -> Result<Model, UserError> {
    let user = find_by_id(db, user_id).await?.ok_or(UserError::NotFound)?;

    let mut user_model: ActiveModel = user.into();
    if let Some(first_name) = request.first_name {
        user_model.first_name = Set(first_name.trim().to_string());
    }
    if let Some(last_name) = request.last_name {
        user_model.last_name = Set(last_name.trim().to_string());
    }
    if let Some(bio) = request.bio {
        user_model.bio = Set(Some(bio));
    }
    if let Some(picture) = request.profile_picture {
        user_model.profile_picture = Set(Some(picture));
    }
    user_model.updated_at = Set(Utc::now());

    Ok(user_model.update(db).await?)
}

pub async fn update_password(
    db: &DatabaseConnection,
    user_id: Uuid,
    request: UpdatePasswordRequest,
) -> Result<(), UserError> {
    let user = find_by_id(db, user_id).await?.ok_or(UserError::NotFound)?;

    if !password::verify_password(&request.current_password, &user.password_hash) {
        return Err(UserError::IncorrectPassword);
    }

    let password_hash = password::hash_password(&request.new_password)
        .map_err(|e| UserError::Hash(e.to_string()))?;

    let mut user_model: ActiveModel = user.into();
    user_model.password_hash = Set(password_hash);
    user_model.updated_at = Set(Utc::now());
    user_model.update(db).await?;

    tracing::info!("Password updated for user {}", user_id);
    Ok(())
}

pub async fn set_stripe_customer_id(
    db: &DatabaseConnection,
    user: Model,
    customer_id: String,
) -> Result<Model, DbErr> {
    let mut user_model: ActiveModel = user.into();
    user_model.stripe_customer_id = Set(Some(customer_id));
    user_model.updated_at = Set(Utc::now());
    user_model.update(db).await
}

pub async fn list_teachers(db: &DatabaseConnection) -> Result<Vec<Model>, DbErr> {
    User::find()
        .filter(Column::Role.eq(UserRole::Teacher.as_str()))
        .filter(Column::IsActive.eq(true))
        .order_by_asc(Column::LastName)
        .order_by_asc(Column::FirstName)
        .all(db)
        .await
}

pub async fn find_teacher(db: &DatabaseConnection, user_id: Uuid) -> Result<Model, UserError> {
    User::find_by_id(user_id)
        .filter(Column::Role.eq(UserRole::Teacher.as_str()))
        .filter(Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or(UserError::TeacherNotFound)
}
