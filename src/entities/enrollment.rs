use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::course::CourseDTO;
use super::lesson_completion::CompletedLessonDTO;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub enrollment_id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrollment_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    /// 0-100, derived from completed lessons.
    pub progress: i32,
    /// Minutes.
    pub total_time_spent: i32,
    pub last_accessed_lesson_id: Option<Uuid>,
    pub last_accessed_at: DateTime<Utc>,
    pub certificate_issued: bool,
    pub status: EnrollmentStatus,
    pub payment_transaction_id: Option<String>,
    pub payment_amount: Option<f64>,
    pub payment_currency: Option<String>,
    pub payment_method: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::UserId"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::CourseId"
    )]
    Course,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn payment_info(&self) -> Option<PaymentInfo> {
        let transaction_id = self.payment_transaction_id.clone()?;
        Some(PaymentInfo {
            transaction_id,
            amount: self.payment_amount.unwrap_or_default(),
            currency: self.payment_currency.clone().unwrap_or_default(),
            payment_method: self.payment_method.clone().unwrap_or_default(),
            payment_date: self.payment_date.unwrap_or(self.enrollment_date),
        })
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "dropped")]
    Dropped,
    #[sea_orm(string_value = "suspended")]
    Suspended,
}

/// How a paid enrollment was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentInfo {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub payment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CourseProgressRequest {
    pub lesson_id: Option<Uuid>,
    #[serde(default)]
    /// Seconds spent in one session, capped at a day.
    #[validate(range(min = 0, max = 86400, message = "Time spent must be 0-86400 seconds"))]
    pub time_spent: i32,
    #[serde(default)]
    pub completed: bool,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EnrollmentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentDTO {
    pub enrollment_id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrollment_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub progress: i32,
    pub total_time_spent: i32,
    pub last_accessed_lesson_id: Option<Uuid>,
    pub last_accessed_at: DateTime<Utc>,
    pub status: EnrollmentStatus,
    pub certificate_issued: bool,
    pub payment_info: Option<PaymentInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed_lessons: Vec<CompletedLessonDTO>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<CourseDTO>,
}

impl EnrollmentDTO {
    pub fn with_completed_lessons(mut self, completed: Vec<CompletedLessonDTO>) -> Self {
        self.completed_lessons = completed;
        self
    }

    pub fn with_course(mut self, course: Option<CourseDTO>) -> Self {
        self.course = course;
        self
    }
}

impl From<Model> for EnrollmentDTO {
    fn from(model: Model) -> Self {
        let payment_info = model.payment_info();
        Self {
            enrollment_id: model.enrollment_id,
            user_id: model.user_id,
            course_id: model.course_id,
            enrollment_date: model.enrollment_date,
            completion_date: model.completion_date,
            progress: model.progress,
            total_time_spent: model.total_time_spent,
            last_accessed_lesson_id: model.last_accessed_lesson_id,
            last_accessed_at: model.last_accessed_at,
            status: model.status,
            certificate_issued: model.certificate_issued,
            payment_info,
            completed_lessons: Vec::new(),
            course: None,
        }
    }
}
