use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub lesson_type: LessonType,
    pub content: LessonContent,
    /// Minutes.
    pub duration: i32,
    pub is_preview: bool,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::CourseId"
    )]
    Course,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// "1h 5m" / "45m".
    pub fn formatted_duration(&self) -> String {
        let hours = self.duration / 60;
        let minutes = self.duration % 60;
        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}m", minutes)
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[sea_orm(string_value = "video")]
    Video,
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "quiz")]
    Quiz,
    #[sea_orm(string_value = "assignment")]
    Assignment,
    #[sea_orm(string_value = "resource")]
    Resource,
}

/// Type-specific lesson payload. Only the fields relevant to the lesson's
/// type are expected to be filled.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct LessonContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_files: Vec<ResourceFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<QuizQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceFile {
    pub filename: String,
    pub original_name: Option<String>,
    pub file_url: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<QuizOption>,
    pub explanation: Option<String>,
    #[serde(default = "default_points")]
    pub points: i32,
}

fn default_points() -> i32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 100, message = "Lesson title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Lesson order cannot be negative"))]
    pub order: i32,
    pub lesson_type: LessonType,
    #[serde(default)]
    pub content: LessonContent,
    #[validate(range(min = 0, message = "Lesson duration cannot be negative"))]
    pub duration: i32,
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub is_published: bool,
}

/// Lesson outline as shown in course detail pages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonDTO {
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub lesson_type: LessonType,
    pub duration: i32,
    pub formatted_duration: String,
    pub is_preview: bool,
    pub is_published: bool,
}

impl From<Model> for LessonDTO {
    fn from(model: Model) -> Self {
        let formatted_duration = model.formatted_duration();
        Self {
            lesson_id: model.lesson_id,
            course_id: model.course_id,
            title: model.title,
            description: model.description,
            order: model.order,
            lesson_type: model.lesson_type,
            duration: model.duration,
            formatted_duration,
            is_preview: model.is_preview,
            is_published: model.is_published,
        }
    }
}
