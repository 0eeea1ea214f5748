use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of an enrollment's completed lessons. Unique per
/// (enrollment, lesson).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lesson_completions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub completion_id: Uuid,
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    pub completed_at: DateTime<Utc>,
    /// Minutes.
    pub time_spent: i32,
    pub score: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enrollment::Entity",
        from = "Column::EnrollmentId",
        to = "super::enrollment::Column::EnrollmentId"
    )]
    Enrollment,
    #[sea_orm(
        belongs_to = "super::lesson::Entity",
        from = "Column::LessonId",
        to = "super::lesson::Column::LessonId"
    )]
    Lesson,
}

impl Related<super::enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletedLessonDTO {
    pub lesson_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub time_spent: i32,
    pub score: Option<f64>,
}

impl From<Model> for CompletedLessonDTO {
    fn from(model: Model) -> Self {
        Self {
            lesson_id: model.lesson_id,
            completed_at: model.completed_at,
            time_spent: model.time_spent,
            score: model.score,
        }
    }
}
