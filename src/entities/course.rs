use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::user::InstructorDTO;
use super::StringList;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub course_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub short_description: String,
    pub instructor_id: Uuid,
    pub category: CourseCategory,
    pub level: CourseLevel,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub thumbnail: String,
    pub preview_video: Option<String>,
    pub duration: String,
    pub requirements: StringList,
    pub what_you_will_learn: StringList,
    pub tags: StringList,
    pub language: String,
    pub enrollment_count: i32,
    pub average_rating: f64,
    pub total_ratings: i32,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InstructorId",
        to = "super::user::Column::UserId"
    )]
    Instructor,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn effective_price(&self) -> f64 {
        effective_price(self.price, self.discount_price)
    }

    pub fn discount_percentage(&self) -> i32 {
        match self.discount_price {
            Some(discount) if is_valid_discount(self.price, discount) && self.price > 0.0 => {
                (((self.price - discount) / self.price) * 100.0).round() as i32
            }
            _ => 0,
        }
    }
}

/// The price actually charged: the discount when it is a real discount
/// (`0 <= discount < price`), the list price otherwise.
pub fn effective_price(price: f64, discount_price: Option<f64>) -> f64 {
    match discount_price {
        Some(discount) if is_valid_discount(price, discount) => discount,
        _ => price,
    }
}

pub fn is_valid_discount(price: f64, discount: f64) -> bool {
    discount >= 0.0 && discount < price
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CourseCategory {
    #[sea_orm(string_value = "Programming")]
    Programming,
    #[sea_orm(string_value = "Design")]
    Design,
    #[sea_orm(string_value = "Business")]
    Business,
    #[sea_orm(string_value = "Marketing")]
    Marketing,
    #[sea_orm(string_value = "Data Science")]
    #[serde(rename = "Data Science")]
    DataScience,
    #[sea_orm(string_value = "Other")]
    Other,
}

impl CourseCategory {
    pub fn label(&self) -> &'static str {
        match self {
            CourseCategory::Programming => "Programming",
            CourseCategory::Design => "Design",
            CourseCategory::Business => "Business",
            CourseCategory::Marketing => "Marketing",
            CourseCategory::DataScience => "Data Science",
            CourseCategory::Other => "Other",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CourseLevel {
    #[sea_orm(string_value = "Beginner")]
    Beginner,
    #[sea_orm(string_value = "Intermediate")]
    Intermediate,
    #[sea_orm(string_value = "Advanced")]
    Advanced,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 1000, message = "Description must be 1-1000 characters"))]
    pub description: String,
    #[validate(length(min = 1, max = 200, message = "Short description must be 1-200 characters"))]
    pub short_description: String,
    pub category: CourseCategory,
    pub level: CourseLevel,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[validate(range(min = 0.0, message = "Discount price cannot be negative"))]
    pub discount_price: Option<f64>,
    /// Stored path returned by the upload service.
    #[validate(length(min = 1, message = "Course thumbnail is required"))]
    pub thumbnail: String,
    pub preview_video: Option<String>,
    #[validate(length(min = 1, message = "Course duration is required"))]
    pub duration: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[validate(length(min = 1, message = "At least one learning outcome is required"))]
    pub what_you_will_learn: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Partial update. The instructor is never part of an update.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "Description must be 1-1000 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Short description must be 1-200 characters"))]
    pub short_description: Option<String>,
    pub category: Option<CourseCategory>,
    pub level: Option<CourseLevel>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    /// `Some(None)` (JSON `null`) clears the discount.
    #[serde(
        default,
        deserialize_with = "super::explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<f64>)]
    pub discount_price: Option<Option<f64>>,
    pub thumbnail: Option<String>,
    pub preview_video: Option<String>,
    pub duration: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub what_you_will_learn: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub language: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CourseSortField {
    #[default]
    CreatedAt,
    Price,
    AverageRating,
    EnrollmentCount,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CourseQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<CourseCategory>,
    pub level: Option<CourseLevel>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub sort_by: Option<CourseSortField>,
    pub sort_order: Option<SortOrder>,
    pub instructor: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseDTO {
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub instructor_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructor: Option<InstructorDTO>,
    pub category: CourseCategory,
    pub level: CourseLevel,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub effective_price: f64,
    pub discount_percentage: i32,
    pub thumbnail: String,
    pub preview_video: Option<String>,
    pub duration: String,
    pub requirements: Vec<String>,
    pub what_you_will_learn: Vec<String>,
    pub tags: Vec<String>,
    pub language: String,
    pub enrollment_count: i32,
    pub average_rating: f64,
    pub total_ratings: i32,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseDTO {
    pub fn with_instructor(mut self, instructor: Option<InstructorDTO>) -> Self {
        self.instructor = instructor;
        self
    }
}

impl From<Model> for CourseDTO {
    fn from(model: Model) -> Self {
        let effective_price = model.effective_price();
        let discount_percentage = model.discount_percentage();
        Self {
            course_id: model.course_id,
            title: model.title,
            description: model.description,
            short_description: model.short_description,
            instructor_id: model.instructor_id,
            instructor: None,
            category: model.category,
            level: model.level,
            price: model.price,
            discount_price: model.discount_price,
            effective_price,
            discount_percentage,
            thumbnail: model.thumbnail,
            preview_video: model.preview_video,
            duration: model.duration,
            requirements: model.requirements.into_inner(),
            what_you_will_learn: model.what_you_will_learn.into_inner(),
            tags: model.tags.into_inner(),
            language: model.language,
            enrollment_count: model.enrollment_count,
            average_rating: model.average_rating,
            total_ratings: model.total_ratings,
            is_published: model.is_published,
            published_at: model.published_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
