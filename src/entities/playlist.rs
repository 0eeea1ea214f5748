use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::video::VideoDTO;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "playlists")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub playlist_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
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

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreatePlaylistRequest {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Playlist title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub is_published: bool,
    /// Videos of the same course to attach, in playlist order.
    #[serde(default)]
    pub video_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdatePlaylistRequest {
    #[validate(length(min = 1, max = 100, message = "Playlist title must be 1-100 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
    /// Replaces the attached videos when present.
    pub video_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlaylistDTO {
    pub playlist_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub is_published: bool,
    pub videos: Vec<VideoDTO>,
}

impl PlaylistDTO {
    pub fn new(model: Model, videos: Vec<VideoDTO>) -> Self {
        Self {
            playlist_id: model.playlist_id,
            course_id: model.course_id,
            title: model.title,
            description: model.description,
            order: model.order,
            is_published: model.is_published,
            videos,
        }
    }
}
