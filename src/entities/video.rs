use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub video_id: Uuid,
    pub course_id: Uuid,
    pub playlist_id: Option<Uuid>,
    pub title: String,
    pub url: String,
    pub video_type: VideoType,
    pub youtube_id: Option<String>,
    /// Seconds.
    pub duration: i32,
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
    #[sea_orm(
        belongs_to = "super::playlist::Entity",
        from = "Column::PlaylistId",
        to = "super::playlist::Column::PlaylistId"
    )]
    Playlist,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::playlist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Playlist.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    #[default]
    #[sea_orm(string_value = "youtube")]
    Youtube,
    #[sea_orm(string_value = "upload")]
    Upload,
}

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .expect("youtube id pattern is valid")
});

/// Extracts the 11 character video id from the usual YouTube URL shapes
/// (`watch?v=`, `youtu.be/`, `embed/`, `v/`).
pub fn extract_youtube_id(url: &str) -> Option<String> {
    YOUTUBE_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The YouTube id stored alongside a video, derived from its URL.
pub fn derive_youtube_id(video_type: VideoType, url: &str) -> Option<String> {
    match video_type {
        VideoType::Youtube => extract_youtube_id(url),
        VideoType::Upload => None,
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct NewVideo {
    #[validate(length(min = 1, max = 100, message = "Video title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Video URL is required"))]
    pub url: String,
    #[validate(range(min = 1, message = "Video duration is required"))]
    pub duration: i32,
    #[serde(default)]
    pub video_type: VideoType,
    pub playlist_id: Option<Uuid>,
    pub order: Option<i32>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct AddVideosRequest {
    #[validate(
        length(min = 1, message = "\"videos\" must contain at least one video"),
        nested
    )]
    pub videos: Vec<NewVideo>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateVideoRequest {
    pub course_id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub video: NewVideo,
}

/// Partial update. The course of a video never changes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateVideoRequest {
    #[validate(length(min = 1, max = 100, message = "Video title must be 1-100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Video URL is required"))]
    pub url: Option<String>,
    #[validate(range(min = 1, message = "Video duration must be positive"))]
    pub duration: Option<i32>,
    pub video_type: Option<VideoType>,
    /// `Some(None)` (JSON `null`) takes the video out of its playlist.
    #[serde(
        default,
        deserialize_with = "super::explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<Uuid>)]
    pub playlist_id: Option<Option<Uuid>>,
    pub order: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VideoQuery {
    /// Only videos of this course.
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoDTO {
    pub video_id: Uuid,
    pub course_id: Uuid,
    pub playlist_id: Option<Uuid>,
    pub title: String,
    pub url: String,
    pub video_type: VideoType,
    pub youtube_id: Option<String>,
    pub duration: i32,
    pub order: i32,
    pub is_published: bool,
}

impl From<Model> for VideoDTO {
    fn from(model: Model) -> Self {
        Self {
            video_id: model.video_id,
            course_id: model.course_id,
            playlist_id: model.playlist_id,
            title: model.title,
            url: model.url,
            video_type: model.video_type,
            youtube_id: model.youtube_id,
            duration: model.duration,
            order: model.order,
            is_published: model.is_published,
        }
    }
}
