use std::collections::HashSet;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entities::prelude::*;
use crate::entities::playlist;
use crate::entities::video::{
    self, derive_youtube_id, AddVideosRequest, CreateVideoRequest, UpdateVideoRequest,
};
use crate::services::course_service::{find_owned_course, CatalogError};

pub async fn find_video(db: &DatabaseConnection, video_id: Uuid) -> Result<video::Model, CatalogError> {
    Video::find_by_id(video_id)
        .one(db)
        .await?
        .ok_or(CatalogError::VideoNotFound)
}

/// Videos of a playlist in playback order.
pub async fn videos_in_playlist<C>(db: &C, playlist_id: Uuid) -> Result<Vec<video::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Video::find()
        .filter(video::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(video::Column::Order)
        .all(db)
        .await
}

async fn next_video_order<C>(db: &C, course_id: Uuid) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    let max: Option<Option<i32>> = Video::find()
        .select_only()
        .column_as(video::Column::Order.max(), "max_order")
        .filter(video::Column::CourseId.eq(course_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(max.flatten().unwrap_or(0) + 1)
}

/// Every playlist must exist and belong to `course_id`.
async fn ensure_playlists_in_course<C>(
    db: &C,
    course_id: Uuid,
    playlist_ids: &HashSet<Uuid>,
) -> Result<(), CatalogError>
where
    C: ConnectionTrait,
{
    if playlist_ids.is_empty() {
        return Ok(());
    }
    let known = Playlist::find()
        .filter(playlist::Column::PlaylistId.is_in(playlist_ids.iter().copied()))
        .filter(playlist::Column::CourseId.eq(course_id))
        .all(db)
        .await?;
    if known.len() != playlist_ids.len() {
        return Err(CatalogError::PlaylistNotFound);
    }
    Ok(())
}

/// Adds a batch of videos to a course. The batch is stored as a whole or
/// not at all; videos without an explicit order are appended.
pub async fn add_course_videos(
    db: &DatabaseConnection,
    user: &CurrentUser,
    course_id: Uuid,
    request: AddVideosRequest,
) -> Result<Vec<video::Model>, CatalogError> {
    if request.videos.is_empty() {
        return Err(CatalogError::Invalid(
            "\"videos\" must contain at least one video".to_string(),
        ));
    }
    let incomplete = request
        .videos
        .iter()
        .any(|v| v.title.trim().is_empty() || v.url.trim().is_empty() || v.duration <= 0);
    if incomplete {
        return Err(CatalogError::Invalid(
            "Each video must have a title, url, and duration.".to_string(),
        ));
    }

    let txn = db.begin().await?;
    find_owned_course(&txn, user, course_id).await?;

    let playlist_ids: HashSet<Uuid> = request.videos.iter().filter_map(|v| v.playlist_id).collect();
    ensure_playlists_in_course(&txn, course_id, &playlist_ids).await?;

    let mut next_order = next_video_order(&txn, course_id).await?;
    let now = Utc::now();
    let mut created = Vec::with_capacity(request.videos.len());

    for new_video in request.videos {
        let order = new_video.order.unwrap_or_else(|| {
            next_order += 1;
            next_order - 1
        });
        let youtube_id = derive_youtube_id(new_video.video_type, &new_video.url);

        let model = video::ActiveModel {
            video_id: Set(Uuid::new_v4()),
            course_id: Set(course_id),
            playlist_id: Set(new_video.playlist_id),
            title: Set(new_video.title.trim().to_string()),
            url: Set(new_video.url.trim().to_string()),
            video_type: Set(new_video.video_type),
            youtube_id: Set(youtube_id),
            duration: Set(new_video.duration),
            order: Set(order),
            is_published: Set(new_video.is_published),
            created_at: Set(now),
            updated_at: Set(now),
        };
        created.push(model.insert(&txn).await?);
    }

    txn.commit().await?;
    tracing::info!("Added {} videos to course {}", created.len(), course_id);
    Ok(created)
}

/// Videos in playback order, optionally limited to one course.
pub async fn list_videos(
    db: &DatabaseConnection,
    course_id: Option<Uuid>,
) -> Result<Vec<video::Model>, CatalogError> {
    let mut query = Video::find();
    if let Some(course_id) = course_id {
        query = query.filter(video::Column::CourseId.eq(course_id));
    }
    Ok(query
        .order_by_asc(video::Column::CourseId)
        .order_by_asc(video::Column::Order)
        .all(db)
        .await?)
}

pub async fn create_video(
    db: &DatabaseConnection,
    user: &CurrentUser,
    request: CreateVideoRequest,
) -> Result<video::Model, CatalogError> {
    let CreateVideoRequest { course_id, video } = request;
    let mut created = add_course_videos(
        db,
        user,
        course_id,
        AddVideosRequest {
            videos: vec![video],
        },
    )
    .await?;
    created.pop().ok_or(CatalogError::VideoNotFound)
}

/// Applies a partial update. A new url or type re-derives the YouTube id.
pub async fn update_video(
    db: &DatabaseConnection,
    user: &CurrentUser,
    video_id: Uuid,
    request: UpdateVideoRequest,
) -> Result<video::Model, CatalogError> {
    let txn = db.begin().await?;
    let existing = Video::find_by_id(video_id)
        .one(&txn)
        .await?
        .ok_or(CatalogError::VideoNotFound)?;
    find_owned_course(&txn, user, existing.course_id).await?;

    if let Some(Some(playlist_id)) = request.playlist_id {
        ensure_playlists_in_course(&txn, existing.course_id, &HashSet::from([playlist_id])).await?;
    }

    let url = match &request.url {
        Some(url) if url.trim().is_empty() => {
            return Err(CatalogError::Invalid("Video URL is required".to_string()));
        }
        Some(url) => url.trim().to_string(),
        None => existing.url.clone(),
    };
    let video_type = request.video_type.unwrap_or(existing.video_type);
    let youtube_id = derive_youtube_id(video_type, &url);

    let mut model: video::ActiveModel = existing.into();
    if let Some(title) = request.title {
        model.title = Set(title.trim().to_string());
    }
    if let Some(duration) = request.duration {
        model.duration = Set(duration);
    }
    if let Some(playlist_id) = request.playlist_id {
        model.playlist_id = Set(playlist_id);
    }
    if let Some(order) = request.order {
        model.order = Set(order);
    }
    if let Some(is_published) = request.is_published {
        model.is_published = Set(is_published);
    }
    model.url = Set(url);
    model.video_type = Set(video_type);
    model.youtube_id = Set(youtube_id);
    model.updated_at = Set(Utc::now());
    let video = model.update(&txn).await?;

    txn.commit().await?;
    Ok(video)
}

pub async fn delete_video(
    db: &DatabaseConnection,
    user: &CurrentUser,
    video_id: Uuid,
) -> Result<(), CatalogError> {
    let txn = db.begin().await?;
    let video = Video::find_by_id(video_id)
        .one(&txn)
        .await?
        .ok_or(CatalogError::VideoNotFound)?;
    find_owned_course(&txn, user, video.course_id).await?;

    video.delete(&txn).await?;
    txn.commit().await?;
    tracing::info!("Video {} deleted by {}", video_id, user.user_id);
    Ok(())
}

/// Points the given videos at a playlist, in the given order. Every video
/// must belong to `course_id`.
pub async fn attach_videos<C>(
    db: &C,
    course_id: Uuid,
    playlist_id: Uuid,
    video_ids: &[Uuid],
) -> Result<(), CatalogError>
where
    C: ConnectionTrait,
{
    if video_ids.is_empty() {
        return Ok(());
    }

    let unique: HashSet<Uuid> = video_ids.iter().copied().collect();
    let found = Video::find()
        .filter(video::Column::VideoId.is_in(unique.iter().copied()))
        .filter(video::Column::CourseId.eq(course_id))
        .all(db)
        .await?;
    if found.len() != unique.len() {
        return Err(CatalogError::Invalid(
            "Playlist videos must belong to the playlist's course".to_string(),
        ));
    }

    for (position, video_id) in video_ids.iter().enumerate() {
        Video::update_many()
            .col_expr(video::Column::PlaylistId, Expr::value(Some(playlist_id)))
            .col_expr(video::Column::Order, Expr::value(position as i32 + 1))
            .col_expr(video::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(video::Column::VideoId.eq(*video_id))
            .exec(db)
            .await?;
    }
    Ok(())
}

/// Unlinks every video from a playlist. The videos stay in the course.
pub async fn detach_videos<C>(db: &C, playlist_id: Uuid) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    Video::update_many()
        .col_expr(video::Column::PlaylistId, Expr::value(Option::<Uuid>::None))
        .filter(video::Column::PlaylistId.eq(playlist_id))
        .exec(db)
        .await?;
    Ok(())
}
