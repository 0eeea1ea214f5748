use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::entities::playlist::{self, CreatePlaylistRequest, PlaylistDTO, UpdatePlaylistRequest};
use crate::entities::prelude::*;
use crate::entities::video::{self, VideoDTO};
use crate::services::course_service::{find_owned_course, CatalogError};
use crate::services::video_service;

pub async fn find_playlist(
    db: &DatabaseConnection,
    playlist_id: Uuid,
) -> Result<playlist::Model, CatalogError> {
    Playlist::find_by_id(playlist_id)
        .one(db)
        .await?
        .ok_or(CatalogError::PlaylistNotFound)
}

/// Playlists with their videos, optionally limited to one course.
pub async fn list_playlists(
    db: &DatabaseConnection,
    course_id: Option<Uuid>,
) -> Result<Vec<PlaylistDTO>, CatalogError> {
    let mut query = Playlist::find();
    if let Some(course_id) = course_id {
        query = query.filter(playlist::Column::CourseId.eq(course_id));
    }
    let playlists = query
        .order_by_asc(playlist::Column::CourseId)
        .order_by_asc(playlist::Column::Order)
        .all(db)
        .await?;

    let ids: Vec<Uuid> = playlists.iter().map(|p| p.playlist_id).collect();
    let mut videos_by_playlist: HashMap<Uuid, Vec<VideoDTO>> = HashMap::new();
    if !ids.is_empty() {
        let videos = Video::find()
            .filter(video::Column::PlaylistId.is_in(ids))
            .order_by_asc(video::Column::Order)
            .all(db)
            .await?;
        for video in videos {
            if let Some(playlist_id) = video.playlist_id {
                videos_by_playlist
                    .entry(playlist_id)
                    .or_default()
                    .push(VideoDTO::from(video));
            }
        }
    }

    Ok(playlists
        .into_iter()
        .map(|p| {
            let videos = videos_by_playlist.remove(&p.playlist_id).unwrap_or_default();
            PlaylistDTO::new(p, videos)
        })
        .collect())
}

pub async fn get_playlist(
    db: &DatabaseConnection,
    playlist_id: Uuid,
) -> Result<PlaylistDTO, CatalogError> {
    let playlist = find_playlist(db, playlist_id).await?;
    let videos = video_service::videos_in_playlist(db, playlist_id).await?;
    Ok(PlaylistDTO::new(
        playlist,
        videos.into_iter().map(VideoDTO::from).collect(),
    ))
}

pub async fn create_playlist(
    db: &DatabaseConnection,
    user: &CurrentUser,
    request: CreatePlaylistRequest,
) -> Result<PlaylistDTO, CatalogError> {
    let txn = db.begin().await?;
    find_owned_course(&txn, user, request.course_id).await?;

    let now = Utc::now();
    let playlist = playlist::ActiveModel {
        playlist_id: Set(Uuid::new_v4()),
        course_id: Set(request.course_id),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        order: Set(request.order),
        is_published: Set(request.is_published),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    video_service::attach_videos(&txn, playlist.course_id, playlist.playlist_id, &request.video_ids)
        .await?;
    let videos = video_service::videos_in_playlist(&txn, playlist.playlist_id).await?;

    txn.commit().await?;
    tracing::info!("Playlist {} created for course {}", playlist.playlist_id, playlist.course_id);
    Ok(PlaylistDTO::new(
        playlist,
        videos.into_iter().map(VideoDTO::from).collect(),
    ))
}

pub async fn update_playlist(
    db: &DatabaseConnection,
    user: &CurrentUser,
    playlist_id: Uuid,
    request: UpdatePlaylistRequest,
) -> Result<PlaylistDTO, CatalogError> {
    let txn = db.begin().await?;
    let existing = Playlist::find_by_id(playlist_id)
        .one(&txn)
        .await?
        .ok_or(CatalogError::PlaylistNotFound)?;
    find_owned_course(&txn, user, existing.course_id).await?;

    let course_id = existing.course_id;
    let mut model: playlist::ActiveModel = existing.into();
    if let Some(title) = request.title {
        model.title = Set(title.trim().to_string());
    }
    if let Some(description) = request.description {
        model.description = Set(Some(description));
    }
    if let Some(order) = request.order {
        model.order = Set(order);
    }
    if let Some(is_published) = request.is_published {
        model.is_published = Set(is_published);
    }
    model.updated_at = Set(Utc::now());
    let playlist = model.update(&txn).await?;

    if let Some(video_ids) = request.video_ids {
        video_service::detach_videos(&txn, playlist_id).await?;
        video_service::attach_videos(&txn, course_id, playlist_id, &video_ids).await?;
    }
    let videos = video_service::videos_in_playlist(&txn, playlist_id).await?;

    txn.commit().await?;
    Ok(PlaylistDTO::new(
        playlist,
        videos.into_iter().map(VideoDTO::from).collect(),
    ))
}

/// Deletes a playlist. Its videos stay in the course, unlinked.
pub async fn delete_playlist(
    db: &DatabaseConnection,
    user: &CurrentUser,
    playlist_id: Uuid,
) -> Result<(), CatalogError> {
    let txn = db.begin().await?;
    let playlist = Playlist::find_by_id(playlist_id)
        .one(&txn)
        .await?
        .ok_or(CatalogError::PlaylistNotFound)?;
    find_owned_course(&txn, user, playlist.course_id).await?;

    video_service::detach_videos(&txn, playlist_id).await?;
    playlist.delete(&txn).await?;

    txn.commit().await?;
    tracing::info!("Playlist {} deleted by {}", playlist_id, user.user_id);
    Ok(())
}
