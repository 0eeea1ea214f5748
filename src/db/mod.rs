use sea_orm::sea_query::*;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityName, EntityTrait,
    Schema,
};
use std::time::Duration;

use crate::entities::prelude::*;
use crate::entities::{course, enrollment, lesson, lesson_completion, review, video};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    // Set up connection options
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(10)
        .min_connections(3)
        .connect_timeout(Duration::from_secs(15))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Info);

    // Connect to the database
    Database::connect(opt).await
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let stmt = schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;
    Ok(())
}

async fn create_index<E, C>(
    db: &DatabaseConnection,
    name: &str,
    entity: E,
    columns: Vec<C>,
    unique: bool,
) -> Result<(), DbErr>
where
    E: EntityName,
    C: IntoIden,
{
    let builder = db.get_database_backend();
    let mut idx_stmt = IndexCreateStatement::new();
    idx_stmt.name(name).table(entity.table_ref()).if_not_exists();
    for column in columns {
        idx_stmt.col(column);
    }
    if unique {
        idx_stmt.unique();
    }
    db.execute(builder.build(&idx_stmt)).await?;
    Ok(())
}

/// Creates every table and index the service needs. Referenced tables are
/// created first so foreign keys resolve.
pub async fn ensure_schema_exists(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Generate schema builder
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Course).await?;
    create_table(db, &schema, Lesson).await?;
    create_table(db, &schema, Playlist).await?;
    create_table(db, &schema, Video).await?;
    create_table(db, &schema, Enrollment).await?;
    create_table(db, &schema, LessonCompletion).await?;
    create_table(db, &schema, Review).await?;
    create_table(db, &schema, EnrolledCourse).await?;

    // One enrollment per (user, course). Concurrent enrollment attempts for
    // the same pair are settled by this index.
    create_index(
        db,
        "idx_enrollments_user_course",
        Enrollment,
        vec![enrollment::Column::UserId, enrollment::Column::CourseId],
        true,
    )
    .await?;
    create_index(
        db,
        "idx_enrollments_course_status",
        Enrollment,
        vec![enrollment::Column::CourseId, enrollment::Column::Status],
        false,
    )
    .await?;
    create_index(
        db,
        "idx_lesson_completions_enrollment_lesson",
        LessonCompletion,
        vec![
            lesson_completion::Column::EnrollmentId,
            lesson_completion::Column::LessonId,
        ],
        true,
    )
    .await?;
    create_index(
        db,
        "idx_lessons_course_order",
        Lesson,
        vec![lesson::Column::CourseId, lesson::Column::Order],
        true,
    )
    .await?;
    create_index(
        db,
        "idx_courses_instructor",
        Course,
        vec![course::Column::InstructorId],
        false,
    )
    .await?;
    create_index(
        db,
        "idx_courses_published",
        Course,
        vec![course::Column::IsPublished],
        false,
    )
    .await?;
    create_index(
        db,
        "idx_reviews_course",
        Review,
        vec![review::Column::CourseId],
        false,
    )
    .await?;
    create_index(
        db,
        "idx_videos_course",
        Video,
        vec![video::Column::CourseId],
        false,
    )
    .await?;

    Ok(())
}
