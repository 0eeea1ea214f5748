use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, ModelTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api_docs::Pagination;
use crate::auth::CurrentUser;
use crate::entities::course::{
    self, CourseDTO, CourseQuery, CourseSortField, CreateCourseRequest, SortOrder,
    UpdateCourseRequest,
};
use crate::entities::lesson::{self, CreateLessonRequest, LessonDTO};
use crate::entities::prelude::*;
use crate::entities::review::{self, CreateReviewRequest, ReviewDTO};
use crate::entities::user::{self, InstructorDTO};
use crate::entities::{
    enrolled_course, enrollment, lesson_completion, playlist, video, StringList,
};
use crate::error::AppError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_COURSE_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Course not found")]
    CourseNotFound,
    #[error("Lesson not found")]
    LessonNotFound,
    #[error("Video not found")]
    VideoNotFound,
    #[error("Playlist not found")]
    PlaylistNotFound,
    #[error("Course is not published")]
    NotPublished,
    #[error("Already enrolled in this course")]
    AlreadyEnrolled,
    #[error("You must be enrolled to review this course")]
    NotEnrolled,
    #[error("You have already reviewed this course")]
    DuplicateReview,
    #[error("A lesson with order {0} already exists in this course")]
    DuplicateLessonOrder(i32),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::CourseNotFound
            | CatalogError::LessonNotFound
            | CatalogError::VideoNotFound
            | CatalogError::PlaylistNotFound => AppError::NotFound(err.to_string()),
            CatalogError::NotPublished | CatalogError::Invalid(_) => {
                AppError::Validation(err.to_string())
            }
            CatalogError::AlreadyEnrolled
            | CatalogError::DuplicateReview
            | CatalogError::DuplicateLessonOrder(_) => AppError::Conflict(err.to_string()),
            CatalogError::NotEnrolled | CatalogError::Forbidden(_) => {
                AppError::Forbidden(err.to_string())
            }
            CatalogError::Db(e) => AppError::Database(e),
        }
    }
}

/// Resolves `page`/`limit` query values to a 1-based page and a bounded
/// page size.
pub fn page_params(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> (u64, u64) {
    let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(default_limit)
        .min(MAX_PAGE_SIZE);
    (page, limit)
}

pub fn page_offset(page: u64, limit: u64) -> u64 {
    (page.saturating_sub(1)).saturating_mul(limit)
}

/// Checks the list/discount price pair a course is saved with.
pub fn validate_pricing(price: f64, discount_price: Option<f64>) -> Result<(), CatalogError> {
    if !price.is_finite() || price < 0.0 {
        return Err(CatalogError::Invalid("Price cannot be negative".to_string()));
    }
    if let Some(discount) = discount_price {
        if !discount.is_finite() || discount < 0.0 {
            return Err(CatalogError::Invalid(
                "Discount price cannot be negative".to_string(),
            ));
        }
        if !course::is_valid_discount(price, discount) {
            return Err(CatalogError::Invalid(
                "Discount price must be less than regular price".to_string(),
            ));
        }
    }
    Ok(())
}

/// Average rating rounded to one decimal, and the number of ratings.
pub fn rating_summary(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let average = sum as f64 / ratings.len() as f64;
    ((average * 10.0).round() / 10.0, ratings.len() as i32)
}

/// `published_at` is stamped the first time a course is published and kept
/// afterwards, even if the course is unpublished again.
pub fn publish_timestamp(
    is_published: bool,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match published_at {
        Some(at) => Some(at),
        None if is_published => Some(now),
        None => None,
    }
}

fn normalize_tags(tags: Vec<String>) -> StringList {
    StringList::cleaned(tags.into_iter().map(|t| t.to_lowercase()).collect())
}

pub async fn find_course<C>(db: &C, course_id: Uuid) -> Result<course::Model, CatalogError>
where
    C: ConnectionTrait,
{
    Course::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or(CatalogError::CourseNotFound)
}

/// Loads a course the caller may manage (its instructor, or an admin).
pub async fn find_owned_course<C>(
    db: &C,
    user: &CurrentUser,
    course_id: Uuid,
) -> Result<course::Model, CatalogError>
where
    C: ConnectionTrait,
{
    let course = find_course(db, course_id).await?;
    if !user.can_manage(course.instructor_id) {
        return Err(CatalogError::Forbidden("Access denied".to_string()));
    }
    Ok(course)
}

pub async fn get_effective_price(
    db: &DatabaseConnection,
    course_id: Uuid,
) -> Result<f64, CatalogError> {
    Ok(find_course(db, course_id).await?.effective_price())
}

/// A course can be bought when it is published and the user has no
/// enrollment for it yet. Returns the course so callers can price it.
pub async fn is_eligible_for_enrollment(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<course::Model, CatalogError> {
    let course = find_course(db, course_id).await?;
    if !course.is_published {
        return Err(CatalogError::NotPublished);
    }

    let existing = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(CatalogError::AlreadyEnrolled);
    }

    Ok(course)
}

fn course_filter(query: &CourseQuery) -> Condition {
    let mut condition = Condition::all().add(course::Column::IsPublished.eq(true));

    if let Some(category) = query.category {
        condition = condition.add(course::Column::Category.eq(category));
    }
    if let Some(level) = query.level {
        condition = condition.add(course::Column::Level.eq(level));
    }
    if let Some(instructor) = query.instructor {
        condition = condition.add(course::Column::InstructorId.eq(instructor));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(course::Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(course::Column::Price.lte(max_price));
    }
    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", search.to_lowercase());
        let matches = |column: course::Column| {
            Expr::expr(Func::lower(Expr::col(column))).like(pattern.as_str())
        };
        condition = condition.add(
            Condition::any()
                .add(matches(course::Column::Title))
                .add(matches(course::Column::ShortDescription))
                .add(matches(course::Column::Description)),
        );
    }

    condition
}

fn sort_column(field: CourseSortField) -> course::Column {
    match field {
        CourseSortField::CreatedAt => course::Column::CreatedAt,
        CourseSortField::Price => course::Column::Price,
        CourseSortField::AverageRating => course::Column::AverageRating,
        CourseSortField::EnrollmentCount => course::Column::EnrollmentCount,
        CourseSortField::Title => course::Column::Title,
    }
}

async fn instructors_by_id<C>(
    db: &C,
    instructor_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, InstructorDTO>, DbErr>
where
    C: ConnectionTrait,
{
    if instructor_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let instructors = User::find()
        .filter(user::Column::UserId.is_in(instructor_ids))
        .all(db)
        .await?;
    Ok(instructors
        .into_iter()
        .map(|u| (u.user_id, InstructorDTO::from(u)))
        .collect())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CoursePage {
    pub courses: Vec<CourseDTO>,
    pub pagination: Pagination,
}

/// Published courses matching every given filter, one page at a time.
pub async fn list_courses(
    db: &DatabaseConnection,
    query: &CourseQuery,
) -> Result<CoursePage, CatalogError> {
    let (page, limit) = page_params(query.page, query.limit, DEFAULT_COURSE_PAGE_SIZE);
    let filter = course_filter(query);

    let order = match query.sort_order.unwrap_or_default() {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    };

    let courses = Course::find()
        .filter(filter.clone())
        .order_by(sort_column(query.sort_by.unwrap_or_default()), order)
        .order_by_asc(course::Column::CourseId)
        .offset(page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await?;
    let total = Course::find().filter(filter).count(db).await?;

    let mut instructor_ids: Vec<Uuid> = courses.iter().map(|c| c.instructor_id).collect();
    instructor_ids.sort();
    instructor_ids.dedup();
    let instructors = instructors_by_id(db, instructor_ids).await?;

    let courses = courses
        .into_iter()
        .map(|c| {
            let instructor = instructors.get(&c.instructor_id).cloned();
            CourseDTO::from(c).with_instructor(instructor)
        })
        .collect();

    Ok(CoursePage {
        courses,
        pagination: Pagination::new(page, limit, total),
    })
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseDetail {
    pub course: CourseDTO,
    pub lessons: Vec<LessonDTO>,
    pub reviews: Vec<ReviewDTO>,
    pub is_enrolled: bool,
    pub user_progress: i32,
}

/// Course page data. Without an enrollment only preview lessons are listed.
/// Unpublished courses are only visible to their instructor and admins.
pub async fn get_course_detail(
    db: &DatabaseConnection,
    course_id: Uuid,
    viewer: Option<&CurrentUser>,
) -> Result<CourseDetail, CatalogError> {
    let course = find_course(db, course_id).await?;

    let can_manage = viewer.is_some_and(|v| v.can_manage(course.instructor_id));
    if !course.is_published && !can_manage {
        return Err(CatalogError::CourseNotFound);
    }

    let enrollment = match viewer {
        Some(viewer) => {
            Enrollment::find()
                .filter(enrollment::Column::UserId.eq(viewer.user_id))
                .filter(enrollment::Column::CourseId.eq(course_id))
                .one(db)
                .await?
        }
        None => None,
    };
    let is_enrolled = enrollment.is_some();
    let user_progress = enrollment.map(|e| e.progress).unwrap_or(0);

    let lessons = list_lessons(db, course_id).await?;
    let lessons = lessons
        .into_iter()
        .filter(|l| is_enrolled || can_manage || l.is_preview)
        .map(LessonDTO::from)
        .collect();

    let reviews = Review::find()
        .filter(review::Column::CourseId.eq(course_id))
        .order_by_desc(review::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(ReviewDTO::from)
        .collect();

    let instructor = User::find_by_id(course.instructor_id)
        .one(db)
        .await?
        .map(InstructorDTO::from);

    Ok(CourseDetail {
        course: CourseDTO::from(course).with_instructor(instructor),
        lessons,
        reviews,
        is_enrolled,
        user_progress,
    })
}

pub async fn create_course(
    db: &DatabaseConnection,
    instructor_id: Uuid,
    request: CreateCourseRequest,
) -> Result<course::Model, CatalogError> {
    validate_pricing(request.price, request.discount_price)?;

    let now = Utc::now();
    let course = course::ActiveModel {
        course_id: Set(Uuid::new_v4()),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        short_description: Set(request.short_description),
        instructor_id: Set(instructor_id),
        category: Set(request.category),
        level: Set(request.level),
        price: Set(request.price),
        discount_price: Set(request.discount_price),
        thumbnail: Set(request.thumbnail),
        preview_video: Set(request.preview_video),
        duration: Set(request.duration),
        requirements: Set(StringList::cleaned(request.requirements)),
        what_you_will_learn: Set(StringList::cleaned(request.what_you_will_learn)),
        tags: Set(normalize_tags(request.tags)),
        language: Set(request.language.unwrap_or_else(|| "English".to_string())),
        enrollment_count: Set(0),
        average_rating: Set(0.0),
        total_ratings: Set(0),
        is_published: Set(request.is_published),
        published_at: Set(publish_timestamp(request.is_published, None, now)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let course = course.insert(db).await?;
    tracing::info!(
        "Course {} created by instructor {}",
        course.course_id,
        instructor_id
    );
    Ok(course)
}

pub async fn update_course(
    db: &DatabaseConnection,
    user: &CurrentUser,
    course_id: Uuid,
    request: UpdateCourseRequest,
) -> Result<course::Model, CatalogError> {
    let existing = find_owned_course(db, user, course_id).await?;

    let price = request.price.unwrap_or(existing.price);
    let discount_price = match request.discount_price {
        Some(discount) => discount,
        None => existing.discount_price,
    };
    validate_pricing(price, discount_price)?;

    let now = Utc::now();
    let is_published = request.is_published.unwrap_or(existing.is_published);
    let published_at = publish_timestamp(is_published, existing.published_at, now);

    let mut model: course::ActiveModel = existing.into();
    if let Some(title) = request.title {
        model.title = Set(title.trim().to_string());
    }
    if let Some(description) = request.description {
        model.description = Set(description);
    }
    if let Some(short_description) = request.short_description {
        model.short_description = Set(short_description);
    }
    if let Some(category) = request.category {
        model.category = Set(category);
    }
    if let Some(level) = request.level {
        model.level = Set(level);
    }
    if let Some(thumbnail) = request.thumbnail {
        model.thumbnail = Set(thumbnail);
    }
    if let Some(preview_video) = request.preview_video {
        model.preview_video = Set(Some(preview_video));
    }
    if let Some(duration) = request.duration {
        model.duration = Set(duration);
    }
    if let Some(requirements) = request.requirements {
        model.requirements = Set(StringList::cleaned(requirements));
    }
    if let Some(outcomes) = request.what_you_will_learn {
        let outcomes = StringList::cleaned(outcomes);
        if outcomes.0.is_empty() {
            return Err(CatalogError::Invalid(
                "At least one learning outcome is required".to_string(),
            ));
        }
        model.what_you_will_learn = Set(outcomes);
    }
    if let Some(tags) = request.tags {
        model.tags = Set(normalize_tags(tags));
    }
    if let Some(language) = request.language {
        model.language = Set(language);
    }
    model.price = Set(price);
    model.discount_price = Set(discount_price);
    model.is_published = Set(is_published);
    model.published_at = Set(published_at);
    model.updated_at = Set(now);

    Ok(model.update(db).await?)
}

/// Removes a course together with its lessons, videos, playlists, reviews
/// and enrollments.
pub async fn delete_course(
    db: &DatabaseConnection,
    user: &CurrentUser,
    course_id: Uuid,
) -> Result<(), CatalogError> {
    let txn = db.begin().await?;
    let course = find_owned_course(&txn, user, course_id).await?;

    let enrollment_ids: Vec<Uuid> = Enrollment::find()
        .select_only()
        .column(enrollment::Column::EnrollmentId)
        .filter(enrollment::Column::CourseId.eq(course_id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !enrollment_ids.is_empty() {
        LessonCompletion::delete_many()
            .filter(lesson_completion::Column::EnrollmentId.is_in(enrollment_ids))
            .exec(&txn)
            .await?;
    }
    Enrollment::delete_many()
        .filter(enrollment::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    EnrolledCourse::delete_many()
        .filter(enrolled_course::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    Review::delete_many()
        .filter(review::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    Video::delete_many()
        .filter(video::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    Playlist::delete_many()
        .filter(playlist::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    Lesson::delete_many()
        .filter(lesson::Column::CourseId.eq(course_id))
        .exec(&txn)
        .await?;
    course.delete(&txn).await?;

    txn.commit().await?;
    tracing::info!("Course {} deleted by {}", course_id, user.user_id);
    Ok(())
}

pub async fn list_lessons<C>(db: &C, course_id: Uuid) -> Result<Vec<lesson::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Lesson::find()
        .filter(lesson::Column::CourseId.eq(course_id))
        .order_by_asc(lesson::Column::Order)
        .all(db)
        .await
}

pub async fn add_lesson(
    db: &DatabaseConnection,
    user: &CurrentUser,
    course_id: Uuid,
    request: CreateLessonRequest,
) -> Result<lesson::Model, CatalogError> {
    find_owned_course(db, user, course_id).await?;

    let order_taken = Lesson::find()
        .filter(lesson::Column::CourseId.eq(course_id))
        .filter(lesson::Column::Order.eq(request.order))
        .one(db)
        .await?
        .is_some();
    if order_taken {
        return Err(CatalogError::DuplicateLessonOrder(request.order));
    }

    let now = Utc::now();
    let lesson = lesson::ActiveModel {
        lesson_id: Set(Uuid::new_v4()),
        course_id: Set(course_id),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        order: Set(request.order),
        lesson_type: Set(request.lesson_type),
        content: Set(request.content),
        duration: Set(request.duration),
        is_preview: Set(request.is_preview),
        is_published: Set(request.is_published),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(lesson.insert(db).await?)
}

/// Adds a review from an enrolled user and refreshes the course's rating
/// aggregate.
pub async fn add_review(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
    request: CreateReviewRequest,
) -> Result<review::Model, CatalogError> {
    if !(1..=5).contains(&request.rating) {
        return Err(CatalogError::Invalid(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let txn = db.begin().await?;
    let course = find_course(&txn, course_id).await?;

    let enrolled = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .one(&txn)
        .await?
        .is_some();
    if !enrolled {
        return Err(CatalogError::NotEnrolled);
    }

    let already_reviewed = Review::find()
        .filter(review::Column::CourseId.eq(course_id))
        .filter(review::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
        .is_some();
    if already_reviewed {
        return Err(CatalogError::DuplicateReview);
    }

    let review = review::ActiveModel {
        review_id: Set(Uuid::new_v4()),
        course_id: Set(course_id),
        user_id: Set(user_id),
        rating: Set(request.rating),
        comment: Set(request
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;

    let ratings: Vec<i32> = Review::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::CourseId.eq(course_id))
        .into_tuple()
        .all(&txn)
        .await?;
    let (average_rating, total_ratings) = rating_summary(&ratings);

    let mut course: course::ActiveModel = course.into();
    course.average_rating = Set(average_rating);
    course.total_ratings = Set(total_ratings);
    course.updated_at = Set(Utc::now());
    course.update(&txn).await?;

    txn.commit().await?;
    Ok(review)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentProgress {
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseAnalytics {
    pub total_enrollments: u64,
    pub completed_enrollments: u64,
    pub average_progress: f64,
    pub total_revenue: f64,
    /// "YYYY-MM" -> enrollments started that month.
    pub enrollments_by_month: BTreeMap<String, u64>,
    pub student_progress: Vec<StudentProgress>,
}

pub async fn course_analytics(
    db: &DatabaseConnection,
    user: &CurrentUser,
    course_id: Uuid,
) -> Result<CourseAnalytics, CatalogError> {
    find_owned_course(db, user, course_id).await?;

    let enrollments = Enrollment::find()
        .filter(enrollment::Column::CourseId.eq(course_id))
        .order_by_desc(enrollment::Column::EnrollmentDate)
        .find_also_related(User)
        .all(db)
        .await?;

    let total_enrollments = enrollments.len() as u64;
    let completed_enrollments = enrollments
        .iter()
        .filter(|(e, _)| e.status == enrollment::EnrollmentStatus::Completed)
        .count() as u64;
    let average_progress = if enrollments.is_empty() {
        0.0
    } else {
        enrollments.iter().map(|(e, _)| f64::from(e.progress)).sum::<f64>()
            / enrollments.len() as f64
    };
    let total_revenue = enrollments
        .iter()
        .map(|(e, _)| e.payment_amount.unwrap_or(0.0))
        .sum();

    let mut enrollments_by_month = BTreeMap::new();
    for (e, _) in &enrollments {
        *enrollments_by_month
            .entry(e.enrollment_date.format("%Y-%m").to_string())
            .or_insert(0) += 1;
    }

    let student_progress = enrollments
        .into_iter()
        .map(|(e, student)| StudentProgress {
            user_id: e.user_id,
            first_name: student.as_ref().map(|s| s.first_name.clone()),
            last_name: student.as_ref().map(|s| s.last_name.clone()),
            email: student.map(|s| s.email),
            progress: e.progress,
            enrolled_at: e.enrollment_date,
            last_accessed: e.last_accessed_at,
        })
        .collect();

    Ok(CourseAnalytics {
        total_enrollments,
        completed_enrollments,
        average_progress,
        total_revenue,
        enrollments_by_month,
        student_progress,
    })
}

/// Courses authored by an instructor, newest first, published or not.
pub async fn list_created_courses(
    db: &DatabaseConnection,
    instructor_id: Uuid,
    page: u64,
    limit: u64,
) -> Result<(Vec<course::Model>, u64), DbErr> {
    let query = Course::find().filter(course::Column::InstructorId.eq(instructor_id));
    let total = query.clone().count(db).await?;
    let courses = query
        .order_by_desc(course::Column::CreatedAt)
        .offset(page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await?;
    Ok((courses, total))
}
