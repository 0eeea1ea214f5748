use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api_docs::Pagination;
use crate::entities::course::{self, CourseDTO};
use crate::entities::enrollment::{
    self, CourseProgressRequest, EnrollmentDTO, EnrollmentListQuery, EnrollmentStatus,
};
use crate::entities::prelude::*;
use crate::entities::user::UserDTO;
use crate::entities::{enrolled_course, lesson, lesson_completion};
use crate::error::AppError;
use crate::services::course_service::{page_offset, page_params};

pub const DEFAULT_ENROLLMENT_PAGE_SIZE: u64 = 10;
const RECENT_ENROLLMENTS: usize = 5;
const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Enrollment not found")]
    EnrollmentNotFound,
    #[error("Course not found")]
    CourseNotFound,
    #[error("Lesson not found")]
    LessonNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl From<EnrollmentError> for AppError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::Db(e) => AppError::Database(e),
            other => AppError::NotFound(other.to_string()),
        }
    }
}

/// Settlement details recorded on an enrollment bought through the
/// payment processor.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentPayment {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
}

/// Result of an enroll call. `created` is false when the user already had
/// an enrollment for the course and that record was returned instead.
#[derive(Debug, Clone)]
pub struct Enrolled {
    pub enrollment: enrollment::Model,
    pub created: bool,
}

/// `round(100 * completed / total)` clamped to 0..=100; a course without
/// lessons has no progress to make.
pub fn compute_progress(completed: u64, total: u64) -> i32 {
    if total == 0 {
        return 0;
    }
    let progress = (completed as f64 * 100.0 / total as f64).round() as i32;
    progress.clamp(0, 100)
}

/// Consecutive days with learning activity, counting back from `today`.
/// Several accesses on the same day count once.
pub fn learning_streak(mut access_days: Vec<NaiveDate>, today: NaiveDate) -> u32 {
    access_days.sort_unstable_by(|a, b| b.cmp(a));

    let mut streak = 0u32;
    for day in access_days {
        let days_ago = (today - day).num_days();
        if days_ago == i64::from(streak) {
            streak += 1;
        } else if days_ago > i64::from(streak) {
            break;
        }
    }
    streak
}

pub async fn find_by_id<C>(db: &C, enrollment_id: Uuid) -> Result<Option<enrollment::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Enrollment::find_by_id(enrollment_id).one(db).await
}

pub async fn find_for_user_course<C>(
    db: &C,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<enrollment::Model>, DbErr>
where
    C: ConnectionTrait,
{
    Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .one(db)
        .await
}

pub async fn completed_lessons<C>(
    db: &C,
    enrollment_id: Uuid,
) -> Result<Vec<lesson_completion::Model>, DbErr>
where
    C: ConnectionTrait,
{
    LessonCompletion::find()
        .filter(lesson_completion::Column::EnrollmentId.eq(enrollment_id))
        .order_by_asc(lesson_completion::Column::CompletedAt)
        .all(db)
        .await
}

/// Enrolls a user in a course at no charge.
pub async fn enroll(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Enrolled, EnrollmentError> {
    create_enrollment(db, user_id, course_id, None).await
}

/// Enrolls a user after a settled payment. Calling this again for the same
/// pair, from the webhook or a retried confirmation, returns the existing
/// enrollment untouched.
pub async fn enroll_with_payment(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
    payment: EnrollmentPayment,
) -> Result<Enrolled, EnrollmentError> {
    create_enrollment(db, user_id, course_id, Some(payment)).await
}

async fn create_enrollment(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
    payment: Option<EnrollmentPayment>,
) -> Result<Enrolled, EnrollmentError> {
    if Course::find_by_id(course_id).one(db).await?.is_none() {
        return Err(EnrollmentError::CourseNotFound);
    }

    if let Some(existing) = find_for_user_course(db, user_id, course_id).await? {
        return Ok(Enrolled {
            enrollment: existing,
            created: false,
        });
    }

    let txn = db.begin().await?;
    match insert_enrollment(&txn, user_id, course_id, payment).await {
        Ok(enrollment) => {
            txn.commit().await?;
            tracing::info!("User {} enrolled in course {}", user_id, course_id);
            Ok(Enrolled {
                enrollment,
                created: true,
            })
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            // Another writer enrolled the same pair first
            txn.rollback().await?;
            let existing = find_for_user_course(db, user_id, course_id)
                .await?
                .ok_or(EnrollmentError::Db(e))?;
            tracing::debug!(
                "Enrollment race for user {} course {} settled by the unique index",
                user_id,
                course_id
            );
            Ok(Enrolled {
                enrollment: existing,
                created: false,
            })
        }
        Err(e) => Err(e.into()),
    }
}

async fn insert_enrollment(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    course_id: Uuid,
    payment: Option<EnrollmentPayment>,
) -> Result<enrollment::Model, DbErr> {
    let now = Utc::now();

    let mut model = enrollment::ActiveModel {
        enrollment_id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        course_id: Set(course_id),
        enrollment_date: Set(now),
        completion_date: Set(None),
        progress: Set(0),
        total_time_spent: Set(0),
        last_accessed_lesson_id: Set(None),
        last_accessed_at: Set(now),
        certificate_issued: Set(false),
        status: Set(EnrollmentStatus::Active),
        payment_transaction_id: Set(None),
        payment_amount: Set(None),
        payment_currency: Set(None),
        payment_method: Set(None),
        payment_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    if let Some(payment) = payment {
        model.payment_transaction_id = Set(Some(payment.transaction_id));
        model.payment_amount = Set(Some(payment.amount));
        model.payment_currency = Set(Some(payment.currency));
        model.payment_method = Set(Some(payment.payment_method));
        model.payment_date = Set(Some(now));
    }
    let enrollment = model.insert(txn).await?;

    Course::update_many()
        .col_expr(
            course::Column::EnrollmentCount,
            Expr::col(course::Column::EnrollmentCount).add(1),
        )
        .filter(course::Column::CourseId.eq(course_id))
        .exec(txn)
        .await?;

    EnrolledCourse::insert(enrolled_course::ActiveModel {
        user_id: Set(user_id),
        course_id: Set(course_id),
        enrolled_at: Set(now),
    })
    .on_conflict(
        OnConflict::columns([
            enrolled_course::Column::UserId,
            enrolled_course::Column::CourseId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(txn)
    .await?;

    Ok(enrollment)
}

/// Records a lesson as completed. Completing a lesson twice changes
/// nothing. Progress is recalculated either way.
pub async fn complete_lesson(
    db: &DatabaseConnection,
    enrollment_id: Uuid,
    lesson_id: Uuid,
    time_spent: i32,
    score: Option<f64>,
) -> Result<enrollment::Model, EnrollmentError> {
    let txn = db.begin().await?;

    let enrollment = find_by_id(&txn, enrollment_id)
        .await?
        .ok_or(EnrollmentError::EnrollmentNotFound)?;

    Lesson::find_by_id(lesson_id)
        .filter(lesson::Column::CourseId.eq(enrollment.course_id))
        .one(&txn)
        .await?
        .ok_or(EnrollmentError::LessonNotFound)?;

    let now = Utc::now();
    let time_spent = time_spent.max(0);
    // A repeat, or a concurrent first completion, hits the unique
    // (enrollment_id, lesson_id) index and inserts nothing.
    let inserted = LessonCompletion::insert(lesson_completion::ActiveModel {
        completion_id: Set(Uuid::new_v4()),
        enrollment_id: Set(enrollment_id),
        lesson_id: Set(lesson_id),
        completed_at: Set(now),
        time_spent: Set(time_spent),
        score: Set(score),
    })
    .on_conflict(
        OnConflict::columns([
            lesson_completion::Column::EnrollmentId,
            lesson_completion::Column::LessonId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    let enrollment = if inserted == 0 {
        enrollment
    } else {
        let total_time_spent = enrollment.total_time_spent.saturating_add(time_spent);
        let mut model: enrollment::ActiveModel = enrollment.into();
        model.total_time_spent = Set(total_time_spent);
        model.last_accessed_lesson_id = Set(Some(lesson_id));
        model.last_accessed_at = Set(now);
        model.updated_at = Set(now);
        model.update(&txn).await?
    };

    let enrollment = recalculate(&txn, enrollment).await?;
    txn.commit().await?;
    Ok(enrollment)
}

pub async fn recalculate_progress(
    db: &DatabaseConnection,
    enrollment_id: Uuid,
) -> Result<enrollment::Model, EnrollmentError> {
    let enrollment = find_by_id(db, enrollment_id)
        .await?
        .ok_or(EnrollmentError::EnrollmentNotFound)?;
    Ok(recalculate(db, enrollment).await?)
}

async fn recalculate<C>(db: &C, enrollment: enrollment::Model) -> Result<enrollment::Model, DbErr>
where
    C: ConnectionTrait,
{
    let total = Lesson::find()
        .filter(lesson::Column::CourseId.eq(enrollment.course_id))
        .count(db)
        .await?;
    let completed = LessonCompletion::find()
        .filter(lesson_completion::Column::EnrollmentId.eq(enrollment.enrollment_id))
        .count(db)
        .await?;

    let progress = compute_progress(completed, total);
    let first_completion = progress >= 100 && enrollment.completion_date.is_none();
    if progress == enrollment.progress && !first_completion {
        return Ok(enrollment);
    }

    let now = Utc::now();
    let mut model: enrollment::ActiveModel = enrollment.into();
    model.progress = Set(progress);
    if first_completion {
        model.completion_date = Set(Some(now));
        model.status = Set(EnrollmentStatus::Completed);
    }
    model.updated_at = Set(now);
    model.update(db).await
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressUpdate {
    pub progress: i32,
    pub completed_lessons: u64,
}

/// Progress report from the learner's player. A completed lesson is
/// recorded in the ledger; otherwise only the last access is updated.
pub async fn update_course_progress(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
    request: CourseProgressRequest,
) -> Result<ProgressUpdate, EnrollmentError> {
    let enrollment = find_for_user_course(db, user_id, course_id)
        .await?
        .ok_or(EnrollmentError::EnrollmentNotFound)?;

    let enrollment = match request.lesson_id {
        Some(lesson_id) if request.completed => {
            complete_lesson(
                db,
                enrollment.enrollment_id,
                lesson_id,
                request.time_spent,
                request.score,
            )
            .await?
        }
        Some(lesson_id) => {
            Lesson::find_by_id(lesson_id)
                .filter(lesson::Column::CourseId.eq(course_id))
                .one(db)
                .await?
                .ok_or(EnrollmentError::LessonNotFound)?;

            // Time only counts once the lesson is completed
            let now = Utc::now();
            let mut model: enrollment::ActiveModel = enrollment.into();
            model.last_accessed_lesson_id = Set(Some(lesson_id));
            model.last_accessed_at = Set(now);
            model.updated_at = Set(now);
            model.update(db).await?
        }
        None => enrollment,
    };

    let completed_lessons = LessonCompletion::find()
        .filter(lesson_completion::Column::EnrollmentId.eq(enrollment.enrollment_id))
        .count(db)
        .await?;

    Ok(ProgressUpdate {
        progress: enrollment.progress,
        completed_lessons,
    })
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentPage {
    pub enrollments: Vec<EnrollmentDTO>,
    pub pagination: Pagination,
}

/// The user's enrollments, newest first, each with its course.
pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
    query: &EnrollmentListQuery,
) -> Result<EnrollmentPage, EnrollmentError> {
    let (page, limit) = page_params(query.page, query.limit, DEFAULT_ENROLLMENT_PAGE_SIZE);

    let mut select = Enrollment::find().filter(enrollment::Column::UserId.eq(user_id));
    if let Some(status) = query.status {
        select = select.filter(enrollment::Column::Status.eq(status));
    }

    let total = select.clone().count(db).await?;
    let rows = select
        .order_by_desc(enrollment::Column::EnrollmentDate)
        .offset(page_offset(page, limit))
        .limit(limit)
        .find_also_related(Course)
        .all(db)
        .await?;

    let enrollments = rows
        .into_iter()
        .map(|(enrollment, course)| {
            EnrollmentDTO::from(enrollment).with_course(course.map(CourseDTO::from))
        })
        .collect();

    Ok(EnrollmentPage {
        enrollments,
        pagination: Pagination::new(page, limit, total),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentStats {
    pub total_enrolled_courses: u64,
    pub completed_courses: u64,
    pub in_progress_courses: u64,
    pub total_time_spent: i64,
    pub average_progress: f64,
}

pub fn enrollment_stats(enrollments: &[enrollment::Model]) -> EnrollmentStats {
    let count_status = |status: EnrollmentStatus| {
        enrollments.iter().filter(|e| e.status == status).count() as u64
    };
    let average_progress = if enrollments.is_empty() {
        0.0
    } else {
        enrollments.iter().map(|e| f64::from(e.progress)).sum::<f64>() / enrollments.len() as f64
    };

    EnrollmentStats {
        total_enrolled_courses: enrollments.len() as u64,
        completed_courses: count_status(EnrollmentStatus::Completed),
        in_progress_courses: count_status(EnrollmentStatus::Active),
        total_time_spent: enrollments
            .iter()
            .map(|e| i64::from(e.total_time_spent))
            .sum(),
        average_progress,
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub user: UserDTO,
    pub stats: EnrollmentStats,
    pub recent_enrollments: Vec<EnrollmentDTO>,
}

pub async fn dashboard(db: &DatabaseConnection, user_id: Uuid) -> Result<Dashboard, EnrollmentError> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(EnrollmentError::UserNotFound)?;

    let rows = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .order_by_desc(enrollment::Column::LastAccessedAt)
        .find_also_related(Course)
        .all(db)
        .await?;

    let enrollments: Vec<enrollment::Model> = rows.iter().map(|(e, _)| e.clone()).collect();
    let stats = enrollment_stats(&enrollments);

    let recent_enrollments = rows
        .into_iter()
        .take(RECENT_ENROLLMENTS)
        .map(|(enrollment, course)| {
            EnrollmentDTO::from(enrollment).with_course(course.map(CourseDTO::from))
        })
        .collect();

    Ok(Dashboard {
        user: UserDTO::from(user),
        stats,
        recent_enrollments,
    })
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LearningStats {
    #[serde(flatten)]
    pub totals: EnrollmentStats,
    pub courses_this_month: u64,
    pub time_spent_this_month: i64,
    pub streak: u32,
    pub category_breakdown: BTreeMap<String, u64>,
}

pub async fn learning_stats(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<LearningStats, EnrollmentError> {
    let rows = Enrollment::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .find_also_related(Course)
        .all(db)
        .await?;

    let now = Utc::now();
    Ok(summarize_learning(&rows, now))
}

fn summarize_learning(
    rows: &[(enrollment::Model, Option<course::Model>)],
    now: DateTime<Utc>,
) -> LearningStats {
    let enrollments: Vec<enrollment::Model> = rows.iter().map(|(e, _)| e.clone()).collect();
    let window_start = now - Duration::days(RECENT_WINDOW_DAYS);

    let recent: Vec<&enrollment::Model> = enrollments
        .iter()
        .filter(|e| e.enrollment_date >= window_start)
        .collect();

    let mut category_breakdown = BTreeMap::new();
    for course in rows.iter().filter_map(|(_, c)| c.as_ref()) {
        *category_breakdown
            .entry(course.category.label().to_string())
            .or_insert(0) += 1;
    }

    let access_days = enrollments
        .iter()
        .map(|e| e.last_accessed_at.date_naive())
        .collect();

    LearningStats {
        totals: enrollment_stats(&enrollments),
        courses_this_month: recent.len() as u64,
        time_spent_this_month: recent.iter().map(|e| i64::from(e.total_time_spent)).sum(),
        streak: learning_streak(access_days, now.date_naive()),
        category_breakdown,
    }
}
