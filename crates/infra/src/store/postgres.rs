//! Postgres-backed course store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | StoreError |
//! |---|---|---|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Storage` |
//! | PoolClosed / RowNotFound / other | n/a | `Storage` |
//!
//! Runtime-checked queries only (`sqlx::query`), so the crate builds without a
//! live database.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use courseware_auth::{Capability, Role, User};
use courseware_core::{CourseId, EnrollmentId, LessonId, LessonProgressId, UserId};
use courseware_courses::{Course, Enrollment, Lesson, LessonActivation, LessonProgress};

use super::{CourseStore, StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(150) NOT NULL UNIQUE,
        email TEXT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('student', 'instructor', 'admin')),
        capabilities TEXT[] NOT NULL DEFAULT '{}',
        is_staff BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS courses (
        id UUID PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT NOT NULL,
        instructor_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        is_published BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lessons (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
        title VARCHAR(255) NOT NULL,
        description TEXT NOT NULL,
        video_url TEXT NULL,
        content TEXT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS enrollments (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        course_id UUID NOT NULL REFERENCES courses (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (user_id, course_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lesson_progress (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        lesson_id UUID NOT NULL REFERENCES lessons (id) ON DELETE CASCADE,
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE (user_id, lesson_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS lessons_course_id_idx ON lessons (course_id)",
];

const COURSE_COLUMNS: &str =
    "id, title, description, instructor_id, is_published, created_at, updated_at";
const LESSON_COLUMNS: &str =
    "id, course_id, title, description, video_url, content, is_active, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, capabilities, is_staff, created_at";

/// Course store on a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresCourseStore {
    pool: Arc<PgPool>,
}

impl PostgresCourseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url`.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn bootstrap(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("bootstrap", e))?;
        }
        tracing::info!(tables = 5, "schema ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl CourseStore for PostgresCourseStore {
    #[instrument(skip(self, user), fields(user_id = %user.id, username = %user.username), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let capabilities: Vec<String> = user
            .capabilities
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, capabilities, is_staff, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(capabilities)
        .bind(user.is_staff)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_user", e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict("A user with that username already exists.".to_string())
            }
            other => other,
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_username", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, course), fields(course_id = %course.id), err)]
    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, description, instructor_id, is_published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*course.id.as_uuid())
        .bind(&course.title)
        .bind(&course.description)
        .bind(*course.instructor_id.as_uuid())
        .bind(course.is_published)
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_course", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(course_id = %id), err)]
    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_course", e))?;
        row.as_ref().map(course_from_row).transpose()
    }

    #[instrument(skip(self), fields(course_count = tracing::field::Empty), err)]
    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_courses", e))?;

        Span::current().record("course_count", rows.len());
        rows.iter().map(course_from_row).collect()
    }

    #[instrument(skip(self, updated_at), fields(course_id = %id), err)]
    async fn set_published(
        &self,
        id: CourseId,
        is_published: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE courses
            SET is_published = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .bind(is_published)
        .bind(updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_published", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Storage(format!("course {id} does not exist")));
        }
        Ok(())
    }

    #[instrument(
        skip(self, course, activations),
        fields(course_id = %course.id, activation_count = activations.len()),
        err
    )]
    async fn apply_course_update(
        &self,
        course: &Course,
        activations: &[LessonActivation],
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("apply_course_update.begin", e))?;

        let result = sqlx::query(
            r#"
            UPDATE courses
            SET title = $2, description = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(*course.id.as_uuid())
        .bind(&course.title)
        .bind(&course.description)
        .bind(course.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("apply_course_update.course", e))?;

        if result.rows_affected() == 0 {
            // Dropping `tx` rolls back.
            return Err(StoreError::Storage(format!("course {} does not exist", course.id)));
        }

        for activation in activations {
            sqlx::query(
                r#"
                UPDATE lessons
                SET is_active = $3, updated_at = $4
                WHERE id = $1 AND course_id = $2
                "#,
            )
            .bind(*activation.id.as_uuid())
            .bind(*course.id.as_uuid())
            .bind(activation.is_active)
            .bind(course.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("apply_course_update.lesson", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("apply_course_update.commit", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(course_id = %id), err)]
    async fn delete_course(&self, id: CourseId) -> StoreResult<bool> {
        // Lessons, enrollments and progress go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_course", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, lesson), fields(lesson_id = %lesson.id, course_id = %lesson.course_id), err)]
    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO lessons (id, course_id, title, description, video_url, content, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*lesson.id.as_uuid())
        .bind(*lesson.course_id.as_uuid())
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.video_url)
        .bind(&lesson.content)
        .bind(lesson.is_active)
        .bind(lesson.created_at)
        .bind(lesson.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_lesson", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(lesson_id = %id), err)]
    async fn get_lesson(&self, id: LessonId) -> StoreResult<Option<Lesson>> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_lesson", e))?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    #[instrument(skip(self), fields(course_id = %course_id), err)]
    async fn list_lessons(&self, course_id: CourseId) -> StoreResult<Vec<Lesson>> {
        let rows = sqlx::query(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(*course_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_lessons", e))?;
        rows.iter().map(lesson_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_all_lessons(&self) -> StoreResult<Vec<Lesson>> {
        let rows = sqlx::query(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_all_lessons", e))?;
        rows.iter().map(lesson_from_row).collect()
    }

    #[instrument(skip(self, lesson), fields(lesson_id = %lesson.id), err)]
    async fn update_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE lessons
            SET course_id = $2, title = $3, description = $4, video_url = $5,
                content = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(*lesson.id.as_uuid())
        .bind(*lesson.course_id.as_uuid())
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.video_url)
        .bind(&lesson.content)
        .bind(lesson.is_active)
        .bind(lesson.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_lesson", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Storage(format!("lesson {} does not exist", lesson.id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(lesson_id = %id), err)]
    async fn delete_lesson(&self, id: LessonId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_lesson", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(course_id = %course_id), err)]
    async fn count_lessons(&self, course_id: CourseId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
            .bind(*course_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_lessons", e))?;
        Ok(count.max(0) as u64)
    }

    #[instrument(
        skip(self, enrollment),
        fields(user_id = %enrollment.user_id, course_id = %enrollment.course_id),
        err
    )]
    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<(Enrollment, bool)> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (id, user_id, course_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(*enrollment.id.as_uuid())
        .bind(*enrollment.user_id.as_uuid())
        .bind(*enrollment.course_id.as_uuid())
        .bind(enrollment.created_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enroll", e))?;

        if inserted.is_some() {
            return Ok((enrollment, true));
        }

        let row = sqlx::query(
            "SELECT id, user_id, course_id, created_at FROM enrollments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(*enrollment.user_id.as_uuid())
        .bind(*enrollment.course_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enroll.existing", e))?;

        Ok((enrollment_from_row(&row)?, false))
    }

    #[instrument(skip(self), fields(user_id = %user_id, course_id = %course_id), err)]
    async fn is_enrolled(&self, user_id: UserId, course_id: CourseId) -> StoreResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(*user_id.as_uuid())
        .bind(*course_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_enrolled", e))
    }

    #[instrument(skip(self), fields(course_id = %course_id), err)]
    async fn has_enrollments(&self, course_id: CourseId) -> StoreResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM enrollments WHERE course_id = $1)")
            .bind(*course_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("has_enrollments", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn enrolled_course_ids(&self, user_id: UserId) -> StoreResult<HashSet<CourseId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT course_id FROM enrollments WHERE user_id = $1")
            .bind(*user_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("enrolled_course_ids", e))?;
        Ok(ids.into_iter().map(CourseId::from_uuid).collect())
    }

    #[instrument(skip(self, now), fields(user_id = %user_id, lesson_id = %lesson_id), err)]
    async fn mark_lesson_complete(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress> {
        let row = sqlx::query(
            r#"
            INSERT INTO lesson_progress (id, user_id, lesson_id, completed, created_at, updated_at)
            VALUES ($1, $2, $3, TRUE, $4, $4)
            ON CONFLICT (user_id, lesson_id)
            DO UPDATE SET completed = TRUE, updated_at = EXCLUDED.updated_at
            RETURNING id, user_id, lesson_id, completed, created_at, updated_at
            "#,
        )
        .bind(*LessonProgressId::new().as_uuid())
        .bind(*user_id.as_uuid())
        .bind(*lesson_id.as_uuid())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_lesson_complete", e))?;

        progress_from_row(&row)
    }

    #[instrument(skip(self), fields(user_id = %user_id, course_id = %course_id), err)]
    async fn count_completed(&self, user_id: UserId, course_id: CourseId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM lesson_progress p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.user_id = $1 AND l.course_id = $2 AND p.completed
            "#,
        )
        .bind(*user_id.as_uuid())
        .bind(*course_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_completed", e))?;
        Ok(count.max(0) as u64)
    }
}

fn decode<T>(operation: &str, result: Result<T, sqlx::Error>) -> StoreResult<T> {
    result.map_err(|e| StoreError::Storage(format!("failed to decode {operation} row: {e}")))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = decode("user", row.try_get("role"))?;
    let role: Role = role
        .parse()
        .map_err(|e| StoreError::Storage(format!("failed to decode user row: {e}")))?;
    let capabilities: Vec<String> = decode("user", row.try_get("capabilities"))?;

    Ok(User {
        id: UserId::from_uuid(decode("user", row.try_get("id"))?),
        username: decode("user", row.try_get("username"))?,
        email: decode("user", row.try_get("email"))?,
        password_hash: decode("user", row.try_get("password_hash"))?,
        role,
        capabilities: capabilities
            .iter()
            .filter_map(|c| Capability::parse(c))
            .collect(),
        is_staff: decode("user", row.try_get("is_staff"))?,
        created_at: decode("user", row.try_get("created_at"))?,
    })
}

fn course_from_row(row: &PgRow) -> StoreResult<Course> {
    Ok(Course {
        id: CourseId::from_uuid(decode("course", row.try_get("id"))?),
        title: decode("course", row.try_get("title"))?,
        description: decode("course", row.try_get("description"))?,
        instructor_id: UserId::from_uuid(decode("course", row.try_get("instructor_id"))?),
        is_published: decode("course", row.try_get("is_published"))?,
        created_at: decode("course", row.try_get("created_at"))?,
        updated_at: decode("course", row.try_get("updated_at"))?,
    })
}

fn lesson_from_row(row: &PgRow) -> StoreResult<Lesson> {
    Ok(Lesson {
        id: LessonId::from_uuid(decode("lesson", row.try_get("id"))?),
        course_id: CourseId::from_uuid(decode("lesson", row.try_get("course_id"))?),
        title: decode("lesson", row.try_get("title"))?,
        description: decode("lesson", row.try_get("description"))?,
        video_url: decode("lesson", row.try_get("video_url"))?,
        content: decode("lesson", row.try_get("content"))?,
        is_active: decode("lesson", row.try_get("is_active"))?,
        created_at: decode("lesson", row.try_get("created_at"))?,
        updated_at: decode("lesson", row.try_get("updated_at"))?,
    })
}

fn enrollment_from_row(row: &PgRow) -> StoreResult<Enrollment> {
    Ok(Enrollment {
        id: EnrollmentId::from_uuid(decode("enrollment", row.try_get("id"))?),
        user_id: UserId::from_uuid(decode("enrollment", row.try_get("user_id"))?),
        course_id: CourseId::from_uuid(decode("enrollment", row.try_get("course_id"))?),
        created_at: decode("enrollment", row.try_get("created_at"))?,
    })
}

fn progress_from_row(row: &PgRow) -> StoreResult<LessonProgress> {
    Ok(LessonProgress {
        id: LessonProgressId::from_uuid(decode("lesson_progress", row.try_get("id"))?),
        user_id: UserId::from_uuid(decode("lesson_progress", row.try_get("user_id"))?),
        lesson_id: LessonId::from_uuid(decode("lesson_progress", row.try_get("lesson_id"))?),
        completed: decode("lesson_progress", row.try_get("completed"))?,
        created_at: decode("lesson_progress", row.try_get("created_at"))?,
        updated_at: decode("lesson_progress", row.try_get("updated_at"))?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}
