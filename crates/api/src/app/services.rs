//! Application services: load state from the store, ask the access policy,
//! then mutate or compute.
//!
//! Handlers never touch the store directly; every operation here takes the
//! acting [`Actor`] explicitly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use courseware_auth::{
    Actor, Hs256Jwt, PasswordError, RegisterUser, RegistrationError, Role, TokenError, TokenPair,
    User, register,
};
use courseware_core::{CourseId, DomainError, LessonId, UserId};
use courseware_courses::{
    Action, Course, CourseProgress, CourseUpdate, Enrollment, Lesson, LessonProgress,
    LessonUpdate, NewCourse, NewLesson, Target, UpdateMode, authorize, compute_progress,
    course_listed, lesson_visible, plan_activation,
};
use courseware_infra::{CourseStore, InMemoryCourseStore, PostgresCourseStore, StoreError};

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("No active account found with the given credentials")]
    InvalidCredentials,
}

impl From<RegistrationError> for ServiceError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Domain(e) => ServiceError::Domain(e),
            RegistrationError::Password(e) => ServiceError::Password(e),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

const DUPLICATE_USERNAME: &str = "username: A user with that username already exists.";

/// Listing filters of `GET /courses/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseFilter {
    pub is_published: Option<bool>,
    /// Only honoured for students; `false` is a no-op.
    pub enrolled: Option<bool>,
}

/// A course as shown in listings.
#[derive(Debug, Clone)]
pub struct CourseListing {
    pub course: Course,
    pub instructor: User,
    pub lessons_count: u64,
    pub is_enrolled: bool,
}

/// A course with its active lessons.
#[derive(Debug, Clone)]
pub struct CourseDetail {
    pub course: Course,
    pub instructor: User,
    pub lessons: Vec<Lesson>,
}

#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn CourseStore>,
    jwt: Arc<Hs256Jwt>,
}

/// Pick the store from configuration: Postgres when `DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store: Arc<dyn CourseStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresCourseStore::connect(url).await?;
            store.bootstrap().await?;
            tracing::info!("using postgres course store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory course store");
            Arc::new(InMemoryCourseStore::new())
        }
    };

    let jwt = Hs256Jwt::new(
        config.jwt_secret.as_bytes(),
        config.access_token_ttl,
        config.refresh_token_ttl,
    );
    Ok(AppServices::new(store, Arc::new(jwt)))
}

impl AppServices {
    pub fn new(store: Arc<dyn CourseStore>, jwt: Arc<Hs256Jwt>) -> Self {
        Self { store, jwt }
    }

    pub fn jwt(&self) -> Arc<Hs256Jwt> {
        self.jwt.clone()
    }

    // -------------------------
    // Identity
    // -------------------------

    pub async fn register(&self, actor: &Actor, cmd: RegisterUser) -> ServiceResult<User> {
        authorize(actor, Action::Register, &Target::None)?;
        cmd.validate()?;

        if self
            .store
            .find_user_by_username(cmd.username.trim())
            .await?
            .is_some()
        {
            return Err(DomainError::validation(DUPLICATE_USERNAME).into());
        }

        let user = register(&cmd, Utc::now())?;
        match self.store.insert_user(&user).await {
            Ok(()) => Ok(user),
            Err(StoreError::Conflict(_)) => Err(DomainError::validation(DUPLICATE_USERNAME).into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn obtain_token(&self, username: &str, password: &str) -> ServiceResult<TokenPair> {
        let Some(user) = self.store.find_user_by_username(username.trim()).await? else {
            return Err(ServiceError::InvalidCredentials);
        };
        if !user.check_password(password)? {
            tracing::info!(user_id = %user.id, "login rejected");
            return Err(ServiceError::InvalidCredentials);
        }
        Ok(self.jwt.issue_pair(user.id, user.role, Utc::now())?)
    }

    pub fn refresh_token(&self, refresh: &str) -> ServiceResult<String> {
        Ok(self.jwt.refresh(refresh, Utc::now())?)
    }

    // -------------------------
    // Courses
    // -------------------------

    pub async fn list_courses(&self, actor: &Actor, filter: CourseFilter) -> ServiceResult<Vec<CourseListing>> {
        authorize(actor, Action::ListCourses, &Target::None)?;

        let enrolled_ids = self.enrolled_ids(actor).await?;
        let only_enrolled = filter.enrolled == Some(true) && actor.role() == Some(Role::Student);

        let mut instructors: HashMap<UserId, User> = HashMap::new();
        let mut listings = Vec::new();
        for course in self.store.list_courses().await? {
            if !course_listed(actor, &course) {
                continue;
            }
            if filter.is_published.is_some_and(|p| p != course.is_published) {
                continue;
            }
            let is_enrolled = enrolled_ids.contains(&course.id);
            if only_enrolled && !is_enrolled {
                continue;
            }

            let instructor = match instructors.get(&course.instructor_id) {
                Some(user) => user.clone(),
                None => {
                    let user = self.load_instructor(&course).await?;
                    instructors.insert(user.id, user.clone());
                    user
                }
            };
            let lessons_count = self.store.count_lessons(course.id).await?;
            listings.push(CourseListing {
                course,
                instructor,
                lessons_count,
                is_enrolled,
            });
        }
        Ok(listings)
    }

    pub async fn get_course(&self, actor: &Actor, id: CourseId) -> ServiceResult<CourseDetail> {
        let course = self.load_course(id).await?;
        let enrolled = self.is_enrolled(actor, id).await?;
        authorize(actor, Action::ViewCourse, &Target::Course { course: &course, enrolled })?;
        self.detail(course).await
    }

    pub async fn create_course(&self, actor: &Actor, input: NewCourse) -> ServiceResult<CourseListing> {
        authorize(actor, Action::CreateCourse, &Target::None)?;
        let (user_id, _) = actor.require_user()?;

        let course = Course::create(input, user_id, Utc::now())?;
        self.store.insert_course(&course).await?;
        tracing::info!(course_id = %course.id, instructor_id = %user_id, "course created");

        let instructor = self.load_instructor(&course).await?;
        Ok(CourseListing {
            course,
            instructor,
            lessons_count: 0,
            is_enrolled: false,
        })
    }

    /// Scalar update plus batch lesson activation, written atomically.
    pub async fn update_course(
        &self,
        actor: &Actor,
        id: CourseId,
        update: CourseUpdate,
        mode: UpdateMode,
    ) -> ServiceResult<CourseDetail> {
        actor.require_user()?;
        let mut course = self.load_course(id).await?;
        let enrolled = self.is_enrolled(actor, id).await?;
        authorize(actor, Action::UpdateCourse, &Target::Course { course: &course, enrolled })?;

        course.apply_update(&update, mode, Utc::now())?;
        let lessons = self.store.list_lessons(id).await?;
        let activations = plan_activation(&lessons, &update.lessons);
        self.store.apply_course_update(&course, &activations).await?;
        tracing::info!(course_id = %id, activations = activations.len(), "course updated");

        // Re-read so the publication flag reflects the stored row.
        let course = self.load_course(id).await?;
        self.detail(course).await
    }

    pub async fn delete_course(&self, actor: &Actor, id: CourseId) -> ServiceResult<()> {
        actor.require_user()?;
        let course = self.load_course(id).await?;
        let enrolled = self.is_enrolled(actor, id).await?;
        authorize(actor, Action::DeleteCourse, &Target::Course { course: &course, enrolled })?;

        if !self.store.delete_course(id).await? {
            return Err(DomainError::not_found().into());
        }
        tracing::info!(course_id = %id, "course deleted");
        Ok(())
    }

    pub async fn publish_course(&self, actor: &Actor, id: CourseId) -> ServiceResult<Course> {
        self.transition(actor, id, Action::PublishCourse).await
    }

    pub async fn unpublish_course(&self, actor: &Actor, id: CourseId) -> ServiceResult<Course> {
        self.transition(actor, id, Action::UnpublishCourse).await
    }

    async fn transition(&self, actor: &Actor, id: CourseId, action: Action) -> ServiceResult<Course> {
        actor.require_user()?;
        let mut course = self.load_course(id).await?;
        let enrolled = self.is_enrolled(actor, id).await?;
        authorize(actor, action, &Target::Course { course: &course, enrolled })?;

        let lessons_count = self.store.count_lessons(id).await? as usize;
        let now = Utc::now();
        match action {
            Action::PublishCourse => course.publish(lessons_count, now)?,
            _ => course.unpublish(lessons_count, now)?,
        }
        self.store
            .set_published(id, course.is_published, course.updated_at)
            .await?;
        tracing::info!(course_id = %id, status = ?course.status(), "course status changed");
        Ok(course)
    }

    /// Returns the enrollment and whether this call created it.
    pub async fn enroll(&self, actor: &Actor, id: CourseId) -> ServiceResult<(Enrollment, bool)> {
        let (user_id, _) = actor.require_user()?;
        let course = self.load_course(id).await?;
        let enrolled = self.is_enrolled(actor, id).await?;
        authorize(actor, Action::Enroll, &Target::Course { course: &course, enrolled })?;

        let (enrollment, created) = self
            .store
            .enroll(Enrollment::new(user_id, id, Utc::now()))
            .await?;
        if created {
            tracing::info!(course_id = %id, user_id = %user_id, "student enrolled");
        }
        Ok((enrollment, created))
    }

    /// Progress of `subject` (raw `user_id` query value) in a course.
    pub async fn get_progress(
        &self,
        actor: &Actor,
        id: CourseId,
        subject: Option<&str>,
    ) -> ServiceResult<CourseProgress> {
        actor.require_user()?;
        let Some(raw) = subject.filter(|s| !s.trim().is_empty()) else {
            return Err(DomainError::validation("user_id parameter is required.").into());
        };
        let subject_id: UserId = raw.trim().parse()?;
        let Some(subject) = self.store.get_user(subject_id).await? else {
            return Err(DomainError::not_found().into());
        };

        let course = self.load_course(id).await?;
        authorize(
            actor,
            Action::ViewProgress,
            &Target::Progress { course: &course, subject: subject.id },
        )?;

        if !subject.role.is_student() {
            return Err(DomainError::validation("Progress is only tracked for students.").into());
        }
        if !self.store.is_enrolled(subject.id, id).await? {
            return Err(DomainError::validation("The user is not enrolled in this course.").into());
        }

        let lessons_count = self.store.count_lessons(id).await?;
        let completed = self.store.count_completed(subject.id, id).await?;
        Ok(compute_progress(lessons_count, completed))
    }

    // -------------------------
    // Lessons
    // -------------------------

    pub async fn list_lessons(&self, actor: &Actor) -> ServiceResult<Vec<Lesson>> {
        authorize(actor, Action::ListLessons, &Target::None)?;

        let enrolled_ids = self.enrolled_ids(actor).await?;
        let courses: HashMap<CourseId, Course> = self
            .store
            .list_courses()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(self
            .store
            .list_all_lessons()
            .await?
            .into_iter()
            .filter(|lesson| {
                courses.get(&lesson.course_id).is_some_and(|course| {
                    lesson_visible(actor, lesson, course, enrolled_ids.contains(&course.id))
                })
            })
            .collect())
    }

    pub async fn get_lesson(&self, actor: &Actor, id: LessonId) -> ServiceResult<Lesson> {
        actor.require_user()?;
        let (lesson, course) = self.load_lesson(id).await?;
        let enrolled = self.is_enrolled(actor, course.id).await?;
        authorize(
            actor,
            Action::ViewLesson,
            &Target::Lesson { lesson: &lesson, course: &course, enrolled },
        )?;
        Ok(lesson)
    }

    pub async fn create_lesson(&self, actor: &Actor, input: NewLesson) -> ServiceResult<Lesson> {
        actor.require_user()?;
        let course = self.load_target_course(input.course).await?;
        let enrolled = self.is_enrolled(actor, course.id).await?;
        authorize(actor, Action::CreateLesson, &Target::Course { course: &course, enrolled })?;

        let lesson = Lesson::create(input, Utc::now())?;
        self.store.insert_lesson(&lesson).await?;
        tracing::info!(lesson_id = %lesson.id, course_id = %course.id, "lesson created");
        Ok(lesson)
    }

    pub async fn update_lesson(
        &self,
        actor: &Actor,
        id: LessonId,
        update: LessonUpdate,
        mode: UpdateMode,
    ) -> ServiceResult<Lesson> {
        actor.require_user()?;
        let (mut lesson, course) = self.load_lesson(id).await?;
        let enrolled = self.is_enrolled(actor, course.id).await?;
        authorize(
            actor,
            Action::UpdateLesson,
            &Target::Lesson { lesson: &lesson, course: &course, enrolled },
        )?;

        if let Some(new_course) = update.course.filter(|c| *c != lesson.course_id) {
            let target = self.load_target_course(new_course).await?;
            let target_enrolled = self.is_enrolled(actor, target.id).await?;
            authorize(
                actor,
                Action::CreateLesson,
                &Target::Course { course: &target, enrolled: target_enrolled },
            )?;
        }

        let has_enrollments = self.store.has_enrollments(lesson.course_id).await?;
        lesson.apply_update(&update, mode, has_enrollments, Utc::now())?;
        self.store.update_lesson(&lesson).await?;
        tracing::info!(lesson_id = %id, "lesson updated");
        Ok(lesson)
    }

    pub async fn delete_lesson(&self, actor: &Actor, id: LessonId) -> ServiceResult<()> {
        actor.require_user()?;
        let (lesson, course) = self.load_lesson(id).await?;
        let enrolled = self.is_enrolled(actor, course.id).await?;
        authorize(
            actor,
            Action::DeleteLesson,
            &Target::Lesson { lesson: &lesson, course: &course, enrolled },
        )?;

        if !self.store.delete_lesson(id).await? {
            return Err(DomainError::not_found().into());
        }
        tracing::info!(lesson_id = %id, "lesson deleted");
        Ok(())
    }

    pub async fn mark_lesson_complete(&self, actor: &Actor, id: LessonId) -> ServiceResult<LessonProgress> {
        let (user_id, _) = actor.require_user()?;
        let (lesson, course) = self.load_lesson(id).await?;
        let enrolled = self.is_enrolled(actor, course.id).await?;
        authorize(
            actor,
            Action::MarkLessonComplete,
            &Target::Lesson { lesson: &lesson, course: &course, enrolled },
        )?;

        let progress = self
            .store
            .mark_lesson_complete(user_id, id, Utc::now())
            .await?;
        tracing::info!(lesson_id = %id, user_id = %user_id, "lesson completed");
        Ok(progress)
    }

    // -------------------------
    // Loading helpers
    // -------------------------

    async fn load_course(&self, id: CourseId) -> ServiceResult<Course> {
        self.store
            .get_course(id)
            .await?
            .ok_or_else(|| DomainError::not_found().into())
    }

    /// Course referenced from a request body: a dangling id is bad input.
    async fn load_target_course(&self, id: CourseId) -> ServiceResult<Course> {
        self.store.get_course(id).await?.ok_or_else(|| {
            DomainError::validation(format!(
                "course: Invalid pk \"{id}\" - object does not exist."
            ))
            .into()
        })
    }

    async fn load_lesson(&self, id: LessonId) -> ServiceResult<(Lesson, Course)> {
        let Some(lesson) = self.store.get_lesson(id).await? else {
            return Err(DomainError::not_found().into());
        };
        let course = self.load_course(lesson.course_id).await?;
        Ok((lesson, course))
    }

    async fn load_instructor(&self, course: &Course) -> ServiceResult<User> {
        self.store
            .get_user(course.instructor_id)
            .await?
            .ok_or_else(|| {
                StoreError::Storage(format!(
                    "instructor {} of course {} is missing",
                    course.instructor_id, course.id
                ))
                .into()
            })
    }

    async fn detail(&self, course: Course) -> ServiceResult<CourseDetail> {
        let instructor = self.load_instructor(&course).await?;
        let lessons = self
            .store
            .list_lessons(course.id)
            .await?
            .into_iter()
            .filter(|l| l.is_active)
            .collect();
        Ok(CourseDetail {
            course,
            instructor,
            lessons,
        })
    }

    async fn is_enrolled(&self, actor: &Actor, course_id: CourseId) -> ServiceResult<bool> {
        match actor.user_id() {
            Some(user_id) => Ok(self.store.is_enrolled(user_id, course_id).await?),
            None => Ok(false),
        }
    }

    async fn enrolled_ids(&self, actor: &Actor) -> ServiceResult<HashSet<CourseId>> {
        match actor.user_id() {
            Some(user_id) => Ok(self.store.enrolled_course_ids(user_id).await?),
            None => Ok(HashSet::new()),
        }
    }
}
