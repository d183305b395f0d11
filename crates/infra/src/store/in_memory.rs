use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use courseware_auth::User;
use courseware_core::entity::sort_by_creation;
use courseware_core::{CourseId, LessonId, UserId};
use courseware_courses::{Course, Enrollment, Lesson, LessonActivation, LessonProgress};

use super::{CourseStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<LessonId, Lesson>,
    enrollments: HashMap<(UserId, CourseId), Enrollment>,
    progress: HashMap<(UserId, LessonId), LessonProgress>,
}

/// In-memory store for tests/dev.
///
/// One lock guards every table, so multi-row writes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryCourseStore {
    tables: RwLock<Tables>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(
                "A user with that username already exists.".to_string(),
            ));
        }
        if t.users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.courses.contains_key(&course.id) {
            return Err(StoreError::Conflict(format!("course {} already exists", course.id)));
        }
        t.courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> StoreResult<Option<Course>> {
        Ok(self.read()?.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let mut courses: Vec<Course> = self.read()?.courses.values().cloned().collect();
        sort_by_creation(&mut courses);
        Ok(courses)
    }

    async fn set_published(
        &self,
        id: CourseId,
        is_published: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        match t.courses.get_mut(&id) {
            Some(stored) => {
                stored.is_published = is_published;
                stored.updated_at = updated_at;
                Ok(())
            }
            None => Err(StoreError::Storage(format!("course {id} does not exist"))),
        }
    }

    async fn apply_course_update(
        &self,
        course: &Course,
        activations: &[LessonActivation],
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        let Some(stored) = t.courses.get_mut(&course.id) else {
            return Err(StoreError::Storage(format!("course {} does not exist", course.id)));
        };

        stored.title = course.title.clone();
        stored.description = course.description.clone();
        stored.updated_at = course.updated_at;
        for activation in activations {
            if let Some(lesson) = t.lessons.get_mut(&activation.id) {
                if lesson.course_id == course.id {
                    lesson.is_active = activation.is_active;
                    lesson.updated_at = course.updated_at;
                }
            }
        }
        Ok(())
    }

    async fn delete_course(&self, id: CourseId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.courses.remove(&id).is_none() {
            return Ok(false);
        }

        let lesson_ids: HashSet<LessonId> = t
            .lessons
            .values()
            .filter(|l| l.course_id == id)
            .map(|l| l.id)
            .collect();
        t.lessons.retain(|lesson_id, _| !lesson_ids.contains(lesson_id));
        t.progress.retain(|(_, lesson_id), _| !lesson_ids.contains(lesson_id));
        t.enrollments.retain(|(_, course_id), _| *course_id != id);
        Ok(true)
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.courses.contains_key(&lesson.course_id) {
            return Err(StoreError::Storage(format!(
                "course {} does not exist",
                lesson.course_id
            )));
        }
        if t.lessons.contains_key(&lesson.id) {
            return Err(StoreError::Conflict(format!("lesson {} already exists", lesson.id)));
        }
        t.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> StoreResult<Option<Lesson>> {
        Ok(self.read()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, course_id: CourseId) -> StoreResult<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self
            .read()?
            .lessons
            .values()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        sort_by_creation(&mut lessons);
        Ok(lessons)
    }

    async fn list_all_lessons(&self) -> StoreResult<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self.read()?.lessons.values().cloned().collect();
        sort_by_creation(&mut lessons);
        Ok(lessons)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.courses.contains_key(&lesson.course_id) {
            return Err(StoreError::Storage(format!(
                "course {} does not exist",
                lesson.course_id
            )));
        }
        match t.lessons.get_mut(&lesson.id) {
            Some(stored) => {
                *stored = lesson.clone();
                Ok(())
            }
            None => Err(StoreError::Storage(format!("lesson {} does not exist", lesson.id))),
        }
    }

    async fn delete_lesson(&self, id: LessonId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if t.lessons.remove(&id).is_none() {
            return Ok(false);
        }
        t.progress.retain(|(_, lesson_id), _| *lesson_id != id);
        Ok(true)
    }

    async fn count_lessons(&self, course_id: CourseId) -> StoreResult<u64> {
        let t = self.read()?;
        Ok(t.lessons.values().filter(|l| l.course_id == course_id).count() as u64)
    }

    async fn enroll(&self, enrollment: Enrollment) -> StoreResult<(Enrollment, bool)> {
        let mut t = self.write()?;
        if !t.courses.contains_key(&enrollment.course_id) {
            return Err(StoreError::Storage(format!(
                "course {} does not exist",
                enrollment.course_id
            )));
        }

        let key = (enrollment.user_id, enrollment.course_id);
        if let Some(existing) = t.enrollments.get(&key) {
            return Ok((existing.clone(), false));
        }
        t.enrollments.insert(key, enrollment.clone());
        Ok((enrollment, true))
    }

    async fn is_enrolled(&self, user_id: UserId, course_id: CourseId) -> StoreResult<bool> {
        Ok(self.read()?.enrollments.contains_key(&(user_id, course_id)))
    }

    async fn has_enrollments(&self, course_id: CourseId) -> StoreResult<bool> {
        Ok(self
            .read()?
            .enrollments
            .keys()
            .any(|(_, c)| *c == course_id))
    }

    async fn enrolled_course_ids(&self, user_id: UserId) -> StoreResult<HashSet<CourseId>> {
        Ok(self
            .read()?
            .enrollments
            .keys()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, c)| *c)
            .collect())
    }

    async fn mark_lesson_complete(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress> {
        let mut t = self.write()?;
        if !t.lessons.contains_key(&lesson_id) {
            return Err(StoreError::Storage(format!("lesson {lesson_id} does not exist")));
        }

        let key = (user_id, lesson_id);
        let existing = t.progress.remove(&key);
        let progress = LessonProgress::mark_complete(existing, user_id, lesson_id, now);
        t.progress.insert(key, progress.clone());
        Ok(progress)
    }

    async fn count_completed(&self, user_id: UserId, course_id: CourseId) -> StoreResult<u64> {
        let t = self.read()?;
        let count = t
            .progress
            .values()
            .filter(|p| p.user_id == user_id && p.completed)
            .filter(|p| {
                t.lessons
                    .get(&p.lesson_id)
                    .is_some_and(|l| l.course_id == course_id)
            })
            .count();
        Ok(count as u64)
    }
}
