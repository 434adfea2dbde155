#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use registrar::error::PersistenceError;
use registrar::models::{Course, Enrollment, Student, StudentId};
use registrar::orm::{Db, Model};
use registrar::store::{CommitSummary, SchoolStore, SqliteStore, UnitOfWork};

/// Fresh in-memory database with the school schema and courses 101..=105.
pub async fn setup_db() -> Arc<Db> {
    let db = Arc::new(Db::connect_with("sqlite::memory:", 1).await.unwrap());
    Student::migrate(db.clone()).await.unwrap();
    Course::migrate(db.clone()).await.unwrap();
    Enrollment::migrate(db.clone()).await.unwrap();
    db.execute(
        "INSERT INTO course (id, title, credits) VALUES
            (101, 'Calculus', 4),
            (102, 'Chemistry', 3),
            (103, 'Literature', 4),
            (104, 'Microeconomics', 3),
            (105, 'Trigonometry', 4)",
    )
    .await
    .unwrap();
    db
}

pub async fn setup_store() -> SqliteStore {
    SqliteStore::new(setup_db().await)
}

/// Insert a student with a fixed id and enrollments in `course_ids`.
pub async fn seed_student(db: &Db, id: StudentId, last_name: &str, course_ids: &[i64]) {
    db.execute(&format!(
        "INSERT INTO student (id, last_name, first_mid_name, enrollment_date) \
         VALUES ({id}, '{last_name}', 'Test', '2023-09-01')"
    ))
    .await
    .unwrap();
    for course_id in course_ids {
        db.execute(&format!(
            "INSERT INTO enrollment (student_id, course_id) VALUES ({id}, {course_id})"
        ))
        .await
        .unwrap();
    }
}

pub fn enrollment(id: i64, student_id: StudentId, course_id: i64) -> Enrollment {
    Enrollment {
        id,
        student_id,
        course_id,
        grade: None,
        course: None,
    }
}

/// Reads from the wrapped store; every commit fails.
pub struct FailingCommitStore {
    pub inner: SqliteStore,
}

#[async_trait]
impl SchoolStore for FailingCommitStore {
    async fn list_students(&self) -> Result<Vec<Student>, PersistenceError> {
        self.inner.list_students().await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, PersistenceError> {
        self.inner.list_courses().await
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, PersistenceError> {
        self.inner.get_student(id).await
    }

    async fn commit(&self, _work: UnitOfWork) -> Result<CommitSummary, PersistenceError> {
        Err(PersistenceError::Database(sqlx::Error::PoolClosed))
    }
}
