//! Persistence gateway for students, courses and enrollments.
//!
//! Reads go straight to the database. Writes are staged on a [`UnitOfWork`]
//! and applied by [`SchoolStore::commit`] inside a single transaction.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};

use crate::error::PersistenceError;
use crate::models::{
    Course, CourseId, Enrollment, EnrollmentId, NewEnrollment, Student, StudentFields, StudentId,
};
use crate::orm::Db;

/// One staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    InsertStudent {
        fields: StudentFields,
        course_ids: Vec<CourseId>,
    },
    UpdateStudent {
        id: StudentId,
        fields: StudentFields,
    },
    InsertEnrollment(NewEnrollment),
    RemoveEnrollment {
        id: EnrollmentId,
        student_id: StudentId,
    },
}

/// Ordered list of writes to commit together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    changes: Vec<Change>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a new student together with enrollments in `course_ids`.
    /// The enrollments receive the generated student id at commit time.
    pub fn insert_student(&mut self, fields: StudentFields, course_ids: Vec<CourseId>) {
        self.changes.push(Change::InsertStudent { fields, course_ids });
    }

    pub fn update_student(&mut self, id: StudentId, fields: StudentFields) {
        self.changes.push(Change::UpdateStudent { id, fields });
    }

    pub fn insert_enrollment(&mut self, enrollment: NewEnrollment) {
        self.changes.push(Change::InsertEnrollment(enrollment));
    }

    pub fn remove_enrollment(&mut self, enrollment: &Enrollment) {
        self.changes.push(Change::RemoveEnrollment {
            id: enrollment.id,
            student_id: enrollment.student_id,
        });
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted_students: Vec<StudentId>,
    pub updated_students: usize,
    pub added_enrollments: usize,
    pub removed_enrollments: usize,
}

#[async_trait]
pub trait SchoolStore: Send + Sync {
    /// All students, each with enrollments and their course loaded.
    async fn list_students(&self) -> Result<Vec<Student>, PersistenceError>;

    /// All courses ordered by title.
    async fn list_courses(&self) -> Result<Vec<Course>, PersistenceError>;

    /// One student with enrollments and their course loaded.
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, PersistenceError>;

    /// Apply every staged change atomically.
    async fn commit(&self, work: UnitOfWork) -> Result<CommitSummary, PersistenceError>;
}

const ENROLLMENT_SELECT: &str = "SELECT e.id, e.student_id, e.course_id, e.grade, \
     c.title AS course_title, c.credits AS course_credits \
     FROM enrollment e LEFT JOIN course c ON c.id = e.course_id";

const STUDENT_SELECT: &str =
    "SELECT id, last_name, first_mid_name, enrollment_date FROM student";

/// [`SchoolStore`] backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Db>,
}

impl SqliteStore {
    pub fn new(db: Arc<Db>) -> Self {
        SqliteStore { db }
    }
}

#[async_trait]
impl SchoolStore for SqliteStore {
    async fn list_students(&self) -> Result<Vec<Student>, PersistenceError> {
        let mut students: Vec<Student> = self
            .db
            .fetch_all(&format!("{STUDENT_SELECT} ORDER BY last_name, first_mid_name, id"))
            .await?;
        let enrollments: Vec<Enrollment> = self
            .db
            .fetch_all(&format!("{ENROLLMENT_SELECT} ORDER BY c.title, e.id"))
            .await?;

        let mut by_student: HashMap<StudentId, Vec<Enrollment>> = HashMap::new();
        for enrollment in enrollments {
            by_student
                .entry(enrollment.student_id)
                .or_default()
                .push(enrollment);
        }
        for student in &mut students {
            student.enrollments = by_student.remove(&student.id).unwrap_or_default();
        }
        Ok(students)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, PersistenceError> {
        Ok(self
            .db
            .fetch_all("SELECT id, title, credits FROM course ORDER BY title, id")
            .await?)
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, PersistenceError> {
        let student: Option<Student> = sqlx::query_as(&format!("{STUDENT_SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        let Some(mut student) = student else {
            debug!("Student {} not found", id);
            return Ok(None);
        };
        student.enrollments =
            sqlx::query_as(&format!("{ENROLLMENT_SELECT} WHERE e.student_id = ? ORDER BY c.title, e.id"))
                .bind(id)
                .fetch_all(self.db.pool())
                .await?;
        Ok(Some(student))
    }

    async fn commit(&self, work: UnitOfWork) -> Result<CommitSummary, PersistenceError> {
        let mut summary = CommitSummary::default();
        if work.is_empty() {
            return Ok(summary);
        }

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.db.pool().begin().await?;
        for change in work.changes {
            debug!("Applying {:?}", change);
            match change {
                Change::InsertStudent { fields, course_ids } => {
                    let result = sqlx::query(
                        "INSERT INTO student (last_name, first_mid_name, enrollment_date) VALUES (?, ?, ?)",
                    )
                    .bind(&fields.last_name)
                    .bind(&fields.first_mid_name)
                    .bind(fields.enrollment_date)
                    .execute(&mut *tx)
                    .await?;
                    let student_id = result.last_insert_rowid();
                    for course_id in course_ids {
                        sqlx::query("INSERT INTO enrollment (student_id, course_id) VALUES (?, ?)")
                            .bind(student_id)
                            .bind(course_id)
                            .execute(&mut *tx)
                            .await?;
                        summary.added_enrollments += 1;
                    }
                    summary.inserted_students.push(student_id);
                }
                Change::UpdateStudent { id, fields } => {
                    let result = sqlx::query(
                        "UPDATE student SET last_name = ?, first_mid_name = ?, enrollment_date = ? WHERE id = ?",
                    )
                    .bind(&fields.last_name)
                    .bind(&fields.first_mid_name)
                    .bind(fields.enrollment_date)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 0 {
                        error!("Commit aborted: student {} vanished", id);
                        return Err(PersistenceError::MissingStudent(id));
                    }
                    summary.updated_students += 1;
                }
                Change::InsertEnrollment(new) => {
                    // A concurrent edit may already have added the pair.
                    let result = sqlx::query(
                        "INSERT OR IGNORE INTO enrollment (student_id, course_id) VALUES (?, ?)",
                    )
                    .bind(new.student_id)
                    .bind(new.course_id)
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 1 {
                        summary.added_enrollments += 1;
                    } else {
                        debug!(
                            "Student {} already enrolled in course {}",
                            new.student_id, new.course_id
                        );
                    }
                }
                Change::RemoveEnrollment { id, student_id } => {
                    let result =
                        sqlx::query("DELETE FROM enrollment WHERE id = ? AND student_id = ?")
                            .bind(id)
                            .bind(student_id)
                            .execute(&mut *tx)
                            .await?;
                    if result.rows_affected() == 1 {
                        summary.removed_enrollments += 1;
                    } else {
                        debug!("Enrollment {} of student {} already gone", id, student_id);
                    }
                }
            }
        }
        tx.commit().await?;
        info!(
            "Committed: {} students inserted, {} updated, {} enrollments added, {} removed",
            summary.inserted_students.len(),
            summary.updated_students,
            summary.added_enrollments,
            summary.removed_enrollments
        );
        Ok(summary)
    }
}
