//! School records: students, courses and the enrollments linking them.
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::orm::{BoxFuture, Db, Migration, Model};

pub type StudentId = i64;
pub type CourseId = i64;
pub type EnrollmentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(format!("unknown grade `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub credits: i64,
}

/// Association between one student and one course.
///
/// `id` is a surrogate key; in practice the pair `(student_id, course_id)`
/// identifies the row. `course` is filled in when loaded through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub grade: Option<Grade>,
    pub course: Option<Course>,
}

impl<'r> FromRow<'r, SqliteRow> for Enrollment {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let grade = match row.try_get::<Option<String>, _>("grade")? {
            Some(text) => Some(text.parse::<Grade>().map_err(|e| sqlx::Error::ColumnDecode {
                index: "grade".to_string(),
                source: e.into(),
            })?),
            None => None,
        };
        let course_id: CourseId = row.try_get("course_id")?;
        let course = match row.try_get::<Option<String>, _>("course_title")? {
            Some(title) => Some(Course {
                id: course_id,
                title,
                credits: row.try_get::<Option<i64>, _>("course_credits")?.unwrap_or(0),
            }),
            None => None,
        };
        Ok(Enrollment {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            course_id,
            grade,
            course,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Student {
    pub id: StudentId,
    pub last_name: String,
    pub first_mid_name: String,
    pub enrollment_date: NaiveDate,
    #[sqlx(skip)]
    pub enrollments: Vec<Enrollment>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_mid_name)
    }

    pub fn course_ids(&self) -> Vec<CourseId> {
        self.enrollments.iter().map(|e| e.course_id).collect()
    }

    pub fn fields(&self) -> StudentFields {
        StudentFields {
            last_name: self.last_name.clone(),
            first_mid_name: self.first_mid_name.clone(),
            enrollment_date: self.enrollment_date,
        }
    }
}

/// The student data a form submission is allowed to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentFields {
    pub last_name: String,
    pub first_mid_name: String,
    pub enrollment_date: NaiveDate,
}

/// An enrollment that has not been stored yet. New enrollments never carry a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
}

impl Model for Student {
    fn table_name() -> &'static str {
        "student"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS student (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            last_name TEXT NOT NULL,
            first_mid_name TEXT NOT NULL,
            enrollment_date TEXT NOT NULL
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("last_name".into(), "TEXT NOT NULL DEFAULT ''".into()),
            ("first_mid_name".into(), "TEXT NOT NULL DEFAULT ''".into()),
            ("enrollment_date".into(), "TEXT NOT NULL DEFAULT '1970-01-01'".into()),
        ]
    }
}

impl Model for Course {
    fn table_name() -> &'static str {
        "course"
    }

    // Course ids are assigned by the school, not generated.
    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS course (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            credits INTEGER NOT NULL DEFAULT 0
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("title".into(), "TEXT NOT NULL DEFAULT ''".into()),
            ("credits".into(), "INTEGER NOT NULL DEFAULT 0".into()),
        ]
    }
}

impl Model for Enrollment {
    fn table_name() -> &'static str {
        "enrollment"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS enrollment (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES student(id) ON DELETE CASCADE,
            course_id INTEGER NOT NULL REFERENCES course(id) ON DELETE CASCADE,
            grade TEXT,
            UNIQUE (student_id, course_id)
        )"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![("grade".into(), "TEXT".into())]
    }
}

fn migrate_student(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Student::migrate(db)
}

fn migrate_course(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Course::migrate(db)
}

fn migrate_enrollment(db: Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>> {
    Enrollment::migrate(db)
}

inventory::submit! { Migration(migrate_student) }
inventory::submit! { Migration(migrate_course) }
inventory::submit! { Migration(migrate_enrollment) }
