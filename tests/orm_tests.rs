use std::sync::Arc;

use registrar::models::{Course, Student};
use registrar::orm::{Db, Model, apply_migration_files, auto_migrate};

#[tokio::test]
async fn test_db_basic_crud() {
    use sqlx::FromRow;

    #[derive(Debug, FromRow, PartialEq, Eq)]
    struct Person {
        name: String,
    }

    let db = Db::connect_with("sqlite::memory:", 1).await.unwrap();
    db.execute("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")
        .await
        .unwrap();
    db.execute("INSERT INTO person (name) VALUES ('Alice')")
        .await
        .unwrap();

    let people: Vec<Person> = db.fetch_all("SELECT name FROM person").await.unwrap();
    let names: Vec<String> = people.into_iter().map(|person| person.name).collect();
    assert_eq!(names, vec!["Alice"]);
}

async fn table_names(db: &Db) -> Vec<String> {
    db.fetch_all::<(String,)>("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .await
        .unwrap()
        .into_iter()
        .map(|(name,)| name)
        .collect()
}

#[tokio::test]
async fn test_auto_migrate_creates_registered_tables() {
    let db = Arc::new(Db::connect_with("sqlite::memory:", 1).await.unwrap());
    auto_migrate(db.clone()).await.unwrap();
    // Running twice must be harmless.
    auto_migrate(db.clone()).await.unwrap();

    let tables = table_names(&db).await;
    for expected in ["course", "enrollment", "student", "__registrar_migrations"] {
        assert!(tables.contains(&expected.to_string()), "missing {expected}: {tables:?}");
    }
}

#[tokio::test]
async fn test_model_migrate_adds_missing_columns() {
    let db = Arc::new(Db::connect_with("sqlite::memory:", 1).await.unwrap());
    Course::migrate(db.clone()).await.unwrap();

    // Pretend an older schema without `credits` was recorded.
    db.execute("DROP TABLE course").await.unwrap();
    db.execute("CREATE TABLE course (id INTEGER PRIMARY KEY, title TEXT NOT NULL)")
        .await
        .unwrap();
    db.execute("UPDATE __registrar_migrations SET hash = 'old' WHERE name = 'course'")
        .await
        .unwrap();

    Course::migrate(db.clone()).await.unwrap();
    let columns: Vec<(String,)> = db
        .fetch_all("SELECT name FROM pragma_table_info('course')")
        .await
        .unwrap();
    assert!(columns.iter().any(|(c,)| c == "credits"));
}

#[tokio::test]
async fn test_migration_files_apply_once_in_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("0002_more.sql"),
        "INSERT INTO course (id, title, credits) VALUES (2, 'Second', 1);",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("0001_first.sql"),
        "INSERT INTO course (id, title, credits) VALUES (1, 'First', 1);",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not sql").unwrap();

    let db = Arc::new(Db::connect_with("sqlite::memory:", 1).await.unwrap());
    Student::migrate(db.clone()).await.unwrap();
    Course::migrate(db.clone()).await.unwrap();

    let path = dir.path().to_str().unwrap();
    let applied = apply_migration_files(db.clone(), path).await.unwrap();
    assert_eq!(applied, vec!["0001_first.sql", "0002_more.sql"]);

    let again = apply_migration_files(db.clone(), path).await.unwrap();
    assert!(again.is_empty());

    let titles: Vec<(String,)> = db
        .fetch_all("SELECT title FROM course ORDER BY id")
        .await
        .unwrap();
    assert_eq!(titles, vec![("First".to_string(),), ("Second".to_string(),)]);
}

#[tokio::test]
async fn test_missing_migrations_dir_applies_nothing() {
    let db = Arc::new(Db::connect_with("sqlite::memory:", 1).await.unwrap());
    let applied = apply_migration_files(db, "definitely/not/here")
        .await
        .unwrap();
    assert!(applied.is_empty());
}

#[tokio::test]
async fn test_seed_courses_file_loads() {
    let db = Arc::new(Db::connect_with("sqlite::memory:", 1).await.unwrap());
    Course::migrate(db.clone()).await.unwrap();
    apply_migration_files(db.clone(), "migrations").await.unwrap();
    let courses: Vec<Course> = db
        .fetch_all("SELECT id, title, credits FROM course")
        .await
        .unwrap();
    assert!(!courses.is_empty());
}
