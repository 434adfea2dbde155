mod common;

use common::{FailingCommitStore, seed_student, setup_db};
use registrar::forms::FormData;
use registrar::handlers::{self, FormMode, Outcome, SAVE_FAILED_MESSAGE, STUDENTS_PATH};
use registrar::store::{SchoolStore, SqliteStore};

fn student_form(last: &str, courses: &[&str]) -> FormData {
    let mut pairs = vec![
        ("last_name", last),
        ("first_mid_name", "Meredith"),
        ("enrollment_date", "2024-09-01"),
    ];
    for c in courses {
        pairs.push(("selected_courses", *c));
    }
    FormData::from_pairs(pairs)
}

fn expect_form(outcome: Outcome) -> handlers::FormView {
    match outcome {
        Outcome::Form(view) => view,
        other => panic!("expected a form, got {other:?}"),
    }
}

fn selected_values(view: &handlers::FormView) -> Vec<i64> {
    view.options
        .iter()
        .filter(|o| o.selected)
        .map(|o| o.value)
        .collect()
}

#[tokio::test]
async fn test_index_lists_students() {
    let db = setup_db().await;
    seed_student(&db, 1, "Alonso", &[101]).await;
    let store = SqliteStore::new(db);

    match handlers::index(&store).await {
        Outcome::Index(students) => {
            assert_eq!(students.len(), 1);
            assert_eq!(students[0].course_ids(), vec![101]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_create_form_offers_all_courses_unselected() {
    let store = SqliteStore::new(setup_db().await);
    let view = expect_form(handlers::create_form(&store).await);
    assert_eq!(view.mode, FormMode::Create);
    assert_eq!(view.options.len(), 5);
    assert!(selected_values(&view).is_empty());
}

#[tokio::test]
async fn test_create_builds_enrollments_from_selection() {
    let store = SqliteStore::new(setup_db().await);

    let outcome = handlers::create(&store, &student_form("Norman", &["101", "105"])).await;
    assert_eq!(outcome, Outcome::Redirect(STUDENTS_PATH.to_string()));

    let students = store.list_students().await.unwrap();
    assert_eq!(students.len(), 1);
    let student = &students[0];
    assert_eq!(student.last_name, "Norman");
    assert_eq!(student.course_ids(), vec![101, 105]);
    assert!(student.enrollments.iter().all(|e| e.student_id == student.id));
}

#[tokio::test]
async fn test_create_without_selection_has_no_enrollments() {
    let store = SqliteStore::new(setup_db().await);
    let outcome = handlers::create(&store, &student_form("Norman", &[])).await;
    assert!(matches!(outcome, Outcome::Redirect(_)));
    let students = store.list_students().await.unwrap();
    assert!(students[0].enrollments.is_empty());
}

#[tokio::test]
async fn test_create_validation_failure_keeps_selection() {
    let store = SqliteStore::new(setup_db().await);

    let view = expect_form(handlers::create(&store, &student_form("", &["102", "104"])).await);
    assert_eq!(view.form.first_mid_name, "Meredith");
    assert_eq!(selected_values(&view), vec![102, 104]);
    assert_eq!(view.errors.for_field("last_name"), vec!["Last name is required."]);
    assert!(store.list_students().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_commit_failure_is_reported_on_the_form() {
    let store = FailingCommitStore {
        inner: SqliteStore::new(setup_db().await),
    };

    let view = expect_form(handlers::create(&store, &student_form("Ghost", &["101"])).await);
    assert_eq!(view.errors.for_field(""), vec![SAVE_FAILED_MESSAGE]);
    assert_eq!(view.form.last_name, "Ghost");
    assert_eq!(selected_values(&view), vec![101]);
    assert!(store.list_students().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_ignores_unknown_course_ids() {
    let store = SqliteStore::new(setup_db().await);

    let outcome = handlers::create(&store, &student_form("Stale", &["101", "999"])).await;
    assert_eq!(outcome, Outcome::Redirect(STUDENTS_PATH.to_string()));

    let students = store.list_students().await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].last_name, "Stale");
    assert_eq!(students[0].course_ids(), vec![101]);
}

#[tokio::test]
async fn test_edit_form_requires_existing_student() {
    let db = setup_db().await;
    seed_student(&db, 3, "Anand", &[102, 103]).await;
    let store = SqliteStore::new(db);

    assert_eq!(handlers::edit_form(&store, None).await, Outcome::NotFound);
    assert_eq!(handlers::edit_form(&store, Some("abc")).await, Outcome::NotFound);
    assert_eq!(handlers::edit_form(&store, Some("4")).await, Outcome::NotFound);

    let view = expect_form(handlers::edit_form(&store, Some("3")).await);
    assert_eq!(view.mode, FormMode::Edit(3));
    assert_eq!(view.form.last_name, "Anand");
    assert_eq!(view.form.enrollment_date, "2023-09-01");
    assert_eq!(selected_values(&view), vec![102, 103]);
}

#[tokio::test]
async fn test_edit_reconciles_enrollments() {
    let db = setup_db().await;
    seed_student(&db, 7, "Li", &[101, 102]).await;
    let store = SqliteStore::new(db);
    let kept_before = store.get_student(7).await.unwrap().unwrap().enrollments[1].clone();
    assert_eq!(kept_before.course_id, 102);

    let outcome = handlers::edit(&store, Some("7"), &student_form("Li", &["102", "103"])).await;
    assert_eq!(outcome, Outcome::Redirect(STUDENTS_PATH.to_string()));

    let student = store.get_student(7).await.unwrap().unwrap();
    assert_eq!(student.course_ids(), vec![102, 103]);
    // The unchanged enrollment is the same row.
    let kept_after = student.enrollments.iter().find(|e| e.course_id == 102).unwrap();
    assert_eq!(kept_after.id, kept_before.id);
}

#[tokio::test]
async fn test_edit_with_no_selection_drops_all_enrollments() {
    let db = setup_db().await;
    seed_student(&db, 7, "Li", &[101, 102]).await;
    let store = SqliteStore::new(db);

    let outcome = handlers::edit(&store, Some("7"), &student_form("Li", &[])).await;
    assert!(matches!(outcome, Outcome::Redirect(_)));
    assert!(store.get_student(7).await.unwrap().unwrap().enrollments.is_empty());
}

#[tokio::test]
async fn test_edit_ignores_unknown_course_ids() {
    let db = setup_db().await;
    seed_student(&db, 7, "Li", &[]).await;
    let store = SqliteStore::new(db);

    let outcome = handlers::edit(&store, Some("7"), &student_form("Li", &["101", "999"])).await;
    assert!(matches!(outcome, Outcome::Redirect(_)));
    assert_eq!(store.get_student(7).await.unwrap().unwrap().course_ids(), vec![101]);
}

#[tokio::test]
async fn test_edit_uses_route_id_not_body_id() {
    let db = setup_db().await;
    seed_student(&db, 7, "Seven", &[101]).await;
    seed_student(&db, 9, "Nine", &[101]).await;
    let store = SqliteStore::new(db);

    let body = FormData::from_pairs([
        ("id", "9"),
        ("last_name", "Renamed"),
        ("first_mid_name", "Meredith"),
        ("enrollment_date", "2024-01-15"),
        ("selected_courses", "104"),
    ]);
    let outcome = handlers::edit(&store, Some("7"), &body).await;
    assert!(matches!(outcome, Outcome::Redirect(_)));

    let seven = store.get_student(7).await.unwrap().unwrap();
    let nine = store.get_student(9).await.unwrap().unwrap();
    assert_eq!(seven.last_name, "Renamed");
    assert_eq!(seven.course_ids(), vec![104]);
    assert_eq!(nine.last_name, "Nine");
    assert_eq!(nine.course_ids(), vec![101]);
}

#[tokio::test]
async fn test_edit_validation_failure_persists_nothing() {
    let db = setup_db().await;
    seed_student(&db, 7, "Li", &[101]).await;
    let store = SqliteStore::new(db);

    let body = FormData::from_pairs([
        ("last_name", "Li"),
        ("first_mid_name", "Meredith"),
        ("enrollment_date", "yesterday"),
        ("selected_courses", "103"),
    ]);
    let view = expect_form(handlers::edit(&store, Some("7"), &body).await);
    assert_eq!(view.mode, FormMode::Edit(7));
    assert_eq!(view.form.enrollment_date, "yesterday");
    assert_eq!(selected_values(&view), vec![103]);
    assert!(!view.errors.for_field("enrollment_date").is_empty());

    assert_eq!(store.get_student(7).await.unwrap().unwrap().course_ids(), vec![101]);
}

#[tokio::test]
async fn test_edit_commit_failure_redisplays_with_generic_error() {
    let db = setup_db().await;
    seed_student(&db, 7, "Li", &[101]).await;
    let store = FailingCommitStore {
        inner: SqliteStore::new(db),
    };

    let view = expect_form(handlers::edit(&store, Some("7"), &student_form("Changed", &["102"])).await);
    assert_eq!(view.errors.for_field(""), vec![SAVE_FAILED_MESSAGE]);
    assert_eq!(view.form.last_name, "Changed");
    assert_eq!(selected_values(&view), vec![102]);

    let student = store.get_student(7).await.unwrap().unwrap();
    assert_eq!(student.last_name, "Li");
    assert_eq!(student.course_ids(), vec![101]);
}

#[tokio::test]
async fn test_edit_of_missing_student_is_not_found() {
    let store = SqliteStore::new(setup_db().await);
    let outcome = handlers::edit(&store, Some("12"), &student_form("X", &[])).await;
    assert_eq!(outcome, Outcome::NotFound);
}
